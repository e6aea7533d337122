//! Operation trait: the abstraction over expensive asynchronous calls.
//!
//! An Operation is anything the scheduler can run on behalf of a caller: an
//! LLM completion, an embedding request, a rerank call. The trait is generic
//! over its input and output so one scheduler type serves all of them, and
//! its error type is kept as-is all the way back to the caller.
//!
//! [`CompletionRequest`] and [`Completion`] are the concrete input/output of
//! the LLM completions that the cached invoker wraps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::OperationError;
use crate::message::Message;

/// The core Operation trait.
///
/// Implementations may be slow, may block on I/O, and may fail with any
/// error. Cancellation is cooperative: dropping the returned future is the
/// only cancellation signal an implementation receives.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// What the caller hands over.
    type Input: Send + 'static;
    /// What a successful call produces.
    type Output: Send + 'static;
    /// The operation's own failure type, surfaced to callers unchanged.
    type Error: std::error::Error + Send + 'static;

    /// A human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Run the operation once.
    async fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// Input of an LLM completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The prompt text
    pub prompt: String,

    /// Prior conversation, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Output of an LLM completion: either the whole text, or a stream of deltas.
#[derive(Debug)]
pub enum Completion {
    /// A complete response
    Text(String),
    /// An incremental response; the receiver yields content deltas
    Stream(mpsc::Receiver<Result<String, OperationError>>),
}

impl Completion {
    /// The full text, when the completion is not streaming.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Stream(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Stream(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Drain the completion into a single string.
    ///
    /// A streaming completion is read to the end; the first delta error
    /// aborts the collection.
    pub async fn collect(self) -> Result<String, OperationError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Stream(mut rx) => {
                let mut out = String::new();
                while let Some(delta) = rx.recv().await {
                    out.push_str(&delta?);
                }
                Ok(out)
            }
        }
    }
}

impl From<String> for Completion {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Completion {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}
