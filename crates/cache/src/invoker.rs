//! Cache-first invocation of a completion operation.

use ragloom_core::{Completion, CompletionRequest, Message, Operation, compute_args_hash};
use ragloom_telemetry::{CallStatistics, LogVerbosity};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::InvokeError;
use crate::key::{CacheKey, DEFAULT_MODE, logical_input};
use crate::result_cache::{CacheWrite, ResultCache, SkipReason, StoreOutcome};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Remove a leading `<think>...</think>` block (or a bare leading `<think>`)
/// and surrounding whitespace.
pub fn strip_think_tags(text: &str) -> String {
    let rest = match text.strip_prefix(THINK_OPEN) {
        Some(after) => match after.find(THINK_CLOSE) {
            Some(end) => &after[end + THINK_CLOSE.len()..],
            None => after,
        },
        None => text,
    };
    rest.trim().to_string()
}

/// One cached call.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Prompt handed to the operation
    pub input: String,
    /// Cache namespace; `default` for extraction, the query mode otherwise
    pub mode: String,
    /// What the result is for
    pub purpose: String,
    /// Prior conversation, part of the cache hash
    pub history: Vec<Message>,
    /// Chunk the call is made for, recorded on the cache entry
    pub chunk_ref: Option<String>,
    pub max_tokens: Option<u32>,
    /// Parameters recorded on the cache entry, never hashed
    pub call_parameters: Option<Value>,
}

impl InvokeRequest {
    /// An extraction call in the `default` mode.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            mode: DEFAULT_MODE.to_string(),
            purpose: "extract".to_string(),
            history: Vec::new(),
            chunk_ref: None,
            max_tokens: None,
            call_parameters: None,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_chunk_ref(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_ref = Some(chunk_id.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_call_parameters(mut self, parameters: Value) -> Self {
        self.call_parameters = Some(parameters);
        self
    }
}

/// Result of [`CachedInvoker::invoke_tracked`].
#[derive(Debug)]
pub struct InvokeOutcome {
    pub completion: Completion,
    /// Key of the cache entry now holding this result, if one does
    pub cache_key: Option<CacheKey>,
    pub cache_hit: bool,
}

/// Calls a completion operation unless the cache already holds its result.
///
/// The operation is typically a `BoundedScheduler`, so misses run under the
/// scheduler's concurrency limit.
pub struct CachedInvoker<O> {
    operation: O,
    cache: Option<ResultCache>,
    stats: Arc<CallStatistics>,
    verbosity: LogVerbosity,
}

impl<O> CachedInvoker<O>
where
    O: Operation<Input = CompletionRequest, Output = Completion>,
{
    /// An invoker in front of `cache`, logging with the cache's verbosity.
    pub fn new(operation: O, cache: ResultCache, stats: Arc<CallStatistics>) -> Self {
        let verbosity = cache.verbosity();
        Self {
            operation,
            cache: Some(cache),
            stats,
            verbosity,
        }
    }

    /// An invoker that always calls the operation.
    pub fn uncached(operation: O, stats: Arc<CallStatistics>) -> Self {
        Self {
            operation,
            cache: None,
            stats,
            verbosity: LogVerbosity::default(),
        }
    }

    pub fn with_verbosity(mut self, verbosity: LogVerbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn verbosity(&self) -> LogVerbosity {
        self.verbosity
    }

    pub fn operation(&self) -> &O {
        &self.operation
    }

    pub fn stats(&self) -> &Arc<CallStatistics> {
        &self.stats
    }

    /// Return the cached result for `request`, or call the operation and cache it.
    pub async fn invoke(&self, request: InvokeRequest) -> Result<Completion, InvokeError<O::Error>> {
        Ok(self.invoke_tracked(request).await?.completion)
    }

    /// Like [`invoke`](Self::invoke), also reporting the cache key involved.
    ///
    /// The key is reported on a hit, and on a miss whose result is now
    /// stored (or was already stored unchanged).
    pub async fn invoke_tracked(
        &self,
        request: InvokeRequest,
    ) -> Result<InvokeOutcome, InvokeError<O::Error>> {
        let InvokeRequest {
            input,
            mode,
            purpose,
            history,
            chunk_ref,
            max_tokens,
            call_parameters,
        } = request;

        let hashed = logical_input(&input, &history).map_err(|e| InvokeError::Store(e.into()))?;
        let key = CacheKey::try_new(mode, purpose, compute_args_hash(&[&hashed]))?;

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.lookup(&key).await? {
                self.stats.record_cache_hit();
                debug!(key = %key, "Serving result from cache");
                return Ok(InvokeOutcome {
                    completion: Completion::Text(entry.value),
                    cache_key: Some(key),
                    cache_hit: true,
                });
            }
        }

        self.stats.record_operation_call();
        debug!(
            operation = self.operation.name(),
            input_chars = input.chars().count(),
            "Calling operation"
        );
        self.verbosity.debug("operation input", &hashed);

        let completion_request = CompletionRequest {
            prompt: input,
            history,
            max_tokens,
        };
        let completion = match self
            .operation
            .call(completion_request)
            .await
            .map_err(InvokeError::Operation)?
        {
            Completion::Text(text) => Completion::Text(strip_think_tags(&text)),
            stream => stream,
        };

        let mut cache_key = None;
        if let Some(cache) = &self.cache {
            let outcome = cache
                .store(CacheWrite {
                    key: &key,
                    value: &completion,
                    original_input: &hashed,
                    source_chunk_id: chunk_ref.as_deref(),
                    call_parameters,
                })
                .await?;
            if matches!(
                outcome,
                StoreOutcome::Stored | StoreOutcome::Skipped(SkipReason::Duplicate)
            ) {
                cache_key = Some(key);
            }
        }

        Ok(InvokeOutcome {
            completion,
            cache_key,
            cache_hit: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragloom_config::CacheConfig;
    use ragloom_core::{KvStore, OperationError};
    use ragloom_storage::InMemoryKvStore;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Replies with a fixed text and records every request it sees.
    struct ScriptedLlm {
        reply: String,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ScriptedLlm {
        fn new(reply: &str) -> (Self, Arc<AtomicUsize>, Arc<Mutex<Vec<CompletionRequest>>>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    reply: reply.to_string(),
                    calls: calls.clone(),
                    seen: seen.clone(),
                },
                calls,
                seen,
            )
        }
    }

    #[async_trait]
    impl Operation for ScriptedLlm {
        type Input = CompletionRequest;
        type Output = Completion;
        type Error = OperationError;

        fn name(&self) -> &str {
            "scripted"
        }

        async fn call(&self, request: CompletionRequest) -> Result<Completion, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request);
            match self.reply.as_str() {
                "!fail" => Err(OperationError::Api {
                    status_code: 500,
                    message: "boom".into(),
                }),
                "!stream" => {
                    let (tx, rx) = mpsc::channel(2);
                    let _ = tx.send(Ok("partial".to_string())).await;
                    Ok(Completion::Stream(rx))
                }
                text => Ok(Completion::from(text)),
            }
        }
    }

    fn invoker(reply: &str) -> (CachedInvoker<ScriptedLlm>, Arc<AtomicUsize>, Arc<InMemoryKvStore>) {
        let (llm, calls, _seen) = ScriptedLlm::new(reply);
        let store = Arc::new(InMemoryKvStore::new());
        let cache = ResultCache::new(store.clone(), CacheConfig::default());
        (
            CachedInvoker::new(llm, cache, Arc::new(CallStatistics::new())),
            calls,
            store,
        )
    }

    #[test]
    fn think_tags_are_stripped() {
        assert_eq!(strip_think_tags("<think>reasoning</think>\n answer "), "answer");
        assert_eq!(strip_think_tags("<think>unterminated answer"), "unterminated answer");
        assert_eq!(strip_think_tags("  plain  "), "plain");
        assert_eq!(
            strip_think_tags("keep <think>inner</think> tags"),
            "keep <think>inner</think> tags"
        );
        assert_eq!(
            strip_think_tags("<think>a</think>b</think>c"),
            "b</think>c"
        );
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let (invoker, calls, _store) = invoker("<think>hmm</think> entities");

        let first = invoker.invoke(InvokeRequest::new("extract this")).await.unwrap();
        assert_eq!(first.as_text(), Some("entities"));

        let second = invoker.invoke(InvokeRequest::new("extract this")).await.unwrap();
        assert_eq!(second.as_text(), Some("entities"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let snap = invoker.stats().snapshot();
        assert_eq!(snap.operation_calls, 1);
        assert_eq!(snap.cache_hits, 1);
    }

    #[tokio::test]
    async fn history_and_purpose_change_the_key() {
        let (invoker, calls, _store) = invoker("r");

        invoker.invoke(InvokeRequest::new("q")).await.unwrap();
        invoker
            .invoke(InvokeRequest::new("q").with_history(vec![Message::user("before")]))
            .await
            .unwrap();
        invoker
            .invoke(InvokeRequest::new("q").with_purpose("summary"))
            .await
            .unwrap();
        invoker
            .invoke(InvokeRequest::new("q").with_mode("local").with_purpose("query"))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn call_parameters_do_not_affect_the_key() {
        let (invoker, calls, _store) = invoker("r");

        invoker
            .invoke(InvokeRequest::new("q").with_call_parameters(serde_json::json!({"top_k": 5})))
            .await
            .unwrap();
        invoker
            .invoke(InvokeRequest::new("q").with_call_parameters(serde_json::json!({"top_k": 9})))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tracked_invocation_reports_key_and_records_chunk() {
        let (invoker, _calls, store) = invoker("r");
        let request = InvokeRequest::new("q").with_chunk_ref("chunk-9");

        let miss = invoker.invoke_tracked(request.clone()).await.unwrap();
        assert!(!miss.cache_hit);
        let key = miss.cache_key.unwrap();
        assert_eq!(key.mode, "default");
        assert_eq!(key.purpose, "extract");

        let record = store.get_by_id(&key.to_string()).await.unwrap().unwrap();
        assert_eq!(record["chunk_id"], "chunk-9");
        assert_eq!(record["original_prompt"], "q");

        let hit = invoker.invoke_tracked(request).await.unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.cache_key, Some(key));
    }

    #[tokio::test]
    async fn disabled_cache_always_calls() {
        let (llm, calls, _seen) = ScriptedLlm::new("r");
        let store = Arc::new(InMemoryKvStore::new());
        let config = CacheConfig {
            enable_llm_cache: true,
            enable_llm_cache_for_entity_extract: false,
        };
        let invoker = CachedInvoker::new(
            llm,
            ResultCache::new(store.clone(), config),
            Arc::new(CallStatistics::new()),
        );

        let outcome = invoker.invoke_tracked(InvokeRequest::new("q")).await.unwrap();
        assert!(outcome.cache_key.is_none());
        invoker.invoke(InvokeRequest::new("q")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn uncached_invoker_still_strips_tags() {
        let (llm, calls, seen) = ScriptedLlm::new("<think>x</think>done");
        let invoker = CachedInvoker::uncached(llm, Arc::new(CallStatistics::new()));

        let request = InvokeRequest::new("q")
            .with_history(vec![Message::user("a"), Message::assistant("b")])
            .with_max_tokens(32);
        let out = invoker.invoke(request).await.unwrap();

        assert_eq!(out.as_text(), Some("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].prompt, "q");
        assert_eq!(seen[0].history.len(), 2);
        assert_eq!(seen[0].max_tokens, Some(32));
    }

    #[tokio::test]
    async fn streaming_result_is_returned_but_not_cached() {
        let (invoker, calls, store) = invoker("!stream");

        let out = invoker.invoke(InvokeRequest::new("q")).await.unwrap();
        assert!(out.is_streaming());
        assert_eq!(out.collect().await.unwrap(), "partial");

        invoker.invoke(InvokeRequest::new("q")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn operation_error_passes_through() {
        let (invoker, _calls, store) = invoker("!fail");

        let err = invoker.invoke(InvokeRequest::new("q")).await.unwrap_err();
        match err {
            InvokeError::Operation(OperationError::Api { status_code, .. }) => {
                assert_eq!(status_code, 500)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn unusable_mode_is_rejected_before_calling() {
        let (invoker, calls, store) = invoker("r");

        let err = invoker
            .invoke(InvokeRequest::new("q").with_mode(""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::InvalidKey(ragloom_core::KeyError::EmptyComponent("mode"))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.upsert_count(), 0);
    }

    #[test]
    fn invoker_inherits_cache_verbosity() {
        let (llm, _calls, _seen) = ScriptedLlm::new("r");
        let cache = ResultCache::new(Arc::new(InMemoryKvStore::new()), CacheConfig::default())
            .with_verbosity(LogVerbosity::Verbose);
        let invoker = CachedInvoker::new(llm, cache, Arc::new(CallStatistics::new()));
        assert_eq!(invoker.verbosity(), LogVerbosity::Verbose);
    }
}
