//! Tokenizer implementations.
//!
//! [`HeuristicTokenizer`] is always available and needs no model files: one
//! token per four characters, rounded up. It tracks BPE tokenizers within a
//! few percent on English prose, which is enough for budgeting context.
//!
//! [`HfTokenizer`] wraps a HuggingFace `tokenizer.json` and is compiled in
//! with the `hf` feature.

use ragloom_core::Tokenizer;

/// Characters per heuristic token.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct HeuristicTokenizer;

impl HeuristicTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn model_name(&self) -> &str {
        "heuristic"
    }

    /// One id per group of four characters: the code point of the group's
    /// first character.
    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars()
            .step_by(CHARS_PER_TOKEN)
            .map(u32::from)
            .collect()
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }
}

// ── HuggingFace ───────────────────────────────────────────────────────────

#[cfg(feature = "hf")]
pub use hf::{HfTokenizer, TokenizerLoadError};

#[cfg(feature = "hf")]
mod hf {
    use ragloom_core::Tokenizer;
    use std::path::Path;
    use tracing::{info, warn};

    #[derive(Debug, thiserror::Error)]
    #[error("Failed to load tokenizer from {path}: {reason}")]
    pub struct TokenizerLoadError {
        pub path: String,
        pub reason: String,
    }

    /// A HuggingFace `tokenizers` tokenizer.
    pub struct HfTokenizer {
        inner: tokenizers::Tokenizer,
        model: String,
    }

    impl HfTokenizer {
        pub fn new(inner: tokenizers::Tokenizer, model: impl Into<String>) -> Self {
            Self {
                inner,
                model: model.into(),
            }
        }

        /// Load a `tokenizer.json` file.
        pub fn from_file(
            path: impl AsRef<Path>,
            model: impl Into<String>,
        ) -> Result<Self, TokenizerLoadError> {
            let path = path.as_ref();
            let inner =
                tokenizers::Tokenizer::from_file(path).map_err(|e| TokenizerLoadError {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            let model = model.into();
            info!(model = %model, path = %path.display(), "Tokenizer loaded");
            Ok(Self { inner, model })
        }
    }

    impl std::fmt::Debug for HfTokenizer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HfTokenizer")
                .field("model", &self.model)
                .finish_non_exhaustive()
        }
    }

    impl Tokenizer for HfTokenizer {
        fn model_name(&self) -> &str {
            &self.model
        }

        /// Encoding failures are logged and count as zero tokens.
        fn encode(&self, text: &str) -> Vec<u32> {
            match self.inner.encode(text, false) {
                Ok(encoding) => encoding.get_ids().to_vec(),
                Err(e) => {
                    warn!(model = %self.model, error = %e, "Tokenizer failed to encode text");
                    Vec::new()
                }
            }
        }
    }
}
