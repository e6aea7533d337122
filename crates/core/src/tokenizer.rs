//! Tokenizer trait: encodes text into a count-comparable token sequence.

/// The tokenizer capability.
///
/// Only the length of the encoded sequence matters to the retrieval core;
/// ids are exposed so real tokenizers can be plugged in unchanged.
pub trait Tokenizer: Send + Sync {
    /// The model this tokenizer belongs to.
    fn model_name(&self) -> &str;

    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}
