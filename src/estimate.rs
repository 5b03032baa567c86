//! Word-count token estimation.
//!
//! Prompt budgeting uses a fixed words-to-tokens ratio (roughly 1.3 tokens
//! per English word) instead of a tokenizer call, so estimates stay cheap,
//! deterministic, and dependency-free. The packing loop in
//! [`optimize`](crate::optimize) treats these estimates as the cost of each
//! candidate fragment.

/// Approximate tokens-per-word ratio for prose.
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Default total context budget, shared by the base prompts and any injected
/// reference material.
pub const DEFAULT_TOKEN_BUDGET: usize = 8000;

/// Estimate the token cost of `text` as `ceil(word_count * 1.3)`.
///
/// Whitespace-only input costs zero tokens.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * TOKENS_PER_WORD).ceil() as usize
}
