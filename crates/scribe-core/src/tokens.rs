//! Token usage counters in the host's nested wire shape.

use serde::{Deserialize, Serialize};

/// Per-message token usage as reported by the host.
///
/// All fields default to zero so partial reports deserialize cleanly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenUsage {
    /// Input tokens consumed.
    pub input: i64,
    /// Output tokens generated.
    pub output: i64,
    /// Reasoning tokens generated.
    pub reasoning: i64,
    /// Prompt-cache counters.
    pub cache: CacheUsage,
}

/// Prompt-cache token counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheUsage {
    /// Tokens read from cache.
    pub read: i64,
    /// Tokens written to cache.
    pub write: i64,
}

impl TokenUsage {
    /// Whether this report contributes nothing to session totals.
    ///
    /// A message reporting zero input and zero output is treated as a
    /// placeholder: it is not counted, and a later fuller report for the
    /// same message id may still be.
    #[must_use]
    pub fn is_non_contributing(&self) -> bool {
        self.input == 0 && self.output == 0
    }

    /// Context size implied by this message: input plus cache reads.
    #[must_use]
    pub fn context_tokens(&self) -> i64 {
        self.input + self.cache.read
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
