//! Error types for the recorder pipeline.
//!
//! Almost nothing in the pipeline surfaces errors: write failures are logged
//! and dropped at the per-event boundary. The one exception is attachment —
//! absent store connectivity at startup, the pipeline refuses to exist.

use thiserror::Error;

/// Errors that can occur while attaching the recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The startup connectivity probe failed. The recorder registers no
    /// event handling at all for this process lifetime (fail-closed).
    #[error("store unavailable at startup: {0}")]
    StoreUnavailable(#[source] scribe_store::StoreError),
}

/// Convenience type alias for recorder results.
pub type Result<T> = std::result::Result<T, RecorderError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
