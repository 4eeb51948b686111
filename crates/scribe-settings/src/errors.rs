//! Error types for settings loading.

use thiserror::Error;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file contained invalid JSON or an invalid shape.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience type alias for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
