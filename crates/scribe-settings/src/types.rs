//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings for the Scribe audit recorder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScribeSettings {
    /// Database connection and timeout settings.
    pub database: DatabaseSettings,
    /// Health gate backoff settings.
    pub health: HealthSettings,
    /// Correlation sweep settings.
    pub sweep: SweepSettings,
}

/// Database connection and per-operation timeout settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Path to the `SQLite` database file.
    pub path: String,
    /// Maximum pool size.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// `SQLite` page cache size in KiB.
    pub cache_size_kib: i64,
    /// Timeout raced against every store operation, in milliseconds.
    pub op_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
            cache_size_kib: 8192,
            op_timeout_ms: 5_000,
        }
    }
}

/// Health gate backoff settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthSettings {
    /// Base backoff after the first connectivity failure, in milliseconds.
    pub base_backoff_ms: u64,
    /// Backoff cap, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Correlation state sweep settings. Entries older than their map's
/// threshold are dropped unconditionally to bound memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SweepSettings {
    /// Interval between sweeps, in seconds.
    pub interval_secs: u64,
    /// Staleness threshold for pending tool executions, in seconds.
    pub execution_ttl_secs: u64,
    /// Staleness threshold for call-id→part links, in seconds.
    pub part_link_ttl_secs: u64,
    /// Staleness threshold for buffered user turns, in seconds.
    pub pending_chat_ttl_secs: u64,
    /// Staleness threshold for token-applied markers, in seconds.
    pub token_applied_ttl_secs: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            execution_ttl_secs: 600,
            part_link_ttl_secs: 600,
            pending_chat_ttl_secs: 300,
            token_applied_ttl_secs: 1_800,
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    format!("{home}/.scribe/audit.db")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
