//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ScribeSettings::default()`]
//! 2. If `~/.scribe/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ScribeSettings;

/// Resolve the path to the settings file (`~/.scribe/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".scribe").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ScribeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ScribeSettings> {
    let defaults = serde_json::to_value(ScribeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ScribeSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules: integers must be valid and within
/// range; invalid values are silently ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut ScribeSettings) {
    // ── Database settings ───────────────────────────────────────────
    if let Some(v) = read_env_string("SCRIBE_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = read_env_u32("SCRIBE_DB_POOL_SIZE", 1, 64) {
        settings.database.pool_size = v;
    }
    if let Some(v) = read_env_u64("SCRIBE_WRITE_TIMEOUT_MS", 100, 600_000) {
        settings.database.op_timeout_ms = v;
    }

    // ── Health gate settings ────────────────────────────────────────
    if let Some(v) = read_env_u64("SCRIBE_BASE_BACKOFF_MS", 10, 600_000) {
        settings.health.base_backoff_ms = v;
    }
    if let Some(v) = read_env_u64("SCRIBE_MAX_BACKOFF_MS", 10, 3_600_000) {
        settings.health.max_backoff_ms = v;
    }

    // ── Sweep settings ──────────────────────────────────────────────
    if let Some(v) = read_env_u64("SCRIBE_SWEEP_INTERVAL_SECS", 1, 86_400) {
        settings.sweep.interval_secs = v;
    }
    if let Some(v) = read_env_u64("SCRIBE_EXECUTION_TTL_SECS", 1, 86_400) {
        settings.sweep.execution_ttl_secs = v;
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    std::env::var(name)
        .ok()?
        .parse::<u32>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()?
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
