//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape. The recorder never reads rows
//! back except the [`SessionCounters`] snapshot taken at compaction; the rest
//! exist for tests and for downstream consumers of the audit database.

use serde::{Deserialize, Serialize};

/// Raw session row from the `sessions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session ID (host-supplied).
    pub id: String,
    /// Parent session ID, for sub-sessions.
    pub parent_id: Option<String>,
    /// Project ID.
    pub project_id: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Lifecycle status (`active`, `idle`, `error`).
    pub status: String,
    /// Public share URL.
    pub share_url: Option<String>,
    /// Model provider identifier.
    pub model_provider: Option<String>,
    /// Model identifier.
    pub model_id: Option<String>,
    /// Total input tokens.
    pub total_input_tokens: i64,
    /// Total output tokens.
    pub total_output_tokens: i64,
    /// Total reasoning tokens.
    pub total_reasoning_tokens: i64,
    /// Total cache read tokens.
    pub total_cache_read_tokens: i64,
    /// Total cache write tokens.
    pub total_cache_write_tokens: i64,
    /// Total cost in USD.
    pub total_cost: f64,
    /// Live context size in tokens (reset at compaction).
    pub context_tokens: i64,
    /// Peak context size in tokens (monotonic).
    pub peak_context_tokens: i64,
    /// Number of compactions performed.
    pub compaction_count: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Raw message row from the `messages` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    /// Message ID (host-supplied).
    pub id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Role (`user`, `assistant`).
    pub role: String,
    /// Model provider identifier.
    pub model_provider: Option<String>,
    /// Model identifier.
    pub model_id: Option<String>,
    /// Denormalized best-known text.
    pub text: Option<String>,
    /// Raw content payload JSON.
    pub content: Option<String>,
    /// System prompt snapshot.
    pub system_prompt: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Raw part row from the `message_parts` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartRow {
    /// Part ID (host-supplied).
    pub id: String,
    /// Owning message ID.
    pub message_id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Part type string.
    pub part_type: String,
    /// Tool name, for tool parts.
    pub tool_name: Option<String>,
    /// Best-known text.
    pub text: Option<String>,
    /// Full structured content snapshot JSON.
    pub content: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Raw tool execution row from the `tool_executions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolExecutionRow {
    /// Execution ID (generated correlation id).
    pub id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Host call id; not guaranteed unique.
    pub call_id: Option<String>,
    /// Tool name.
    pub tool_name: String,
    /// Input arguments JSON.
    pub arguments: Option<String>,
    /// Result snapshot.
    pub result: Option<String>,
    /// Start timestamp.
    pub started_at: String,
    /// Completion timestamp.
    pub completed_at: Option<String>,
    /// Derived duration in milliseconds.
    pub duration_ms: Option<i64>,
    /// Success flag (1 when an "after" was observed).
    pub success: Option<bool>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw session error row from the `session_errors` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionErrorRow {
    /// Error record ID (generated).
    pub id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Error class name.
    pub error_name: Option<String>,
    /// Human-readable message.
    pub error_message: Option<String>,
    /// Structured error payload JSON.
    pub payload: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw command row from the `commands` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandRow {
    /// Command record ID (generated).
    pub id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Command name.
    pub command: String,
    /// Raw argument string.
    pub arguments: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw compaction row from the `compactions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompactionRow {
    /// Compaction record ID (generated).
    pub id: String,
    /// Owning session ID.
    pub session_id: String,
    /// Input tokens at snapshot time.
    pub input_tokens: i64,
    /// Output tokens at snapshot time.
    pub output_tokens: i64,
    /// Reasoning tokens at snapshot time.
    pub reasoning_tokens: i64,
    /// Cache read tokens at snapshot time.
    pub cache_read_tokens: i64,
    /// Cache write tokens at snapshot time.
    pub cache_write_tokens: i64,
    /// Cost at snapshot time.
    pub cost: f64,
    /// Context tokens at snapshot time.
    pub context_tokens: i64,
    /// Creation timestamp.
    pub created_at: String,
}

/// Point-in-time snapshot of a session's live counters.
///
/// The single durable read the recorder performs, taken at compaction time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Total input tokens.
    pub input_tokens: i64,
    /// Total output tokens.
    pub output_tokens: i64,
    /// Total reasoning tokens.
    pub reasoning_tokens: i64,
    /// Total cache read tokens.
    pub cache_read_tokens: i64,
    /// Total cache write tokens.
    pub cache_write_tokens: i64,
    /// Total cost in USD.
    pub cost: f64,
    /// Live context size in tokens.
    pub context_tokens: i64,
}
