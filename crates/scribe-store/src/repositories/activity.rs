//! Append-only fact repositories: session errors, commands, compactions.
//!
//! No merge logic — each event produces exactly one new row with a
//! generated, time-ordered id.

use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::row_types::{CommandRow, CompactionRow, SessionCounters, SessionErrorRow};

/// A session error fact.
#[derive(Clone, Debug, Default)]
pub struct NewSessionError {
    /// Owning session id.
    pub session_id: String,
    /// Error class name.
    pub name: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
    /// Structured error payload JSON.
    pub payload: Option<String>,
}

/// A command execution fact.
#[derive(Clone, Debug, Default)]
pub struct NewCommand {
    /// Owning session id.
    pub session_id: String,
    /// Command name.
    pub command: String,
    /// Raw argument string.
    pub arguments: Option<String>,
}

/// Append-only fact repository — stateless, every method takes `&Connection`.
pub struct ActivityRepo;

impl ActivityRepo {
    /// Append a session error record.
    pub fn insert_error(conn: &Connection, new: &NewSessionError) -> Result<String> {
        let id = format!("err_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO session_errors (id, session_id, error_name, error_message, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, new.session_id, new.name, new.message, new.payload, now],
        )?;
        Ok(id)
    }

    /// Append a command record.
    pub fn insert_command(conn: &Connection, new: &NewCommand) -> Result<String> {
        let id = format!("cmd_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO commands (id, session_id, command, arguments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, new.session_id, new.command, new.arguments, now],
        )?;
        Ok(id)
    }

    /// Append a compaction snapshot taken from the session's live counters.
    pub fn insert_compaction(
        conn: &Connection,
        session_id: &str,
        counters: &SessionCounters,
    ) -> Result<String> {
        let id = format!("cmp_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO compactions (id, session_id, input_tokens, output_tokens,
                                      reasoning_tokens, cache_read_tokens, cache_write_tokens,
                                      cost, context_tokens, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                session_id,
                counters.input_tokens,
                counters.output_tokens,
                counters.reasoning_tokens,
                counters.cache_read_tokens,
                counters.cache_write_tokens,
                counters.cost,
                counters.context_tokens,
                now,
            ],
        )?;
        Ok(id)
    }

    /// List error records for a session, oldest first.
    pub fn errors_by_session(conn: &Connection, session_id: &str) -> Result<Vec<SessionErrorRow>> {
        let mut stmt =
            conn.prepare("SELECT * FROM session_errors WHERE session_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(SessionErrorRow {
                    id: row.get("id")?,
                    session_id: row.get("session_id")?,
                    error_name: row.get("error_name")?,
                    error_message: row.get("error_message")?,
                    payload: row.get("payload")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List command records for a session, oldest first.
    pub fn commands_by_session(conn: &Connection, session_id: &str) -> Result<Vec<CommandRow>> {
        let mut stmt = conn.prepare("SELECT * FROM commands WHERE session_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(CommandRow {
                    id: row.get("id")?,
                    session_id: row.get("session_id")?,
                    command: row.get("command")?,
                    arguments: row.get("arguments")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List compaction records for a session, oldest first.
    pub fn compactions_by_session(
        conn: &Connection,
        session_id: &str,
    ) -> Result<Vec<CompactionRow>> {
        let mut stmt =
            conn.prepare("SELECT * FROM compactions WHERE session_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(CompactionRow {
                    id: row.get("id")?,
                    session_id: row.get("session_id")?,
                    input_tokens: row.get("input_tokens")?,
                    output_tokens: row.get("output_tokens")?,
                    reasoning_tokens: row.get("reasoning_tokens")?,
                    cache_read_tokens: row.get("cache_read_tokens")?,
                    cache_write_tokens: row.get("cache_write_tokens")?,
                    cost: row.get("cost")?,
                    context_tokens: row.get("context_tokens")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
