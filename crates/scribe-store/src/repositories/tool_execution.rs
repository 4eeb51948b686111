//! Tool execution repository.
//!
//! Rows are keyed by a pipeline-generated correlation id, not the host's
//! call id — call ids are not guaranteed unique or stable across retries,
//! so they are stored as a plain (indexed) attribute.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::row_types::ToolExecutionRow;

/// A pending execution created from a "before" notification.
#[derive(Clone, Debug, Default)]
pub struct NewToolExecution {
    /// Generated correlation id.
    pub id: String,
    /// Owning session id.
    pub session_id: String,
    /// Host call id.
    pub call_id: Option<String>,
    /// Tool name.
    pub tool_name: String,
    /// Argument snapshot JSON.
    pub arguments: Option<String>,
    /// Start timestamp.
    pub started_at: String,
}

/// A completed execution synthesized from an orphan "after" notification.
#[derive(Clone, Debug, Default)]
pub struct OrphanToolExecution {
    /// Generated correlation id.
    pub id: String,
    /// Owning session id.
    pub session_id: String,
    /// Host call id.
    pub call_id: Option<String>,
    /// Tool name.
    pub tool_name: String,
    /// Result snapshot.
    pub result: Option<String>,
    /// Completion timestamp; also recorded as the observed start.
    pub completed_at: String,
}

/// Tool execution repository — stateless, every method takes `&Connection`.
pub struct ToolExecutionRepo;

impl ToolExecutionRepo {
    /// Record the start of an execution.
    pub fn begin(conn: &Connection, new: &NewToolExecution) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO tool_executions (id, session_id, call_id, tool_name, arguments,
                                          started_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO NOTHING",
            params![
                new.id,
                new.session_id,
                new.call_id,
                new.tool_name,
                new.arguments,
                new.started_at,
                now,
            ],
        )?;
        Ok(())
    }

    /// Complete a previously-started execution.
    pub fn finish(
        conn: &Connection,
        id: &str,
        result: Option<&str>,
        completed_at: &str,
        duration_ms: i64,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE tool_executions SET
               result       = ?2,
               completed_at = ?3,
               duration_ms  = ?4,
               success      = 1
             WHERE id = ?1",
            params![id, result, completed_at, duration_ms],
        )?;
        Ok(changed > 0)
    }

    /// Record an execution whose "before" was never seen. Duration stays
    /// unset: there is no trustworthy start time.
    pub fn insert_completed(conn: &Connection, orphan: &OrphanToolExecution) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO tool_executions (id, session_id, call_id, tool_name, result,
                                          started_at, completed_at, success, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 1, ?7)
             ON CONFLICT(id) DO NOTHING",
            params![
                orphan.id,
                orphan.session_id,
                orphan.call_id,
                orphan.tool_name,
                orphan.result,
                orphan.completed_at,
                now,
            ],
        )?;
        Ok(())
    }

    /// Get execution by correlation ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<ToolExecutionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM tool_executions WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List executions for a session, oldest first.
    pub fn list_by_session(conn: &Connection, session_id: &str) -> Result<Vec<ToolExecutionRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM tool_executions WHERE session_id = ?1 ORDER BY started_at, id",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List executions recorded for a host call id.
    pub fn list_by_call(conn: &Connection, call_id: &str) -> Result<Vec<ToolExecutionRow>> {
        let mut stmt = conn
            .prepare("SELECT * FROM tool_executions WHERE call_id = ?1 ORDER BY started_at, id")?;
        let rows = stmt
            .query_map(params![call_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolExecutionRow> {
        Ok(ToolExecutionRow {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            call_id: row.get("call_id")?,
            tool_name: row.get("tool_name")?,
            arguments: row.get("arguments")?,
            result: row.get("result")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            duration_ms: row.get("duration_ms")?,
            success: row.get("success")?,
            created_at: row.get("created_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
