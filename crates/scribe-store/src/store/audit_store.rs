//! The `AuditStore` facade.
//!
//! One method per persistence operation the recorder dispatches. Every
//! method checks a connection out of the pool, runs its statements, and
//! returns — no transactions span operations, by design: convergence under
//! interleaving is the merge protocol's job, not the transaction manager's.

use crate::connection::{ConnectionPool, PooledConnection};
use crate::errors::Result;
use crate::repositories::activity::{ActivityRepo, NewCommand, NewSessionError};
use crate::repositories::message::{MessageRepo, MessageUpsert};
use crate::repositories::part::{PartRepo, PartUpsert};
use crate::repositories::session::{SessionRepo, SessionUpsert, TokenApply};
use crate::repositories::tool_execution::{
    NewToolExecution, OrphanToolExecution, ToolExecutionRepo,
};
use crate::row_types::SessionCounters;

/// High-level audit store wrapping a connection pool and all repositories.
#[derive(Debug)]
pub struct AuditStore {
    pool: ConnectionPool,
}

impl AuditStore {
    /// Create a new `AuditStore` with the given connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Liveness probe (`SELECT 1`). Used by the startup connectivity check
    /// and by anyone wanting to poke the database without touching data.
    pub fn probe(&self) -> Result<()> {
        let conn = self.conn()?;
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        debug_assert_eq!(one, 1);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Insert or merge a session snapshot.
    pub fn upsert_session(&self, up: &SessionUpsert) -> Result<()> {
        let conn = self.conn()?;
        SessionRepo::upsert(&conn, up)
    }

    /// Ensure a session row exists (upsert-before-insert ordering for
    /// child rows).
    pub fn ensure_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn()?;
        SessionRepo::ensure(&conn, session_id)
    }

    /// Set the session lifecycle status.
    pub fn set_session_status(&self, session_id: &str, status: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::set_status(&conn, session_id, status)
    }

    /// Delete a session; child rows cascade.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::delete(&conn, session_id)
    }

    /// Apply token/cost deltas from one contributing assistant message.
    pub fn apply_message_tokens(&self, session_id: &str, apply: &TokenApply) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::apply_tokens(&conn, session_id, apply)
    }

    /// Add cost reported by a `step-finish` part.
    pub fn add_session_cost(&self, session_id: &str, cost: f64) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::add_cost(&conn, session_id, cost)
    }

    /// Snapshot the session's live counters — the pipeline's one durable read.
    pub fn session_counters(&self, session_id: &str) -> Result<Option<SessionCounters>> {
        let conn = self.conn()?;
        SessionRepo::counters(&conn, session_id)
    }

    /// Reset the live context counter after compaction.
    pub fn reset_context_tokens(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::reset_context(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages and parts
    // ─────────────────────────────────────────────────────────────────────

    /// Insert or merge a message snapshot.
    pub fn upsert_message(&self, up: &MessageUpsert) -> Result<()> {
        let conn = self.conn()?;
        MessageRepo::upsert(&conn, up)
    }

    /// Refresh the denormalized message text under the monotonic-length rule.
    pub fn refresh_message_text(&self, message_id: &str, text: &str) -> Result<bool> {
        let conn = self.conn()?;
        MessageRepo::refresh_text(&conn, message_id, text)
    }

    /// Delete a message and its parts.
    pub fn delete_message(&self, message_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        MessageRepo::delete(&conn, message_id)
    }

    /// Merge a streaming text-like part.
    pub fn upsert_streaming_part(&self, up: &PartUpsert) -> Result<()> {
        let conn = self.conn()?;
        PartRepo::upsert_streaming(&conn, up)
    }

    /// Merge a status-bearing part snapshot.
    pub fn upsert_part_snapshot(&self, up: &PartUpsert) -> Result<()> {
        let conn = self.conn()?;
        PartRepo::upsert_snapshot(&conn, up)
    }

    /// Annotate a tool part's nested state with a terminal snapshot.
    pub fn annotate_tool_part(&self, part_id: &str, state_json: &str) -> Result<bool> {
        let conn = self.conn()?;
        PartRepo::annotate_state(&conn, part_id, state_json)
    }

    /// Delete a part.
    pub fn delete_part(&self, part_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        PartRepo::delete(&conn, part_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tool executions
    // ─────────────────────────────────────────────────────────────────────

    /// Record the start of a tool execution.
    pub fn begin_tool_execution(&self, new: &NewToolExecution) -> Result<()> {
        let conn = self.conn()?;
        ToolExecutionRepo::begin(&conn, new)
    }

    /// Complete a previously-started tool execution.
    pub fn finish_tool_execution(
        &self,
        id: &str,
        result: Option<&str>,
        completed_at: &str,
        duration_ms: i64,
    ) -> Result<bool> {
        let conn = self.conn()?;
        ToolExecutionRepo::finish(&conn, id, result, completed_at, duration_ms)
    }

    /// Record an execution synthesized from an orphan "after".
    pub fn record_orphan_execution(&self, orphan: &OrphanToolExecution) -> Result<()> {
        let conn = self.conn()?;
        ToolExecutionRepo::insert_completed(&conn, orphan)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Append-only facts
    // ─────────────────────────────────────────────────────────────────────

    /// Append a session error record.
    pub fn insert_session_error(&self, new: &NewSessionError) -> Result<String> {
        let conn = self.conn()?;
        ActivityRepo::insert_error(&conn, new)
    }

    /// Append a command record.
    pub fn insert_command(&self, new: &NewCommand) -> Result<String> {
        let conn = self.conn()?;
        ActivityRepo::insert_command(&conn, new)
    }

    /// Append a compaction snapshot.
    pub fn insert_compaction(
        &self,
        session_id: &str,
        counters: &SessionCounters,
    ) -> Result<String> {
        let conn = self.conn()?;
        ActivityRepo::insert_compaction(&conn, session_id, counters)
    }

    /// Get the raw connection pool (tests and downstream readers).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::connection::{self, ConnectionConfig};
    use crate::migrations::run_migrations;
    use crate::repositories::session::SessionUpsert;

    fn setup() -> AuditStore {
        let pool = connection::new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            run_migrations(&conn).unwrap();
        }
        AuditStore::new(pool)
    }

    #[test]
    fn probe_succeeds_on_live_store() {
        let store = setup();
        store.probe().unwrap();
    }

    #[test]
    fn upsert_then_delete_session() {
        let store = setup();
        store
            .upsert_session(&SessionUpsert {
                id: "ses_1".into(),
                title: Some("T".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(store.session_counters("ses_1").unwrap().is_some());
        assert!(store.delete_session("ses_1").unwrap());
        assert!(store.session_counters("ses_1").unwrap().is_none());
    }

    #[test]
    fn ensure_session_before_child_rows() {
        let store = setup();
        store.ensure_session("ses_1").unwrap();
        let id = store
            .insert_command(&NewCommand {
                session_id: "ses_1".into(),
                command: "compact".into(),
                arguments: None,
            })
            .unwrap();
        assert!(id.starts_with("cmd_"));
    }

    #[test]
    fn compaction_flow_snapshot_then_reset() {
        let store = setup();
        store.ensure_session("ses_1").unwrap();
        store
            .apply_message_tokens(
                "ses_1",
                &TokenApply {
                    input_tokens: 100,
                    output_tokens: 20,
                    context_tokens: 100,
                    ..Default::default()
                },
            )
            .unwrap();

        let counters = store.session_counters("ses_1").unwrap().unwrap();
        assert_eq!(counters.context_tokens, 100);
        let _ = store.insert_compaction("ses_1", &counters).unwrap();
        assert!(store.reset_context_tokens("ses_1").unwrap());

        let after = store.session_counters("ses_1").unwrap().unwrap();
        assert_eq!(after.context_tokens, 0);
        assert_eq!(after.input_tokens, 100); // totals survive the reset
    }
}
