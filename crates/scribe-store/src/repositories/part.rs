//! Message part repository — two merge regimes.
//!
//! Streaming text-like parts (`text`, `reasoning`) merge under a monotonic
//! length rule: a strictly longer snapshot wins, anything else is a no-op.
//! Status-bearing parts (chiefly `tool`) merge under a status-priority gate:
//! the incoming snapshot replaces the stored one only when its status rank
//! is at least the rank embedded in the stored content's nested state.
//! Equal rank updates, so a `completed` part can still receive a later
//! `completed` refresh carrying additional output.

use rusqlite::{Connection, OptionalExtension, params};
use scribe_core::ToolStatus;

use crate::errors::Result;
use crate::row_types::PartRow;

/// SQL expression ranking the status embedded in the stored content.
/// Mirrors `ToolStatus::rank_of`: unknown and absent statuses rank 0.
const STORED_RANK: &str = "CASE json_extract(content, '$.state.status')
       WHEN 'pending'   THEN 1
       WHEN 'running'   THEN 2
       WHEN 'completed' THEN 3
       WHEN 'error'     THEN 3
       ELSE 0
     END";

/// Columns written by a part upsert.
#[derive(Clone, Debug, Default)]
pub struct PartUpsert {
    /// Part id (host-supplied).
    pub id: String,
    /// Owning message id.
    pub message_id: String,
    /// Owning session id.
    pub session_id: String,
    /// Part type string.
    pub part_type: String,
    /// Tool name; coalesces independently of either gate.
    pub tool_name: Option<String>,
    /// Best-known text.
    pub text: Option<String>,
    /// Full structured content snapshot JSON.
    pub content: String,
    /// Status string inside `content`'s nested state, if any. Ranked
    /// against the stored snapshot by [`PartRepo::upsert_snapshot`].
    pub status: Option<String>,
}

/// Part repository — stateless, every method takes `&Connection`.
pub struct PartRepo;

impl PartRepo {
    /// Merge a streaming text-like part (`text`, `reasoning`).
    ///
    /// Insert-if-absent, then update text and content only when the incoming
    /// text is non-null and strictly longer than what is stored — the
    /// monotonic growth model for token-by-token streaming.
    pub fn upsert_streaming(conn: &Connection, up: &PartUpsert) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        Self::insert_if_absent(conn, up, &now)?;

        // Tool name merges regardless of the text-length gate.
        if up.tool_name.is_some() {
            let _ = conn.execute(
                "UPDATE message_parts SET tool_name = COALESCE(?2, tool_name) WHERE id = ?1",
                params![up.id, up.tool_name],
            )?;
        }

        if let Some(text) = &up.text {
            let _ = conn.execute(
                "UPDATE message_parts SET text = ?2, content = ?3, updated_at = ?4
                 WHERE id = ?1 AND (text IS NULL OR length(?2) > length(text))",
                params![up.id, text, up.content, now],
            )?;
        }
        Ok(())
    }

    /// Merge a status-bearing part snapshot.
    ///
    /// Insert-if-absent, then replace the whole snapshot when the incoming
    /// status rank is greater than or equal to the stored one. The content
    /// is a single coherent snapshot; partial-field merging is deliberately
    /// not used here.
    pub fn upsert_snapshot(conn: &Connection, up: &PartUpsert) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        Self::insert_if_absent(conn, up, &now)?;

        let incoming_rank = ToolStatus::rank_of(up.status.as_deref());
        let _ = conn.execute(
            &format!(
                "UPDATE message_parts SET
                   tool_name  = COALESCE(?2, tool_name),
                   text       = COALESCE(?3, text),
                   content    = ?4,
                   updated_at = ?5
                 WHERE id = ?1 AND ?6 >= ({STORED_RANK})"
            ),
            params![up.id, up.tool_name, up.text, up.content, now, incoming_rank],
        )?;
        Ok(())
    }

    /// Overwrite the nested execution state of a part with a terminal
    /// snapshot (tool output annotation), under the same priority gate.
    pub fn annotate_state(conn: &Connection, part_id: &str, state_json: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let terminal_rank = 3;
        let changed = conn.execute(
            &format!(
                "UPDATE message_parts SET
                   content    = json_set(content, '$.state', json(?2)),
                   updated_at = ?3
                 WHERE id = ?1 AND ?4 >= ({STORED_RANK})"
            ),
            params![part_id, state_json, now, terminal_rank],
        )?;
        Ok(changed > 0)
    }

    /// Delete a part.
    pub fn delete(conn: &Connection, part_id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM message_parts WHERE id = ?1", params![part_id])?;
        Ok(changed > 0)
    }

    /// Get part by ID.
    pub fn get(conn: &Connection, part_id: &str) -> Result<Option<PartRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM message_parts WHERE id = ?1",
                params![part_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn insert_if_absent(conn: &Connection, up: &PartUpsert, now: &str) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO message_parts (id, message_id, session_id, part_type, tool_name,
                                        text, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(id) DO NOTHING",
            params![
                up.id,
                up.message_id,
                up.session_id,
                up.part_type,
                up.tool_name,
                up.text,
                up.content,
                now,
            ],
        )?;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartRow> {
        Ok(PartRow {
            id: row.get("id")?,
            message_id: row.get("message_id")?,
            session_id: row.get("session_id")?,
            part_type: row.get("part_type")?,
            tool_name: row.get("tool_name")?,
            text: row.get("text")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::repositories::session::SessionRepo;
    use scribe_core::ToolStatus;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        SessionRepo::ensure(&conn, "ses_1").unwrap();
        conn
    }

    fn text_part(text: Option<&str>) -> PartUpsert {
        PartUpsert {
            id: "prt_1".into(),
            message_id: "msg_1".into(),
            session_id: "ses_1".into(),
            part_type: "text".into(),
            text: text.map(String::from),
            content: serde_json::json!({"type": "text", "text": text}).to_string(),
            ..Default::default()
        }
    }

    fn tool_part(status: Option<&str>, output: Option<&str>) -> PartUpsert {
        let content = serde_json::json!({
            "type": "tool",
            "state": {"status": status, "output": output},
        });
        PartUpsert {
            id: "prt_t".into(),
            message_id: "msg_1".into(),
            session_id: "ses_1".into(),
            part_type: "tool".into(),
            tool_name: Some("bash".into()),
            content: content.to_string(),
            status: status.map(String::from),
            ..Default::default()
        }
    }

    fn stored_status(conn: &Connection, part_id: &str) -> Option<String> {
        let row = PartRepo::get(conn, part_id).unwrap().unwrap();
        let content: serde_json::Value = serde_json::from_str(&row.content).unwrap();
        content["state"]["status"].as_str().map(String::from)
    }

    // ── Streaming regime ──────────────────────────────────────────────

    #[test]
    fn streaming_longer_text_wins() {
        let conn = setup();
        PartRepo::upsert_streaming(&conn, &text_part(Some("hel"))).unwrap();
        PartRepo::upsert_streaming(&conn, &text_part(Some("hello wor"))).unwrap();
        PartRepo::upsert_streaming(&conn, &text_part(Some("hello"))).unwrap();

        let row = PartRepo::get(&conn, "prt_1").unwrap().unwrap();
        assert_eq!(row.text.as_deref(), Some("hello wor"));
    }

    #[test]
    fn streaming_null_text_is_noop() {
        let conn = setup();
        PartRepo::upsert_streaming(&conn, &text_part(Some("hello"))).unwrap();
        PartRepo::upsert_streaming(&conn, &text_part(None)).unwrap();

        let row = PartRepo::get(&conn, "prt_1").unwrap().unwrap();
        assert_eq!(row.text.as_deref(), Some("hello"));
    }

    #[test]
    fn streaming_insert_with_null_text_then_grow() {
        let conn = setup();
        PartRepo::upsert_streaming(&conn, &text_part(None)).unwrap();
        PartRepo::upsert_streaming(&conn, &text_part(Some("a"))).unwrap();

        let row = PartRepo::get(&conn, "prt_1").unwrap().unwrap();
        assert_eq!(row.text.as_deref(), Some("a"));
    }

    #[test]
    fn streaming_tool_name_merges_despite_shorter_text() {
        let conn = setup();
        PartRepo::upsert_streaming(&conn, &text_part(Some("long text here"))).unwrap();
        let mut shorter = text_part(Some("x"));
        shorter.tool_name = Some("grep".into());
        PartRepo::upsert_streaming(&conn, &shorter).unwrap();

        let row = PartRepo::get(&conn, "prt_1").unwrap().unwrap();
        assert_eq!(row.text.as_deref(), Some("long text here"));
        assert_eq!(row.tool_name.as_deref(), Some("grep"));
    }

    // ── Snapshot regime ───────────────────────────────────────────────

    #[test]
    fn status_moves_forward() {
        let conn = setup();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("running"), None)).unwrap();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("completed"), Some("ok"))).unwrap();

        assert_eq!(stored_status(&conn, "prt_t").as_deref(), Some("completed"));
    }

    #[test]
    fn completed_then_running_stays_completed() {
        let conn = setup();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("completed"), Some("ok"))).unwrap();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("running"), None)).unwrap();

        assert_eq!(stored_status(&conn, "prt_t").as_deref(), Some("completed"));
        let row = PartRepo::get(&conn, "prt_t").unwrap().unwrap();
        let content: serde_json::Value = serde_json::from_str(&row.content).unwrap();
        assert_eq!(content["state"]["output"], "ok");
    }

    #[test]
    fn running_then_pending_stays_running() {
        let conn = setup();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("running"), None)).unwrap();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("pending"), None)).unwrap();

        assert_eq!(stored_status(&conn, "prt_t").as_deref(), Some("running"));
    }

    #[test]
    fn equal_rank_refreshes_snapshot() {
        let conn = setup();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("completed"), Some("partial"))).unwrap();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("completed"), Some("full output")))
            .unwrap();

        let row = PartRepo::get(&conn, "prt_t").unwrap().unwrap();
        let content: serde_json::Value = serde_json::from_str(&row.content).unwrap();
        assert_eq!(content["state"]["output"], "full output");
    }

    #[test]
    fn unknown_status_never_displaces_known() {
        let conn = setup();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("pending"), None)).unwrap();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("weird"), None)).unwrap();

        assert_eq!(stored_status(&conn, "prt_t").as_deref(), Some("pending"));
    }

    // ── Annotation ────────────────────────────────────────────────────

    #[test]
    fn annotate_overwrites_state() {
        let conn = setup();
        PartRepo::upsert_snapshot(&conn, &tool_part(Some("running"), None)).unwrap();

        let state = serde_json::json!({"status": "completed", "output": "a.txt"}).to_string();
        assert!(PartRepo::annotate_state(&conn, "prt_t", &state).unwrap());

        assert_eq!(stored_status(&conn, "prt_t").as_deref(), Some("completed"));
        let row = PartRepo::get(&conn, "prt_t").unwrap().unwrap();
        let content: serde_json::Value = serde_json::from_str(&row.content).unwrap();
        assert_eq!(content["state"]["output"], "a.txt");
        // Non-state fields survive the annotation
        assert_eq!(content["type"], "tool");
    }

    #[test]
    fn annotate_missing_part_is_noop() {
        let conn = setup();
        let state = serde_json::json!({"status": "completed"}).to_string();
        assert!(!PartRepo::annotate_state(&conn, "prt_missing", &state).unwrap());
    }

    #[test]
    fn delete_part() {
        let conn = setup();
        PartRepo::upsert_streaming(&conn, &text_part(Some("x"))).unwrap();
        assert!(PartRepo::delete(&conn, "prt_1").unwrap());
        assert!(PartRepo::get(&conn, "prt_1").unwrap().is_none());
    }

    // ── Order-independent convergence ─────────────────────────────────

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn status_strategy() -> impl Strategy<Value = Option<&'static str>> {
            prop::sample::select(vec![
                None,
                Some("pending"),
                Some("running"),
                Some("completed"),
                Some("error"),
                Some("unheard-of"),
            ])
        }

        proptest! {
            #[test]
            fn stored_rank_equals_max_delivered_rank(
                statuses in prop::collection::vec(status_strategy(), 1..8)
            ) {
                let conn = setup();
                for status in &statuses {
                    PartRepo::upsert_snapshot(&conn, &tool_part(*status, None)).unwrap();
                }

                let max_rank = statuses
                    .iter()
                    .map(|s| ToolStatus::rank_of(*s))
                    .max()
                    .unwrap_or(0);
                let stored = stored_status(&conn, "prt_t");
                prop_assert_eq!(ToolStatus::rank_of(stored.as_deref()), max_rank);
            }
        }
    }
}
