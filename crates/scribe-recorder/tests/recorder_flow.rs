//! End-to-end recorder tests: host event sequences in, audit rows out.
//!
//! Each test drives [`Recorder::handle_event`] with JSON-shaped host events
//! against an in-memory store, draining the write-behind dispatcher at the
//! points where ordering matters to the scenario.

use std::sync::Arc;
use std::time::Duration;

use scribe_core::HostEvent;
use scribe_recorder::{Recorder, RecorderError};
use scribe_settings::ScribeSettings;
use scribe_store::repositories::{ActivityRepo, MessageRepo, PartRepo, ToolExecutionRepo};
use scribe_store::{AuditStore, ConnectionConfig, new_in_memory, run_migrations};
use serde_json::json;

fn make_store() -> Arc<AuditStore> {
    let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        let _ = run_migrations(&conn).unwrap();
    }
    Arc::new(AuditStore::new(pool))
}

fn settings() -> ScribeSettings {
    ScribeSettings::default()
}

fn attach(store: &Arc<AuditStore>) -> Recorder {
    Recorder::attach(Arc::clone(store), &settings()).unwrap()
}

fn event(value: serde_json::Value) -> HostEvent {
    serde_json::from_value(value).unwrap()
}

fn table_count(store: &AuditStore, table: &str) -> i64 {
    let conn = store.pool().get().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool execution correlation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn paired_tool_call_produces_single_completed_row() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "tool.execute.before",
        "properties": {
            "sessionId": "ses_1", "callId": "c1", "tool": "bash",
            "args": {"cmd": "ls"}
        }
    })));
    recorder.drain().await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    recorder.handle_event(event(json!({
        "type": "tool.execute.after",
        "properties": {"sessionId": "ses_1", "callId": "c1", "output": "a.txt"}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let rows = ToolExecutionRepo::list_by_call(&conn, "c1").unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!(row.id.starts_with("exec_"));
    assert_eq!(row.tool_name, "bash");
    assert_eq!(row.result.as_deref(), Some("a.txt"));
    assert_eq!(row.success, Some(true));
    assert!(row.duration_ms.unwrap() > 0);
    assert!(row.completed_at.is_some());
    assert_eq!(row.arguments.as_deref(), Some(r#"{"cmd":"ls"}"#));
}

#[tokio::test]
async fn orphan_after_yields_row_without_duration() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "tool.execute.after",
        "properties": {
            "sessionId": "ses_1", "callId": "c9", "tool": "grep", "output": "match"
        }
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let rows = ToolExecutionRepo::list_by_call(&conn, "c9").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tool_name, "grep");
    assert_eq!(rows[0].result.as_deref(), Some("match"));
    assert_eq!(rows[0].success, Some(true));
    assert!(rows[0].duration_ms.is_none());
}

#[tokio::test]
async fn after_consumes_pending_entry_exactly_once() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "tool.execute.before",
        "properties": {"sessionId": "ses_1", "callId": "c1", "tool": "bash"}
    })));
    recorder.drain().await;
    assert_eq!(recorder.correlation().pending_execution_count(), 1);

    recorder.handle_event(event(json!({
        "type": "tool.execute.after",
        "properties": {"sessionId": "ses_1", "callId": "c1"}
    })));
    recorder.drain().await;
    assert_eq!(recorder.correlation().pending_execution_count(), 0);

    // A duplicate "after" synthesizes a fresh orphan row.
    recorder.handle_event(event(json!({
        "type": "tool.execute.after",
        "properties": {"sessionId": "ses_1", "callId": "c1", "tool": "bash"}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let rows = ToolExecutionRepo::list_by_call(&conn, "c1").unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn tool_after_annotates_linked_part() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.part.updated",
        "properties": {
            "id": "prt_1", "messageId": "msg_1", "sessionId": "ses_1",
            "type": "tool", "tool": "bash", "callId": "c1",
            "state": {"status": "running"}
        }
    })));
    recorder.drain().await;

    recorder.handle_event(event(json!({
        "type": "tool.execute.before",
        "properties": {"sessionId": "ses_1", "callId": "c1", "tool": "bash"}
    })));
    recorder.drain().await;

    recorder.handle_event(event(json!({
        "type": "tool.execute.after",
        "properties": {"sessionId": "ses_1", "callId": "c1", "output": "a.txt"}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let part = PartRepo::get(&conn, "prt_1").unwrap().unwrap();
    let content: serde_json::Value = serde_json::from_str(&part.content).unwrap();
    assert_eq!(content["state"]["status"], "completed");
    assert_eq!(content["state"]["output"], "a.txt");
}

// ─────────────────────────────────────────────────────────────────────────────
// Part merge convergence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn part_status_converges_regardless_of_order() {
    let store = make_store();
    let recorder = attach(&store);

    let part = |id: &str, status: &str| {
        event(json!({
            "type": "message.part.updated",
            "properties": {
                "id": id, "messageId": "msg_1", "sessionId": "ses_1",
                "type": "tool", "tool": "bash",
                "state": {"status": status}
            }
        }))
    };

    // Forward order
    recorder.handle_event(part("prt_fwd", "running"));
    recorder.drain().await;
    recorder.handle_event(part("prt_fwd", "completed"));
    recorder.drain().await;

    // Reverse order
    recorder.handle_event(part("prt_rev", "completed"));
    recorder.drain().await;
    recorder.handle_event(part("prt_rev", "running"));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    for id in ["prt_fwd", "prt_rev"] {
        let row = PartRepo::get(&conn, id).unwrap().unwrap();
        let content: serde_json::Value = serde_json::from_str(&row.content).unwrap();
        assert_eq!(content["state"]["status"], "completed", "part {id}");
    }
}

#[tokio::test]
async fn running_part_ignores_late_pending() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.part.updated",
        "properties": {
            "id": "p1", "messageId": "msg_1", "sessionId": "ses_1",
            "type": "tool", "state": {"status": "running"}
        }
    })));
    recorder.drain().await;

    recorder.handle_event(event(json!({
        "type": "message.part.updated",
        "properties": {
            "id": "p1", "messageId": "msg_1", "sessionId": "ses_1",
            "type": "tool", "state": {"status": "pending"}
        }
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let row = PartRepo::get(&conn, "p1").unwrap().unwrap();
    let content: serde_json::Value = serde_json::from_str(&row.content).unwrap();
    assert_eq!(content["state"]["status"], "running");
}

#[tokio::test]
async fn streaming_text_keeps_longest() {
    let store = make_store();
    let recorder = attach(&store);

    for text in ["hel", "hello wo", "hello"] {
        recorder.handle_event(event(json!({
            "type": "message.part.updated",
            "properties": {
                "id": "prt_1", "messageId": "msg_1", "sessionId": "ses_1",
                "type": "text", "text": text
            }
        })));
        recorder.drain().await;
    }

    let conn = store.pool().get().unwrap();
    let row = PartRepo::get(&conn, "prt_1").unwrap().unwrap();
    assert_eq!(row.text.as_deref(), Some("hello wo"));
}

#[tokio::test]
async fn text_part_refreshes_message_text() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {"id": "msg_1", "sessionId": "ses_1", "role": "assistant"}
    })));
    recorder.drain().await;

    recorder.handle_event(event(json!({
        "type": "message.part.updated",
        "properties": {
            "id": "prt_1", "messageId": "msg_1", "sessionId": "ses_1",
            "type": "text", "text": "the full response"
        }
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let message = MessageRepo::get(&conn, "msg_1").unwrap().unwrap();
    assert_eq!(message.text.as_deref(), Some("the full response"));
}

#[tokio::test]
async fn step_finish_cost_accumulates_on_session() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.part.updated",
        "properties": {
            "id": "prt_1", "messageId": "msg_1", "sessionId": "ses_1",
            "type": "step-finish", "cost": 0.25
        }
    })));
    recorder.drain().await;

    let counters = store.session_counters("ses_1").unwrap().unwrap();
    assert!((counters.cost - 0.25).abs() < f64::EPSILON);
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounting
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_assistant_message_counts_once() {
    let store = make_store();
    let recorder = attach(&store);

    let message = event(json!({
        "type": "message.updated",
        "properties": {
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant",
            "tokens": {"input": 100, "output": 40, "cache": {"read": 20, "write": 5}}
        }
    }));
    recorder.handle_event(message.clone());
    recorder.drain().await;
    recorder.handle_event(message);
    recorder.drain().await;

    let counters = store.session_counters("ses_1").unwrap().unwrap();
    assert_eq!(counters.input_tokens, 100);
    assert_eq!(counters.output_tokens, 40);
    assert_eq!(counters.cache_read_tokens, 20);
    assert_eq!(counters.context_tokens, 120); // input + cache read
}

#[tokio::test]
async fn zero_token_update_leaves_later_report_countable() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant",
            "tokens": {"input": 0, "output": 0}
        }
    })));
    recorder.drain().await;

    // The placeholder was not marked applied; the fuller report counts.
    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant",
            "tokens": {"input": 80, "output": 10}
        }
    })));
    recorder.drain().await;

    let counters = store.session_counters("ses_1").unwrap().unwrap();
    assert_eq!(counters.input_tokens, 80);
    assert_eq!(counters.output_tokens, 10);
}

#[tokio::test]
async fn compaction_snapshots_then_resets() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {
            "id": "msg_1", "sessionId": "ses_1", "role": "assistant",
            "tokens": {"input": 500, "output": 100, "cache": {"read": 300, "write": 0}}
        }
    })));
    recorder.drain().await;

    recorder.handle_event(event(json!({
        "type": "session.compacted",
        "properties": {"sessionId": "ses_1"}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let compactions = ActivityRepo::compactions_by_session(&conn, "ses_1").unwrap();
    assert_eq!(compactions.len(), 1);
    assert_eq!(compactions[0].input_tokens, 500);
    assert_eq!(compactions[0].context_tokens, 800);

    let counters = store.session_counters("ses_1").unwrap().unwrap();
    assert_eq!(counters.context_tokens, 0);
    assert_eq!(counters.input_tokens, 500); // totals survive

    let session = scribe_store::repositories::SessionRepo::get(&conn, "ses_1")
        .unwrap()
        .unwrap();
    assert_eq!(session.peak_context_tokens, 800);
    assert_eq!(session.compaction_count, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn null_update_never_clears_title() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "session.created",
        "properties": {"id": "s1", "title": "T"}
    })));
    recorder.drain().await;
    recorder.handle_event(event(json!({
        "type": "session.updated",
        "properties": {"id": "s1", "title": null}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let session = scribe_store::repositories::SessionRepo::get(&conn, "s1")
        .unwrap()
        .unwrap();
    assert_eq!(session.title.as_deref(), Some("T"));
}

#[tokio::test]
async fn session_idle_sets_status() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "session.created",
        "properties": {"id": "s1"}
    })));
    recorder.drain().await;
    recorder.handle_event(event(json!({
        "type": "session.idle",
        "properties": {"sessionId": "s1"}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let session = scribe_store::repositories::SessionRepo::get(&conn, "s1")
        .unwrap()
        .unwrap();
    assert_eq!(session.status, "idle");
}

#[tokio::test]
async fn session_error_without_id_writes_nothing() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "session.error",
        "properties": {"name": "ProviderAuthError", "message": "expired"}
    })));
    recorder.drain().await;

    assert_eq!(table_count(&store, "sessions"), 0);
    assert_eq!(table_count(&store, "session_errors"), 0);
}

#[tokio::test]
async fn session_error_appends_record_and_flips_status() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "session.error",
        "properties": {
            "sessionId": "s1", "name": "ProviderAuthError",
            "message": "expired", "data": {"provider": "acme"}
        }
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let errors = ActivityRepo::errors_by_session(&conn, "s1").unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_name.as_deref(), Some("ProviderAuthError"));

    let session = scribe_store::repositories::SessionRepo::get(&conn, "s1")
        .unwrap()
        .unwrap();
    assert_eq!(session.status, "error");
}

#[tokio::test]
async fn session_deleted_cascades_children() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {"id": "msg_1", "sessionId": "s1", "role": "user"}
    })));
    recorder.drain().await;
    recorder.handle_event(event(json!({
        "type": "session.deleted",
        "properties": {"sessionId": "s1"}
    })));
    recorder.drain().await;

    assert_eq!(table_count(&store, "sessions"), 0);
    assert_eq!(table_count(&store, "messages"), 0);
}

#[tokio::test]
async fn command_executed_appends_row() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "command.executed",
        "properties": {"sessionId": "s1", "command": "compact", "arguments": "--now"}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let commands = ActivityRepo::commands_by_session(&conn, "s1").unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, "compact");
}

// ─────────────────────────────────────────────────────────────────────────────
// User turn reconstruction
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_message_reconstructed_from_chat_buffer() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "chat.message",
        "properties": {
            "sessionId": "ses_1",
            "systemPrompt": "be helpful",
            "parts": [
                {"id": "prt_a", "messageId": "msg_pending", "sessionId": "ses_1",
                 "type": "text", "text": "first line"},
                {"id": "prt_b", "messageId": "msg_pending", "sessionId": "ses_1",
                 "type": "file"},
                {"id": "prt_c", "messageId": "msg_pending", "sessionId": "ses_1",
                 "type": "text", "text": "second line"}
            ]
        }
    })));
    assert_eq!(recorder.correlation().pending_chat_count(), 1);

    // Message identity arrives without an embedded parts array.
    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {"id": "msg_1", "sessionId": "ses_1", "role": "user"}
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let message = MessageRepo::get(&conn, "msg_1").unwrap().unwrap();
    assert_eq!(message.text.as_deref(), Some("first line\nsecond line"));
    assert_eq!(message.system_prompt.as_deref(), Some("be helpful"));
    // Buffer consumed
    assert_eq!(recorder.correlation().pending_chat_count(), 0);
}

#[tokio::test]
async fn user_message_with_embedded_parts_skips_buffer() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "chat.message",
        "properties": {"sessionId": "ses_1", "parts": [
            {"id": "prt_a", "messageId": "m", "sessionId": "ses_1",
             "type": "text", "text": "buffered"}
        ]}
    })));

    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {
            "id": "msg_1", "sessionId": "ses_1", "role": "user",
            "parts": [
                {"id": "prt_x", "messageId": "msg_1", "sessionId": "ses_1",
                 "type": "text", "text": "embedded"}
            ]
        }
    })));
    recorder.drain().await;

    let conn = store.pool().get().unwrap();
    let message = MessageRepo::get(&conn, "msg_1").unwrap().unwrap();
    assert_eq!(message.text.as_deref(), Some("embedded"));
    // Buffer untouched; the sweep will reclaim it.
    assert_eq!(recorder.correlation().pending_chat_count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Removal events
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn message_removed_deletes_row_and_parts() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.updated",
        "properties": {"id": "msg_1", "sessionId": "ses_1", "role": "assistant"}
    })));
    recorder.drain().await;
    recorder.handle_event(event(json!({
        "type": "message.part.updated",
        "properties": {"id": "prt_1", "messageId": "msg_1", "sessionId": "ses_1",
                        "type": "text", "text": "x"}
    })));
    recorder.drain().await;

    recorder.handle_event(event(json!({
        "type": "message.removed",
        "properties": {"sessionId": "ses_1", "messageId": "msg_1"}
    })));
    recorder.drain().await;

    assert_eq!(table_count(&store, "messages"), 0);
    assert_eq!(table_count(&store, "message_parts"), 0);
}

#[tokio::test]
async fn part_removed_deletes_row() {
    let store = make_store();
    let recorder = attach(&store);

    recorder.handle_event(event(json!({
        "type": "message.part.updated",
        "properties": {"id": "prt_1", "messageId": "msg_1", "sessionId": "ses_1",
                        "type": "text", "text": "x"}
    })));
    recorder.drain().await;

    recorder.handle_event(event(json!({
        "type": "message.part.removed",
        "properties": {"sessionId": "ses_1", "partId": "prt_1"}
    })));
    recorder.drain().await;

    assert_eq!(table_count(&store, "message_parts"), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Fail-closed attachment
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn attach_fails_closed_without_connectivity() {
    let manager =
        r2d2_sqlite::SqliteConnectionManager::file("/nonexistent/directory/audit.db");
    let pool = r2d2::Pool::builder()
        .connection_timeout(Duration::from_millis(200))
        .build_unchecked(manager);
    let store = Arc::new(AuditStore::new(pool));

    let err = Recorder::attach(store, &settings()).unwrap_err();
    assert!(matches!(err, RecorderError::StoreUnavailable(_)));
}
