//! The recorder — per-event correlation and write-behind dispatch.
//!
//! [`Recorder::handle_event`] is the single entry point for host events. It
//! updates in-memory correlation state, composes the ordered chain of store
//! steps for the event, hands the chain to the dispatcher, and returns —
//! persistence latency never blocks event intake. Every store step passes
//! through the health gate; convergence under inter-event races is the
//! store's merge protocol's job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scribe_core::events::payloads::{
    ChatMessagePayload, CommandPayload, MessagePayload, MessageRef, MessageRole, PartPayload,
    PartRef, SessionErrorPayload, SessionPayload, SessionRef, ToolAfterPayload, ToolBeforePayload,
    part_kind,
};
use scribe_core::{ExecutionId, HostEvent, PartId};
use scribe_settings::ScribeSettings;
use scribe_store::{
    AuditStore, MessageUpsert, NewCommand, NewSessionError, NewToolExecution,
    OrphanToolExecution, PartUpsert, SessionUpsert,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::accounting;
use crate::correlation::{CorrelationState, PendingChat, PendingExecution, spawn_sweeper};
use crate::dispatcher::Dispatcher;
use crate::errors::{RecorderError, Result};
use crate::health::HealthGate;

/// The event-correlation and write-behind pipeline.
#[derive(Debug)]
pub struct Recorder {
    store: Arc<AuditStore>,
    gate: Arc<HealthGate>,
    state: Arc<CorrelationState>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
}

impl Recorder {
    /// Attach the recorder to a store.
    ///
    /// Probes connectivity first. If the probe fails, no event handling is
    /// registered for this process lifetime — absent a database the whole
    /// pipeline is inert rather than buffering indefinitely.
    pub fn attach(store: Arc<AuditStore>, settings: &ScribeSettings) -> Result<Self> {
        store.probe().map_err(RecorderError::StoreUnavailable)?;

        let gate = Arc::new(HealthGate::new(
            &settings.health,
            Duration::from_millis(settings.database.op_timeout_ms),
        ));
        let state = Arc::new(CorrelationState::new());
        let cancel = CancellationToken::new();
        let _ = spawn_sweeper(Arc::clone(&state), settings.sweep.clone(), cancel.clone());

        info!("audit recorder attached");
        Ok(Self {
            store,
            gate,
            state,
            dispatcher: Dispatcher::new(),
            cancel,
        })
    }

    /// Handle one host event.
    ///
    /// Returns immediately after updating correlation state and enqueuing
    /// the event's write-behind chain. Never raises: malformed events no-op,
    /// store failures stay behind the health gate and the log sink.
    pub fn handle_event(&self, event: HostEvent) {
        trace!(kind = event.kind(), "handling host event");
        match event {
            HostEvent::SessionCreated(p) | HostEvent::SessionUpdated(p) => {
                self.on_session_snapshot(p);
            }
            HostEvent::SessionDeleted(p) => self.on_session_deleted(p),
            HostEvent::SessionIdle(p) => self.on_session_idle(p),
            HostEvent::SessionError(p) => self.on_session_error(p),
            HostEvent::SessionCompacted(p) => self.on_session_compacted(p),
            HostEvent::MessageUpdated(p) => self.on_message_updated(p),
            HostEvent::MessageRemoved(p) => self.on_message_removed(p),
            HostEvent::MessagePartUpdated(p) => self.on_part_updated(p),
            HostEvent::MessagePartRemoved(p) => self.on_part_removed(p),
            HostEvent::CommandExecuted(p) => self.on_command_executed(p),
            HostEvent::ToolExecuteBefore(p) => self.on_tool_before(p),
            HostEvent::ToolExecuteAfter(p) => self.on_tool_after(p),
            HostEvent::ChatMessage(p) => self.on_chat_message(p),
        }
    }

    /// Wait for all in-flight write-behind chains to settle.
    pub async fn drain(&self) {
        self.dispatcher.drain().await;
    }

    /// Stop the background sweep. In-flight chains are unaffected.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Correlation state, for observability.
    pub fn correlation(&self) -> &CorrelationState {
        &self.state
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session events
    // ─────────────────────────────────────────────────────────────────────

    fn on_session_snapshot(&self, payload: SessionPayload) {
        let up = SessionUpsert {
            id: payload.id.into_inner(),
            parent_id: payload.parent_id,
            project_id: payload.project_id,
            title: payload.title,
            status: payload.status,
            share_url: payload.share_url,
            model_provider: payload.provider_id,
            model_id: payload.model_id,
        };

        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("session.upsert", async move {
            let _ = gate
                .run("session.upsert", move || store.upsert_session(&up))
                .await;
        });
    }

    fn on_session_deleted(&self, payload: SessionRef) {
        let session_id = payload.session_id.into_inner();
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("session.delete", async move {
            let _ = gate
                .run("session.delete", move || store.delete_session(&session_id))
                .await;
        });
    }

    fn on_session_idle(&self, payload: SessionRef) {
        let session_id = payload.session_id.into_inner();
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("session.idle", async move {
            let _ = gate
                .run("session.ensure", {
                    let store = Arc::clone(&store);
                    let id = session_id.clone();
                    move || store.ensure_session(&id)
                })
                .await;
            let _ = gate
                .run("session.status", move || {
                    store.set_session_status(&session_id, "idle")
                })
                .await;
        });
    }

    fn on_session_error(&self, payload: SessionErrorPayload) {
        // No session to attribute the error to: drop rather than corrupt
        // records with partial identity.
        let Some(session_id) = payload.session_id else {
            debug!("session error without session id, dropping");
            return;
        };
        let session_id = session_id.into_inner();

        let record = NewSessionError {
            session_id: session_id.clone(),
            name: payload.name,
            message: payload.message,
            payload: payload.data.map(|v| v.to_string()),
        };

        // Two independent write-behind operations: the error fact and the
        // status flip. Readers must tolerate seeing one without the other.
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        let sid = session_id.clone();
        self.dispatcher.dispatch("session.error.record", async move {
            let _ = gate
                .run("session.ensure", {
                    let store = Arc::clone(&store);
                    let id = sid.clone();
                    move || store.ensure_session(&id)
                })
                .await;
            let _ = gate
                .run("error.insert", move || store.insert_session_error(&record))
                .await;
        });

        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("session.error.status", async move {
            let _ = gate
                .run("session.ensure", {
                    let store = Arc::clone(&store);
                    let id = session_id.clone();
                    move || store.ensure_session(&id)
                })
                .await;
            let _ = gate
                .run("session.status", move || {
                    store.set_session_status(&session_id, "error")
                })
                .await;
        });
    }

    fn on_session_compacted(&self, payload: SessionRef) {
        let session_id = payload.session_id.into_inner();
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        // Read-then-write, deliberately unguarded: a token update landing
        // between the read and the reset can be lost from the snapshot.
        // Compaction snapshots are best-effort telemetry; the live counters
        // stay authoritative.
        self.dispatcher.dispatch("session.compacted", async move {
            let counters = gate
                .run("session.counters", {
                    let store = Arc::clone(&store);
                    let id = session_id.clone();
                    move || store.session_counters(&id)
                })
                .await;
            let Some(Some(counters)) = counters else {
                debug!(session_id = %session_id, "compaction skipped, counters unavailable");
                return;
            };
            let _ = gate
                .run("compaction.insert", {
                    let store = Arc::clone(&store);
                    let id = session_id.clone();
                    move || store.insert_compaction(&id, &counters)
                })
                .await;
            let _ = gate
                .run("session.reset_context", move || {
                    store.reset_context_tokens(&session_id)
                })
                .await;
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Message events
    // ─────────────────────────────────────────────────────────────────────

    fn on_message_updated(&self, payload: MessagePayload) {
        let content = match serde_json::to_string(&payload) {
            Ok(content) => Some(content),
            Err(err) => {
                error!(error = %err, "failed to serialize message payload");
                None
            }
        };

        let mut text = None;
        let mut system_prompt = payload.system_prompt.clone();
        match (payload.role, &payload.parts) {
            (MessageRole::User, Some(parts)) => {
                text = reconstruct_user_text(parts);
            }
            (MessageRole::User, None) => {
                // The host reported the message identity separately from its
                // parts; reconstruct from the buffered outbound turn.
                if let Some(chat) = self.state.take_chat(&payload.session_id) {
                    text = reconstruct_user_text(&chat.parts);
                    if system_prompt.is_none() {
                        system_prompt = chat.system_prompt;
                    }
                }
            }
            (MessageRole::Assistant, _) => {}
        }

        let apply = match payload.role {
            MessageRole::Assistant => accounting::token_apply_for(&payload)
                .filter(|_| self.state.mark_tokens_applied(&payload.session_id, &payload.id)),
            MessageRole::User => None,
        };

        let session_id = payload.session_id.clone().into_inner();
        let up = MessageUpsert {
            id: payload.id.into_inner(),
            session_id: session_id.clone(),
            role: payload.role.as_str().to_owned(),
            model_provider: payload.provider_id,
            model_id: payload.model_id,
            text,
            content,
            system_prompt,
        };

        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("message.updated", async move {
            let _ = gate
                .run("session.ensure", {
                    let store = Arc::clone(&store);
                    let id = session_id.clone();
                    move || store.ensure_session(&id)
                })
                .await;
            let _ = gate
                .run("message.upsert", {
                    let store = Arc::clone(&store);
                    move || store.upsert_message(&up)
                })
                .await;
            if let Some(apply) = apply {
                let _ = gate
                    .run("session.tokens", move || {
                        store.apply_message_tokens(&session_id, &apply)
                    })
                    .await;
            }
        });
    }

    fn on_message_removed(&self, payload: MessageRef) {
        let message_id = payload.message_id.into_inner();
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("message.delete", async move {
            let _ = gate
                .run("message.delete", move || store.delete_message(&message_id))
                .await;
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Part events
    // ─────────────────────────────────────────────────────────────────────

    fn on_part_updated(&self, payload: PartPayload) {
        // Register the call-id→part link for every sighting, regardless of
        // whether the row write below is admitted by the status gate.
        if payload.kind == part_kind::TOOL {
            if let Some(call_id) = &payload.call_id {
                self.state.link_part(call_id, &payload.id);
            }
        }

        let content = match serde_json::to_string(&payload) {
            Ok(content) => content,
            Err(err) => {
                error!(error = %err, "failed to serialize part payload");
                return;
            }
        };

        let streaming = payload.is_streaming_text();
        let status = payload.state.as_ref().and_then(|s| s.status.clone());
        let refresh_text = (payload.kind == part_kind::TEXT)
            .then(|| payload.text.clone())
            .flatten();
        let step_cost = (payload.kind == part_kind::STEP_FINISH)
            .then_some(payload.cost)
            .flatten();

        let session_id = payload.session_id.clone().into_inner();
        let message_id = payload.message_id.clone().into_inner();
        let up = PartUpsert {
            id: payload.id.into_inner(),
            message_id: message_id.clone(),
            session_id: session_id.clone(),
            part_type: payload.kind,
            tool_name: payload.tool,
            text: payload.text,
            content,
            status,
        };

        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("message.part.updated", async move {
            let _ = gate
                .run("session.ensure", {
                    let store = Arc::clone(&store);
                    let id = session_id.clone();
                    move || store.ensure_session(&id)
                })
                .await;
            let _ = gate
                .run("part.upsert", {
                    let store = Arc::clone(&store);
                    move || {
                        if streaming {
                            store.upsert_streaming_part(&up)
                        } else {
                            store.upsert_part_snapshot(&up)
                        }
                    }
                })
                .await;
            if let Some(text) = refresh_text {
                let _ = gate
                    .run("message.text", {
                        let store = Arc::clone(&store);
                        move || store.refresh_message_text(&message_id, &text)
                    })
                    .await;
            }
            if let Some(cost) = step_cost {
                let _ = gate
                    .run("session.cost", move || {
                        store.add_session_cost(&session_id, cost)
                    })
                    .await;
            }
        });
    }

    fn on_part_removed(&self, payload: PartRef) {
        let part_id = payload.part_id.into_inner();
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("part.delete", async move {
            let _ = gate
                .run("part.delete", move || store.delete_part(&part_id))
                .await;
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tool execution events
    // ─────────────────────────────────────────────────────────────────────

    fn on_tool_before(&self, payload: ToolBeforePayload) {
        let pending = PendingExecution::new(
            ExecutionId::generate(),
            payload.session_id.clone(),
            payload.tool.clone(),
            payload.args.clone(),
        );
        let new = NewToolExecution {
            id: pending.execution_id.clone().into_inner(),
            session_id: payload.session_id.into_inner(),
            call_id: Some(payload.call_id.as_str().to_owned()),
            tool_name: payload.tool,
            arguments: payload.args.map(|v| v.to_string()),
            started_at: pending.started_at.to_rfc3339(),
        };
        self.state.begin_execution(payload.call_id, pending);

        let session_id = new.session_id.clone();
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("tool.execute.before", async move {
            let _ = gate
                .run("session.ensure", {
                    let store = Arc::clone(&store);
                    move || store.ensure_session(&session_id)
                })
                .await;
            let _ = gate
                .run("execution.begin", move || store.begin_tool_execution(&new))
                .await;
        });
    }

    fn on_tool_after(&self, payload: ToolAfterPayload) {
        let completed_at = Utc::now();
        let matched = self.state.take_execution(&payload.call_id);
        let part_id = matched
            .as_ref()
            .and_then(|pending| pending.part_id.clone())
            .or_else(|| self.state.linked_part(&payload.call_id))
            .map(PartId::into_inner);

        let state_json = terminal_state_json(&payload);
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);

        if let Some(pending) = matched {
            let duration_ms = (completed_at - pending.started_at).num_milliseconds().max(0);
            let execution_id = pending.execution_id.into_inner();
            let completed = completed_at.to_rfc3339();
            let output = payload.output;
            self.dispatcher.dispatch("tool.execute.after", async move {
                let _ = gate
                    .run("execution.finish", {
                        let store = Arc::clone(&store);
                        move || {
                            store.finish_tool_execution(
                                &execution_id,
                                output.as_deref(),
                                &completed,
                                duration_ms,
                            )
                        }
                    })
                    .await;
                if let Some(part_id) = part_id {
                    let _ = gate
                        .run("part.annotate", move || {
                            store.annotate_tool_part(&part_id, &state_json)
                        })
                        .await;
                }
            });
        } else {
            // No "before" was ever seen (or it was swept): synthesize a
            // complete record. Duration stays unset — there is no
            // trustworthy start time.
            let orphan = OrphanToolExecution {
                id: ExecutionId::generate().into_inner(),
                session_id: payload.session_id.into_inner(),
                call_id: Some(payload.call_id.into_inner()),
                tool_name: payload.tool.unwrap_or_else(|| "unknown".to_owned()),
                result: payload.output,
                completed_at: completed_at.to_rfc3339(),
            };
            let session_id = orphan.session_id.clone();
            self.dispatcher.dispatch("tool.execute.after", async move {
                let _ = gate
                    .run("session.ensure", {
                        let store = Arc::clone(&store);
                        move || store.ensure_session(&session_id)
                    })
                    .await;
                let _ = gate
                    .run("execution.orphan", {
                        let store = Arc::clone(&store);
                        move || store.record_orphan_execution(&orphan)
                    })
                    .await;
                if let Some(part_id) = part_id {
                    let _ = gate
                        .run("part.annotate", move || {
                            store.annotate_tool_part(&part_id, &state_json)
                        })
                        .await;
                }
            });
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands and outbound turns
    // ─────────────────────────────────────────────────────────────────────

    fn on_command_executed(&self, payload: CommandPayload) {
        let new = NewCommand {
            session_id: payload.session_id.into_inner(),
            command: payload.command,
            arguments: payload.arguments,
        };
        let session_id = new.session_id.clone();
        let gate = Arc::clone(&self.gate);
        let store = Arc::clone(&self.store);
        self.dispatcher.dispatch("command.executed", async move {
            let _ = gate
                .run("session.ensure", {
                    let store = Arc::clone(&store);
                    move || store.ensure_session(&session_id)
                })
                .await;
            let _ = gate
                .run("command.insert", move || store.insert_command(&new))
                .await;
        });
    }

    fn on_chat_message(&self, payload: ChatMessagePayload) {
        // Pure in-memory capture; the write happens when the message
        // identity arrives.
        self.state.buffer_chat(
            payload.session_id,
            PendingChat::new(payload.parts, payload.system_prompt),
        );
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Reconstruct a user message's text from its parts.
///
/// Newline-joined contents of text-type parts. An empty part list joins to
/// an empty string; a non-empty list with no text parts yields no text.
fn reconstruct_user_text(parts: &[PartPayload]) -> Option<String> {
    if parts.is_empty() {
        return Some(String::new());
    }
    let texts: Vec<&str> = parts
        .iter()
        .filter(|p| p.kind == part_kind::TEXT)
        .filter_map(|p| p.text.as_deref())
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

/// Build the terminal state snapshot written onto the linked part.
fn terminal_state_json(payload: &ToolAfterPayload) -> String {
    let mut state = serde_json::Map::new();
    let _ = state.insert("status".to_owned(), serde_json::Value::from("completed"));
    if let Some(output) = &payload.output {
        let _ = state.insert("output".to_owned(), serde_json::Value::from(output.clone()));
    }
    if let Some(title) = &payload.title {
        let _ = state.insert("title".to_owned(), serde_json::Value::from(title.clone()));
    }
    if let Some(metadata) = &payload.metadata {
        let _ = state.insert("metadata".to_owned(), metadata.clone());
    }
    serde_json::Value::Object(state).to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
