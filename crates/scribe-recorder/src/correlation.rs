//! Correlation state — the transient maps linking paired notifications.
//!
//! Four independent maps, each keyed by a stable externally-supplied
//! identifier and carrying a capture timestamp per entry. All four are
//! arena-style: a background sweep drops entries older than their map's
//! staleness threshold unconditionally, preferring bounded memory over
//! perfect correlation under host misbehavior.
//!
//! Tool-call lifecycle per call id:
//! `NONE -(before)-> PENDING -(after, match)-> RESOLVED(removed)`, with an
//! orphan edge `NONE -(after, no match)-> RESOLVED(synthesized)` and a
//! timeout edge `PENDING -(sweep expiry)-> RESOLVED(abandoned)`. A call id
//! never returns to `PENDING` after resolving.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use scribe_core::events::payloads::PartPayload;
use scribe_core::{CallId, ExecutionId, MessageId, PartId, SessionId};
use scribe_settings::SweepSettings;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A tool execution awaiting its "after" notification.
#[derive(Clone, Debug)]
pub struct PendingExecution {
    /// Generated correlation id for the eventual row.
    pub execution_id: ExecutionId,
    /// Owning session.
    pub session_id: SessionId,
    /// Tool name.
    pub tool: String,
    /// Argument snapshot.
    pub arguments: Option<Value>,
    /// When the "before" was observed.
    pub started_at: DateTime<Utc>,
    /// Part this execution annotates, once known.
    pub part_id: Option<PartId>,
    captured: Instant,
}

impl PendingExecution {
    /// Capture a pending execution at the current instant.
    pub fn new(
        execution_id: ExecutionId,
        session_id: SessionId,
        tool: String,
        arguments: Option<Value>,
    ) -> Self {
        Self {
            execution_id,
            session_id,
            tool,
            arguments,
            started_at: Utc::now(),
            part_id: None,
            captured: Instant::now(),
        }
    }
}

/// A call-id→part association registered by tool-type parts.
#[derive(Clone, Debug)]
struct PartLink {
    part_id: PartId,
    captured: Instant,
}

/// Buffered outbound user turn awaiting its message identity.
#[derive(Clone, Debug)]
pub struct PendingChat {
    /// Buffered parts.
    pub parts: Vec<PartPayload>,
    /// System prompt for the turn.
    pub system_prompt: Option<String>,
    captured: Instant,
}

impl PendingChat {
    /// Capture an outbound turn at the current instant.
    pub fn new(parts: Vec<PartPayload>, system_prompt: Option<String>) -> Self {
        Self {
            parts,
            system_prompt,
            captured: Instant::now(),
        }
    }
}

/// Counts of entries dropped by one sweep pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Abandoned pending executions.
    pub executions: usize,
    /// Expired call-id→part links.
    pub part_links: usize,
    /// Expired buffered user turns.
    pub chats: usize,
    /// Expired token-applied markers.
    pub token_marks: usize,
}

impl SweepStats {
    /// Total entries dropped.
    #[must_use]
    pub fn total(&self) -> usize {
        self.executions + self.part_links + self.chats + self.token_marks
    }
}

/// The four correlation maps. Mutated only from the event-handling path,
/// but safe under parallel dispatch of distinct events — all operations are
/// O(1) lookups/inserts/deletes with no long-held locks.
#[derive(Debug, Default)]
pub struct CorrelationState {
    pending_executions: DashMap<CallId, PendingExecution>,
    part_links: DashMap<CallId, PartLink>,
    pending_chats: DashMap<SessionId, PendingChat>,
    tokens_applied: DashMap<(SessionId, MessageId), Instant>,
}

impl CorrelationState {
    /// Create empty correlation state.
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Pending executions
    // ─────────────────────────────────────────────────────────────────────

    /// Register a pending execution for a call id.
    ///
    /// A repeated "before" for the same call id (host retry) replaces the
    /// stale entry. If a tool part already declared this call id, the link
    /// is adopted immediately.
    pub fn begin_execution(&self, call_id: CallId, mut pending: PendingExecution) {
        if pending.part_id.is_none() {
            pending.part_id = self.linked_part(&call_id);
        }
        let _ = self.pending_executions.insert(call_id, pending);
    }

    /// Consume the pending execution for a call id, if any.
    pub fn take_execution(&self, call_id: &CallId) -> Option<PendingExecution> {
        self.pending_executions.remove(call_id).map(|(_, v)| v)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Part links
    // ─────────────────────────────────────────────────────────────────────

    /// Register or refresh the call-id→part association.
    ///
    /// Called for every sighting of a tool part carrying a call id,
    /// independent of whether the part row write itself is admitted.
    pub fn link_part(&self, call_id: &CallId, part_id: &PartId) {
        let _ = self.part_links.insert(
            call_id.clone(),
            PartLink {
                part_id: part_id.clone(),
                captured: Instant::now(),
            },
        );
        if let Some(mut pending) = self.pending_executions.get_mut(call_id) {
            pending.part_id = Some(part_id.clone());
        }
    }

    /// The part a call id annotates, if known. Not consumed: the link must
    /// survive the pending-execution entry so a late "after" can still
    /// locate the part.
    pub fn linked_part(&self, call_id: &CallId) -> Option<PartId> {
        self.part_links.get(call_id).map(|link| link.part_id.clone())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Pending user turns
    // ─────────────────────────────────────────────────────────────────────

    /// Buffer an outbound user turn until its message identity arrives.
    pub fn buffer_chat(&self, session_id: SessionId, chat: PendingChat) {
        let _ = self.pending_chats.insert(session_id, chat);
    }

    /// Consume the buffered user turn for a session, if any.
    pub fn take_chat(&self, session_id: &SessionId) -> Option<PendingChat> {
        self.pending_chats.remove(session_id).map(|(_, v)| v)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Token accounting dedup
    // ─────────────────────────────────────────────────────────────────────

    /// Mark a message's token deltas applied to its session.
    ///
    /// Returns `true` the first time a (session, message) pair is seen;
    /// `false` on duplicate delivery.
    pub fn mark_tokens_applied(&self, session_id: &SessionId, message_id: &MessageId) -> bool {
        self.tokens_applied
            .insert((session_id.clone(), message_id.clone()), Instant::now())
            .is_none()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sweep
    // ─────────────────────────────────────────────────────────────────────

    /// Drop entries older than each map's staleness threshold.
    ///
    /// Unconditional: a pending execution that never received its "after"
    /// is abandoned, and a later "after" for it is treated as orphaned.
    pub fn sweep(&self, settings: &SweepSettings) -> SweepStats {
        SweepStats {
            executions: retain_fresh(
                &self.pending_executions,
                Duration::from_secs(settings.execution_ttl_secs),
                |e| e.captured,
            ),
            part_links: retain_fresh(
                &self.part_links,
                Duration::from_secs(settings.part_link_ttl_secs),
                |l| l.captured,
            ),
            chats: retain_fresh(
                &self.pending_chats,
                Duration::from_secs(settings.pending_chat_ttl_secs),
                |c| c.captured,
            ),
            token_marks: retain_fresh(
                &self.tokens_applied,
                Duration::from_secs(settings.token_applied_ttl_secs),
                |at| *at,
            ),
        }
    }

    /// Number of pending executions (observability and tests).
    pub fn pending_execution_count(&self) -> usize {
        self.pending_executions.len()
    }

    /// Number of registered part links.
    pub fn part_link_count(&self) -> usize {
        self.part_links.len()
    }

    /// Number of buffered user turns.
    pub fn pending_chat_count(&self) -> usize {
        self.pending_chats.len()
    }

    /// Number of token-applied markers.
    pub fn token_mark_count(&self) -> usize {
        self.tokens_applied.len()
    }
}

fn retain_fresh<K, V>(
    map: &DashMap<K, V>,
    ttl: Duration,
    captured: impl Fn(&V) -> Instant,
) -> usize
where
    K: std::hash::Hash + Eq,
{
    let before = map.len();
    map.retain(|_, v| captured(v).elapsed() < ttl);
    before.saturating_sub(map.len())
}

/// Spawn the background sweep task.
///
/// Runs independently of event traffic and never blocks it; shuts down when
/// the cancellation token fires.
pub fn spawn_sweeper(
    state: Arc<CorrelationState>,
    settings: SweepSettings,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(settings.interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let stats = state.sweep(&settings);
                    if stats.total() > 0 {
                        debug!(
                            executions = stats.executions,
                            part_links = stats.part_links,
                            chats = stats.chats,
                            token_marks = stats.token_marks,
                            "swept stale correlation entries"
                        );
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
