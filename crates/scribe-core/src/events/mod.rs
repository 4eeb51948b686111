//! The typed event surface delivered by the agent-execution host.
//!
//! Every variant serializes with the exact dot-separated tag the host emits
//! (e.g. `"session.created"`). Payloads are deliberately loose: all fields
//! beyond the identifying ones are optional, and unknown fields are retained
//! in a flattened map so the persisted snapshot loses nothing. The host's
//! event semantics are trusted as reported; arrival order is not.

pub mod payloads;

use serde::{Deserialize, Serialize};

pub use payloads::{
    ChatMessagePayload, CommandPayload, MessagePayload, MessageRef, MessageRole, PartPayload,
    PartRef, SessionErrorPayload, SessionPayload, SessionRef, ToolAfterPayload, ToolBeforePayload,
    ToolState,
};

/// A single event from the host, tagged by kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties")]
pub enum HostEvent {
    /// New session started.
    #[serde(rename = "session.created")]
    SessionCreated(SessionPayload),
    /// Session attributes changed.
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionPayload),
    /// Session removed by the host.
    #[serde(rename = "session.deleted")]
    SessionDeleted(SessionRef),
    /// Session went idle.
    #[serde(rename = "session.idle")]
    SessionIdle(SessionRef),
    /// Session-level error.
    #[serde(rename = "session.error")]
    SessionError(SessionErrorPayload),
    /// Session context was compacted.
    #[serde(rename = "session.compacted")]
    SessionCompacted(SessionRef),
    /// Message created or updated.
    #[serde(rename = "message.updated")]
    MessageUpdated(MessagePayload),
    /// Message removed.
    #[serde(rename = "message.removed")]
    MessageRemoved(MessageRef),
    /// Message part created or updated (streaming).
    #[serde(rename = "message.part.updated")]
    MessagePartUpdated(PartPayload),
    /// Message part removed.
    #[serde(rename = "message.part.removed")]
    MessagePartRemoved(PartRef),
    /// Slash command executed.
    #[serde(rename = "command.executed")]
    CommandExecuted(CommandPayload),
    /// Tool call about to execute.
    #[serde(rename = "tool.execute.before")]
    ToolExecuteBefore(ToolBeforePayload),
    /// Tool call finished executing.
    #[serde(rename = "tool.execute.after")]
    ToolExecuteAfter(ToolAfterPayload),
    /// Outbound user turn, delivered before the message identity is known.
    #[serde(rename = "chat.message")]
    ChatMessage(ChatMessagePayload),
}

impl HostEvent {
    /// The dot-separated kind tag of this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreated(_) => "session.created",
            Self::SessionUpdated(_) => "session.updated",
            Self::SessionDeleted(_) => "session.deleted",
            Self::SessionIdle(_) => "session.idle",
            Self::SessionError(_) => "session.error",
            Self::SessionCompacted(_) => "session.compacted",
            Self::MessageUpdated(_) => "message.updated",
            Self::MessageRemoved(_) => "message.removed",
            Self::MessagePartUpdated(_) => "message.part.updated",
            Self::MessagePartRemoved(_) => "message.part.removed",
            Self::CommandExecuted(_) => "command.executed",
            Self::ToolExecuteBefore(_) => "tool.execute.before",
            Self::ToolExecuteAfter(_) => "tool.execute.after",
            Self::ChatMessage(_) => "chat.message",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
