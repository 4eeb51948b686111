//! Event payload structs, `camelCase` on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{CallId, MessageId, PartId, SessionId};
use crate::status::ToolStatus;
use crate::tokens::TokenUsage;

/// Well-known part type strings.
pub mod part_kind {
    /// Streaming assistant text.
    pub const TEXT: &str = "text";
    /// Streaming reasoning text.
    pub const REASONING: &str = "reasoning";
    /// Tool call with nested execution state.
    pub const TOOL: &str = "tool";
    /// Step boundary opening a model turn.
    pub const STEP_START: &str = "step-start";
    /// Step boundary closing a model turn, carries cost.
    pub const STEP_FINISH: &str = "step-finish";
    /// File attachment.
    pub const FILE: &str = "file";
}

/// Bare session reference carried by `session.deleted|idle|compacted`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    /// Session this event refers to.
    pub session_id: SessionId,
}

/// Session snapshot carried by `session.created|updated`.
///
/// Everything but the id is optional: the host reports sessions repeatedly
/// with partial, overlapping data, and absent fields must never erase
/// recorded ones.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// Session id.
    pub id: SessionId,
    /// Parent session, for sub-sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Project the session belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Lifecycle status as reported by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Public share URL, if shared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
    /// Model provider identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Fields we do not model, retained verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `session.error`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionErrorPayload {
    /// Session the error belongs to. An absent id makes the event
    /// unattributable and it is dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Error class name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Message role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Human turn.
    User,
    /// Model turn.
    Assistant,
}

impl MessageRole {
    /// Stable string form used in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Message snapshot carried by `message.updated`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Message id.
    pub id: MessageId,
    /// Owning session.
    pub session_id: SessionId,
    /// Role of the message author.
    pub role: MessageRole,
    /// Model provider identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// System prompt snapshot, when the host includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Embedded parts, when the host includes them. A user message arriving
    /// without parts is reconstructed from the buffered `chat.message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<PartPayload>>,
    /// Token usage deltas for this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    /// Cost in USD attributed to this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Fields we do not model, retained verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference carried by `message.removed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Owning session.
    pub session_id: SessionId,
    /// Removed message.
    pub message_id: MessageId,
}

/// Part snapshot carried by `message.part.updated` and inside
/// `chat.message` / embedded message parts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartPayload {
    /// Part id.
    pub id: PartId,
    /// Owning message.
    pub message_id: MessageId,
    /// Owning session.
    pub session_id: SessionId,
    /// Part type (`text`, `reasoning`, `tool`, `step-finish`, …). Kept as a
    /// string: the host may introduce types we have never seen.
    #[serde(rename = "type")]
    pub kind: String,
    /// Tool name, for tool parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Call id correlating this part with tool execute notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    /// Best-known text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Cost carried by `step-finish` parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Nested execution state for status-bearing parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ToolState>,
    /// Fields we do not model, retained verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PartPayload {
    /// Whether this part type streams token-by-token text and merges under
    /// the monotonic-length rule rather than the status gate.
    #[must_use]
    pub fn is_streaming_text(&self) -> bool {
        self.kind == part_kind::TEXT || self.kind == part_kind::REASONING
    }

    /// Priority rank of the status embedded in this snapshot.
    #[must_use]
    pub fn status_rank(&self) -> u8 {
        ToolStatus::rank_of(self.state.as_ref().and_then(|s| s.status.as_deref()))
    }
}

/// Nested execution state inside a status-bearing part.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolState {
    /// Execution status string (`pending`, `running`, `completed`, `error`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Tool input arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Tool output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Short display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Fields we do not model, retained verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference carried by `message.part.removed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRef {
    /// Owning session.
    pub session_id: SessionId,
    /// Owning message, when the host reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Removed part.
    pub part_id: PartId,
}

/// Payload of `command.executed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    /// Session the command ran in.
    pub session_id: SessionId,
    /// Command name.
    pub command: String,
    /// Raw argument string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Payload of `tool.execute.before`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolBeforePayload {
    /// Session the call belongs to.
    pub session_id: SessionId,
    /// Host call id pairing this with the matching "after".
    pub call_id: CallId,
    /// Tool name.
    pub tool: String,
    /// Argument snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// Payload of `tool.execute.after`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAfterPayload {
    /// Session the call belongs to.
    pub session_id: SessionId,
    /// Host call id pairing this with the matching "before".
    pub call_id: CallId,
    /// Tool name; present so an orphan "after" can still synthesize a record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Tool output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Short display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Structured result metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Payload of `chat.message`: the outbound parts and system prompt of a user
/// turn, delivered before the message identity is known.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    /// Session the turn belongs to.
    pub session_id: SessionId,
    /// Outbound parts.
    #[serde(default)]
    pub parts: Vec<PartPayload>,
    /// System prompt for the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
