//! # scribe-core
//!
//! Foundation types for the Scribe audit recorder:
//!
//! - **Branded IDs**: newtype wrappers distinguishing session, message, part,
//!   call, and execution identifiers
//! - **Host events**: the typed event surface delivered by the agent-execution
//!   host, with `camelCase` payloads that tolerate unknown fields
//! - **Tool status**: the closed status enum with its total priority order
//! - **Token usage**: per-message token counters in the host's nested shape

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod status;
pub mod tokens;

pub use events::HostEvent;
pub use ids::{CallId, ExecutionId, MessageId, PartId, SessionId};
pub use status::ToolStatus;
pub use tokens::{CacheUsage, TokenUsage};
