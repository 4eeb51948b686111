//! # scribe-recorder
//!
//! The event-correlation and write-behind pipeline of the Scribe audit
//! recorder — everything with real invariants, races, and failure handling
//! lives here.
//!
//! - **[`health`]**: circuit-breaker admission gate with capped exponential
//!   backoff and a per-operation timeout race
//! - **[`correlation`]**: the four transient maps linking paired
//!   notifications, swept on a fixed interval
//! - **[`dispatcher`]**: fire-and-forget submission of per-event store
//!   chains — persistence latency never blocks event intake
//! - **[`accounting`]**: session-scoped token totals, applied exactly once
//!   per contributing message
//! - **[`recorder`]**: the per-event handler tying it all together
//!
//! Attachment is fail-closed: if the startup connectivity probe fails, no
//! event handling is registered for the process lifetime.

#![deny(unsafe_code)]

pub mod accounting;
pub mod correlation;
pub mod dispatcher;
pub mod errors;
pub mod health;
pub mod recorder;

pub use correlation::{CorrelationState, PendingChat, PendingExecution, SweepStats};
pub use dispatcher::Dispatcher;
pub use errors::{RecorderError, Result};
pub use health::HealthGate;
pub use recorder::Recorder;
