//! Tool execution status with its total priority order.
//!
//! The stored status of a status-bearing part may only move forward along
//! `pending → running → {completed, error}`. The order is expressed as a
//! numeric rank with an `unknown = 0` floor, so any two reported statuses
//! are comparable with a plain integer comparison — including statuses the
//! host invents that we have never seen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Execution state of a tool call as reported inside part snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// Queued, not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
}

impl ToolStatus {
    /// Priority rank of this status. Terminal states share the top rank so a
    /// `completed` snapshot can still be refreshed by a later `completed` or
    /// `error` snapshot carrying more output.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 1,
            Self::Running => 2,
            Self::Completed | Self::Error => 3,
        }
    }

    /// Rank of an optionally-present, possibly-unknown status string.
    ///
    /// Absent and unrecognized statuses rank below every known status, so
    /// they never displace recorded state.
    #[must_use]
    pub fn rank_of(status: Option<&str>) -> u8 {
        status
            .and_then(|s| s.parse::<Self>().ok())
            .map_or(0, Self::rank)
    }
}

impl FromStr for ToolStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A status string outside the closed enum.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool status: {0}")]
pub struct UnknownStatus(pub String);

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
