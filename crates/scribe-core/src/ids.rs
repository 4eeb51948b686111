//! Branded ID newtypes for type safety.
//!
//! Host-supplied identifiers (session, message, part, call) are opaque strings
//! stored verbatim; the newtype wrappers prevent accidentally passing a call
//! id where a part id is expected. Generated identifiers (execution ids) are
//! UUID v7 (time-ordered) with a short type prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Host-supplied session identifier.
    SessionId
}

branded_id! {
    /// Host-supplied message identifier.
    MessageId
}

branded_id! {
    /// Host-supplied message part identifier.
    PartId
}

branded_id! {
    /// Host-supplied identifier correlating a tool "before" notification with
    /// its "after" notification. Not guaranteed unique or stable across
    /// retries.
    CallId
}

branded_id! {
    /// Pipeline-generated identifier for a tool execution row, independent of
    /// the host's call id.
    ExecutionId
}

impl ExecutionId {
    /// Generate a fresh execution id (`exec_` + UUID v7, time-ordered).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("exec_{}", Uuid::now_v7()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
