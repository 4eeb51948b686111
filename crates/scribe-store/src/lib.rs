//! # scribe-store
//!
//! `SQLite` audit store for the Scribe recorder.
//!
//! This crate is the pipeline's Store collaborator: a flat set of
//! idempotent upsert/insert/delete operations with the merge semantics the
//! write-behind core relies on for order-independent convergence:
//!
//! - **Coalesce merges**: session and message columns never regress from a
//!   known value to an absent one
//! - **Monotonic text**: streaming text only grows
//! - **Status gate**: part snapshots only move forward along the status
//!   priority order
//! - **Connection pool**: `r2d2` with WAL mode, foreign keys, and
//!   performance pragmas on every connection
//! - **Migrations**: version-tracked, embedded at compile time

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, PragmaState, new_file, new_in_memory,
    verify_pragmas,
};
pub use errors::{Result, StoreError};
pub use migrations::{current_version, latest_version, run_migrations};
pub use repositories::{
    MessageUpsert, NewCommand, NewSessionError, NewToolExecution, OrphanToolExecution, PartUpsert,
    SessionUpsert, TokenApply,
};
pub use row_types::SessionCounters;
pub use store::AuditStore;
