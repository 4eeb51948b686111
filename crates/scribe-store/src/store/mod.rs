//! High-level `AuditStore` API.
//!
//! The [`AuditStore`] composes the repository layer over a connection pool
//! into the flat, idempotent operation set the recorder dispatches against.

mod audit_store;

pub use audit_store::*;
