//! Shared infrastructure for the table-format services.
//!
//! Currently this is only the object-store wiring: every service that touches
//! a table log resolves its storage backend from a DSN through this crate so
//! that local, in-memory, and S3-compatible deployments behave identically.

pub mod storage;

pub use storage::object_store_from_dsn;
