//! `pengadaan-infra` — persistent storage backends.
//!
//! Currently: the PostgreSQL-backed permission ledger. The in-memory stores
//! used for dev/test live next to their trait definitions.

pub mod postgres;

pub use postgres::{PostgresPermissionStore, ensure_schema};
