//! `pengadaan-records` — procurement records and their CRUD service.
//!
//! Records carry an append-only edit history and a submission stamp; once a
//! record is submitted, non-admin edits are gated through the permission
//! workflow (see `pengadaan-permissions`).

pub mod procurement;
pub mod service;
pub mod store;

pub use procurement::{EditLogEntry, ProcurementItem, ProcurementRecord, ProcurementUpdate};
pub use service::{NewProcurement, ProcurementService};
pub use store::{InMemoryProcurementStore, ProcurementStore};
