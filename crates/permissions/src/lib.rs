//! `pengadaan-permissions` — the edit-permission workflow.
//!
//! A small state machine governs whether a non-admin may mutate a submitted
//! procurement record: users request permission, admins approve or reject,
//! approvals expire after 24 hours (or earlier, via revocation), and a sweep
//! demotes stale grants. The ledger of requests is append-mostly and never
//! deleted; it doubles as the audit trail.
//!
//! Layering:
//! - [`request`]: the ledger entry and its pure lifecycle transitions
//! - [`store`]: persistence abstraction with conditional-write semantics
//! - [`workflow`]: the single writer enforcing ledger-wide invariants
//! - [`gate`]: the pure edit/delete authorization decision

pub mod gate;
pub mod request;
pub mod store;
pub mod workflow;

pub use gate::{AuthorizationGate, RecordFacts, decide};
pub use request::{
    GRANT_TTL_HOURS, PermissionRequest, PermissionResponse, PermissionStatus, PermissionType,
    PermissionWithContext, RecordSummary, RequesterSummary,
};
pub use store::{InMemoryPermissionStore, PermissionStore};
pub use workflow::{
    BulkItemError, BulkRespondOutcome, PermissionDecision, PermissionWorkflow, RecordDirectory,
};
