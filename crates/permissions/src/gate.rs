//! Edit/delete authorization gate.
//!
//! The rule ladder is a total pure function with no IO:
//!
//! 1. admins may always mutate;
//! 2. a record flagged non-editable refuses every non-admin;
//! 3. the owner may mutate their own record while it is unsubmitted;
//! 4. otherwise only an active grant of the right type allows it.
//!
//! The async wrapper performs the ledger lookup only when rules 1-3 do not
//! already decide, then delegates the verdict to [`decide`] so the two can
//! never drift apart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pengadaan_auth::UserRole;
use pengadaan_core::{DomainResult, ProcurementId, UserId};

use crate::request::PermissionType;
use crate::store::PermissionStore;

/// The slice of a procurement record the gate reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFacts {
    pub id: ProcurementId,
    pub created_by: UserId,
    pub is_editable: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Pure rule ladder. Total: returns a verdict for every input combination.
pub fn decide(
    actor: UserId,
    role: UserRole,
    record: &RecordFacts,
    has_active_grant: bool,
) -> bool {
    if role.is_admin() {
        return true;
    }
    if !record.is_editable {
        return false;
    }
    if record.created_by == actor && record.submitted_at.is_none() {
        return true;
    }
    has_active_grant
}

/// Did rules 1-3 already settle the verdict, or is the grant lookup needed?
fn needs_grant_lookup(actor: UserId, role: UserRole, record: &RecordFacts) -> bool {
    !role.is_admin()
        && record.is_editable
        && !(record.created_by == actor && record.submitted_at.is_none())
}

/// Decision procedure consulted before any procurement mutation.
///
/// Reads the ledger; never writes it. All ledger mutation stays behind the
/// workflow service.
pub struct AuthorizationGate {
    ledger: Arc<dyn PermissionStore>,
}

impl AuthorizationGate {
    pub fn new(ledger: Arc<dyn PermissionStore>) -> Self {
        Self { ledger }
    }

    /// May `actor` update the record right now?
    pub async fn can_edit(
        &self,
        actor: UserId,
        role: UserRole,
        record: &RecordFacts,
    ) -> DomainResult<bool> {
        self.check(actor, role, record, PermissionType::EditForm)
            .await
    }

    /// May `actor` delete the record right now?
    pub async fn can_delete(
        &self,
        actor: UserId,
        role: UserRole,
        record: &RecordFacts,
    ) -> DomainResult<bool> {
        self.check(actor, role, record, PermissionType::DeleteForm)
            .await
    }

    async fn check(
        &self,
        actor: UserId,
        role: UserRole,
        record: &RecordFacts,
        permission_type: PermissionType,
    ) -> DomainResult<bool> {
        let has_grant = if needs_grant_lookup(actor, role, record) {
            self.ledger
                .find_active_grant(actor, record.id, permission_type, Utc::now())
                .await?
                .is_some()
        } else {
            false
        };

        Ok(decide(actor, role, record, has_grant))
    }
}
