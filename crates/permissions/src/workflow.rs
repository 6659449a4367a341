//! Permission workflow service.
//!
//! The only component allowed to create or terminally mutate ledger entries.
//! Invariant checks run in a fixed order and every terminal mutation is
//! persisted through a conditional write, so a lost race surfaces as a
//! conflict instead of a double-applied side effect.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use pengadaan_auth::AccountStore;
use pengadaan_core::{
    DomainError, DomainResult, Page, Pagination, PermissionRequestId, ProcurementId, UserId,
};

use crate::request::{
    PermissionRequest, PermissionStatus, PermissionType, PermissionWithContext, RecordSummary,
    RequesterSummary,
};
use crate::store::PermissionStore;

/// Minimal read-side view of the procurement record store.
///
/// The workflow only needs existence and a summary for admin listings; the
/// full record model lives a crate above and depends on this one.
#[async_trait]
pub trait RecordDirectory: Send + Sync {
    async fn record_summary(&self, id: ProcurementId) -> DomainResult<Option<RecordSummary>>;
}

/// Admin decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Approved,
    Rejected,
}

/// Per-item failure in a bulk response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    pub permission_id: PermissionRequestId,
    pub message: String,
}

/// Outcome of a bulk response: each sub-request is processed independently
/// and partial failure is reported per item, never as a batch abort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRespondOutcome {
    pub successful: u32,
    pub failed: u32,
    pub results: Vec<PermissionRequest>,
    pub errors: Vec<BulkItemError>,
}

/// Orchestrates creation, admin response, revocation and the expiry sweep
/// over the permission ledger.
pub struct PermissionWorkflow {
    accounts: Arc<dyn AccountStore>,
    records: Arc<dyn RecordDirectory>,
    ledger: Arc<dyn PermissionStore>,
}

impl PermissionWorkflow {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        records: Arc<dyn RecordDirectory>,
        ledger: Arc<dyn PermissionStore>,
    ) -> Self {
        Self {
            accounts,
            records,
            ledger,
        }
    }

    /// File a new permission request.
    ///
    /// Checks, in order: requester exists and is active, target record
    /// exists, no duplicate pending request, no active grant. The store's
    /// own uniqueness guard backstops the duplicate check under races.
    pub async fn request_permission(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
        reason: impl Into<String>,
    ) -> DomainResult<PermissionRequest> {
        let account = self
            .accounts
            .get(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user not found"))?;
        if !account.can_act() {
            return Err(DomainError::unauthorized("account is not active"));
        }

        self.records
            .record_summary(procurement_id)
            .await?
            .ok_or_else(|| DomainError::not_found("procurement record not found"))?;

        let now = Utc::now();

        if self
            .ledger
            .find_pending(user_id, procurement_id, permission_type)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(
                "You already have a pending request for this form",
            ));
        }

        if self
            .ledger
            .find_active_grant(user_id, procurement_id, permission_type, now)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(
                "You already have active permission for this form",
            ));
        }

        let request =
            PermissionRequest::new(user_id, procurement_id, permission_type, reason, now)?;
        self.ledger.insert_pending(request.clone()).await?;

        tracing::info!(
            id = %request.id,
            user = %user_id,
            record = %procurement_id,
            kind = %permission_type,
            "permission requested"
        );
        Ok(request)
    }

    /// Approve or reject a pending request.
    pub async fn respond_to_request(
        &self,
        permission_id: PermissionRequestId,
        admin_id: UserId,
        decision: PermissionDecision,
        response: Option<String>,
    ) -> DomainResult<PermissionRequest> {
        self.ensure_admin(admin_id).await?;

        let request = self
            .ledger
            .get(permission_id)
            .await?
            .ok_or_else(|| DomainError::not_found("permission request not found"))?;

        let now = Utc::now();
        let updated = match decision {
            PermissionDecision::Approved => request.approve(admin_id, response, now)?,
            PermissionDecision::Rejected => {
                let response = response
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        DomainError::validation("Response is required when rejecting a request")
                    })?;
                request.reject(admin_id, response, now)?
            }
        };

        // Conditional write: if another admin already responded, zero rows
        // match and the second response is a conflict, not a double-apply.
        if !self
            .ledger
            .update_if_status(&updated, PermissionStatus::Pending)
            .await?
        {
            return Err(DomainError::conflict("Request has already been processed"));
        }

        tracing::info!(
            id = %updated.id,
            admin = %admin_id,
            status = %updated.status,
            "permission request resolved"
        );
        Ok(updated)
    }

    /// Whether `user_id` currently holds an active `EDIT_FORM` grant on the
    /// record. Pure read, no mutation.
    pub async fn has_edit_permission(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
    ) -> DomainResult<bool> {
        Ok(self
            .ledger
            .find_active_grant(user_id, procurement_id, PermissionType::EditForm, Utc::now())
            .await?
            .is_some())
    }

    /// Same read, scoped to `DELETE_FORM`.
    pub async fn has_delete_permission(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
    ) -> DomainResult<bool> {
        Ok(self
            .ledger
            .find_active_grant(
                user_id,
                procurement_id,
                PermissionType::DeleteForm,
                Utc::now(),
            )
            .await?
            .is_some())
    }

    /// Revoke an active grant, forcing immediate expiry.
    pub async fn revoke_permission(
        &self,
        permission_id: PermissionRequestId,
        admin_id: UserId,
        reason: impl Into<String>,
    ) -> DomainResult<PermissionRequest> {
        self.ensure_admin(admin_id).await?;

        let request = self
            .ledger
            .get(permission_id)
            .await?
            .ok_or_else(|| DomainError::not_found("permission request not found"))?;

        let updated = request.revoke(admin_id, reason, Utc::now())?;

        if !self
            .ledger
            .update_if_status(&updated, PermissionStatus::Approved)
            .await?
        {
            return Err(DomainError::conflict("Permission is not active"));
        }

        tracing::info!(id = %updated.id, admin = %admin_id, "permission revoked");
        Ok(updated)
    }

    /// Respond to many requests; each item is processed independently.
    pub async fn bulk_respond(
        &self,
        permission_ids: &[PermissionRequestId],
        admin_id: UserId,
        decision: PermissionDecision,
        response: Option<String>,
    ) -> DomainResult<BulkRespondOutcome> {
        self.ensure_admin(admin_id).await?;

        let mut outcome = BulkRespondOutcome {
            successful: 0,
            failed: 0,
            results: Vec::new(),
            errors: Vec::new(),
        };

        for &id in permission_ids {
            match self
                .respond_to_request(id, admin_id, decision, response.clone())
                .await
            {
                Ok(updated) => {
                    outcome.successful += 1;
                    outcome.results.push(updated);
                }
                Err(err) => {
                    outcome.failed += 1;
                    outcome.errors.push(BulkItemError {
                        permission_id: id,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Demote every grant whose expiry has elapsed. Idempotent.
    pub async fn cleanup_expired(&self) -> DomainResult<u64> {
        let swept = self.ledger.expire_due(Utc::now()).await?;
        if swept > 0 {
            tracing::info!(count = swept, "expired permissions swept");
        }
        Ok(swept)
    }

    /// A user's own requests, newest first.
    pub async fn list_own(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionRequest>> {
        self.ledger.list_by_user(user_id, pagination).await
    }

    /// Pending requests for admin review, enriched with requester/record
    /// summaries. Missing references degrade to `None` rather than failing
    /// the listing.
    pub async fn list_pending(
        &self,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionWithContext>> {
        let page = self
            .ledger
            .list_by_status(PermissionStatus::Pending, pagination)
            .await?;
        let now = Utc::now();

        let mut enriched = Vec::with_capacity(page.items.len());
        for entry in &page.items {
            let requester = self.accounts.get(entry.user_id).await?.map(|a| RequesterSummary {
                id: a.id,
                email: a.email,
                display_name: a.display_name,
            });
            let record = self.records.record_summary(entry.procurement_id).await?;
            enriched.push(PermissionWithContext {
                permission: entry.to_response(now),
                requester,
                record,
            });
        }

        Ok(Page::new(enriched, page.total, page.pagination))
    }

    async fn ensure_admin(&self, admin_id: UserId) -> DomainResult<()> {
        let account = self
            .accounts
            .get(admin_id)
            .await?
            .ok_or_else(|| DomainError::not_found("admin not found"))?;
        if !account.role.is_admin() {
            return Err(DomainError::unauthorized("admin role required"));
        }
        if !account.can_act() {
            return Err(DomainError::unauthorized("account is not active"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    use chrono::Duration;

    use pengadaan_auth::{Account, AccountStatus, InMemoryAccountStore, UserRole};

    use crate::request::GRANT_TTL_HOURS;
    use crate::store::InMemoryPermissionStore;

    /// Stub directory backed by a map; the real one lives in the records crate.
    #[derive(Default)]
    struct StubRecords {
        records: RwLock<HashMap<ProcurementId, RecordSummary>>,
    }

    impl StubRecords {
        fn add(&self, created_by: UserId) -> ProcurementId {
            let id = ProcurementId::new();
            self.records.write().unwrap().insert(
                id,
                RecordSummary {
                    id,
                    title: "Server procurement".to_string(),
                    created_by,
                },
            );
            id
        }
    }

    #[async_trait]
    impl RecordDirectory for StubRecords {
        async fn record_summary(&self, id: ProcurementId) -> DomainResult<Option<RecordSummary>> {
            Ok(self.records.read().unwrap().get(&id).cloned())
        }
    }

    struct Fixture {
        workflow: PermissionWorkflow,
        accounts: Arc<InMemoryAccountStore>,
        records: Arc<StubRecords>,
        ledger: Arc<InMemoryPermissionStore>,
    }

    impl Fixture {
        async fn new() -> Self {
            let accounts = Arc::new(InMemoryAccountStore::new());
            let records = Arc::new(StubRecords::default());
            let ledger = Arc::new(InMemoryPermissionStore::new());
            let workflow = PermissionWorkflow::new(
                accounts.clone(),
                records.clone(),
                ledger.clone(),
            );
            Self {
                workflow,
                accounts,
                records,
                ledger,
            }
        }

        async fn user(&self) -> UserId {
            let account = Account::new(
                UserId::new(),
                format!("{}@example.com", UserId::new()),
                "A User",
                UserRole::User,
                Utc::now(),
            )
            .unwrap();
            let id = account.id;
            self.accounts.insert(account).await.unwrap();
            id
        }

        async fn admin(&self) -> UserId {
            let account = Account::new(
                UserId::new(),
                format!("{}@example.com", UserId::new()),
                "An Admin",
                UserRole::Admin,
                Utc::now(),
            )
            .unwrap();
            let id = account.id;
            self.accounts.insert(account).await.unwrap();
            id
        }

        /// Plant an approved grant whose expiry already elapsed.
        async fn stale_grant(&self, user: UserId, record: ProcurementId) -> PermissionRequestId {
            let past = Utc::now() - Duration::hours(GRANT_TTL_HOURS + 1);
            let req = PermissionRequest::new(
                user,
                record,
                PermissionType::EditForm,
                "old work",
                past,
            )
            .unwrap();
            let id = req.id;
            self.ledger.insert_pending(req.clone()).await.unwrap();
            let approved = req.approve(UserId::new(), None, past).unwrap();
            self.ledger
                .update_if_status(&approved, PermissionStatus::Pending)
                .await
                .unwrap();
            id
        }
    }

    #[tokio::test]
    async fn request_creates_pending_entry() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let record = fx.records.add(user);

        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();

        assert_eq!(req.status, PermissionStatus::Pending);
        assert!(req.expires_at.is_none());
    }

    #[tokio::test]
    async fn duplicate_pending_request_is_conflict() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let record = fx.records.add(user);

        fx.workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();

        let err = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo again")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::conflict("You already have a pending request for this form")
        );
    }

    #[tokio::test]
    async fn request_against_missing_record_is_not_found() {
        let fx = Fixture::new().await;
        let user = fx.user().await;

        let err = fx
            .workflow
            .request_permission(
                user,
                ProcurementId::new(),
                PermissionType::EditForm,
                "anything",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn suspended_requester_is_refused() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let record = fx.records.add(user);
        fx.accounts
            .update_status(user, AccountStatus::Suspended)
            .await
            .unwrap();

        let err = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "please")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn approve_then_permission_check_then_expiry() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let admin = fx.admin().await;
        let record = fx.records.add(user);

        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();

        let approved = fx
            .workflow
            .respond_to_request(req.id, admin, PermissionDecision::Approved, None)
            .await
            .unwrap();
        assert_eq!(approved.status, PermissionStatus::Approved);
        assert_eq!(approved.admin_id, Some(admin));
        assert!(approved.expires_at.is_some());

        assert!(fx.workflow.has_edit_permission(user, record).await.unwrap());
        // Scoped to type: no delete grant was issued.
        assert!(!fx.workflow.has_delete_permission(user, record).await.unwrap());
    }

    #[tokio::test]
    async fn second_response_is_conflict() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let admin = fx.admin().await;
        let record = fx.records.add(user);

        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();

        fx.workflow
            .respond_to_request(req.id, admin, PermissionDecision::Approved, None)
            .await
            .unwrap();

        let err = fx
            .workflow
            .respond_to_request(
                req.id,
                admin,
                PermissionDecision::Rejected,
                Some("changed my mind".to_string()),
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::conflict("Request has already been processed"));
    }

    #[tokio::test]
    async fn reject_without_response_is_validation_failure() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let admin = fx.admin().await;
        let record = fx.records.add(user);

        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();

        let err = fx
            .workflow
            .respond_to_request(
                req.id,
                admin,
                PermissionDecision::Rejected,
                Some("   ".to_string()),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("Response is required when rejecting a request")
        );
    }

    #[tokio::test]
    async fn non_admin_cannot_respond() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let other = fx.user().await;
        let record = fx.records.add(user);

        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();

        let err = fx
            .workflow
            .respond_to_request(req.id, other, PermissionDecision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn stale_grant_denies_and_sweep_flips_it() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let record = fx.records.add(user);
        let id = fx.stale_grant(user, record).await;

        // Passively expired: the check already says no before any sweep.
        assert!(!fx.workflow.has_edit_permission(user, record).await.unwrap());

        assert_eq!(fx.workflow.cleanup_expired().await.unwrap(), 1);
        assert_eq!(fx.workflow.cleanup_expired().await.unwrap(), 0);

        let entry = fx.ledger.get(id).await.unwrap().unwrap();
        assert_eq!(entry.status, PermissionStatus::Expired);
    }

    #[tokio::test]
    async fn revoke_then_second_revoke_is_conflict() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let admin = fx.admin().await;
        let record = fx.records.add(user);

        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();
        fx.workflow
            .respond_to_request(req.id, admin, PermissionDecision::Approved, None)
            .await
            .unwrap();

        let revoked = fx
            .workflow
            .revoke_permission(req.id, admin, "no longer needed")
            .await
            .unwrap();
        assert_eq!(revoked.status, PermissionStatus::Expired);
        assert!(revoked
            .admin_response
            .as_deref()
            .unwrap()
            .contains("no longer needed"));
        assert!(!fx.workflow.has_edit_permission(user, record).await.unwrap());

        let err = fx
            .workflow
            .revoke_permission(req.id, admin, "again")
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::conflict("Permission is not active"));
    }

    #[tokio::test]
    async fn re_request_after_expiry_is_allowed() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let record = fx.records.add(user);
        fx.stale_grant(user, record).await;

        // The old grant is expired, so a fresh request passes both checks.
        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "more fixes")
            .await
            .unwrap();
        assert_eq!(req.status, PermissionStatus::Pending);
    }

    #[tokio::test]
    async fn active_grant_blocks_new_request() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let admin = fx.admin().await;
        let record = fx.records.add(user);

        let req = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();
        fx.workflow
            .respond_to_request(req.id, admin, PermissionDecision::Approved, None)
            .await
            .unwrap();

        let err = fx
            .workflow
            .request_permission(user, record, PermissionType::EditForm, "more")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::conflict("You already have active permission for this form")
        );
    }

    #[tokio::test]
    async fn bulk_respond_reports_partial_failure() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let user_a = fx.user().await;
        let user_b = fx.user().await;
        let record = fx.records.add(user_a);

        let a = fx
            .workflow
            .request_permission(user_a, record, PermissionType::EditForm, "a")
            .await
            .unwrap();
        let b = fx
            .workflow
            .request_permission(user_b, record, PermissionType::EditForm, "b")
            .await
            .unwrap();

        // Resolve `b` up front so the bulk call hits an already-processed item.
        fx.workflow
            .respond_to_request(b.id, admin, PermissionDecision::Approved, None)
            .await
            .unwrap();

        let missing = PermissionRequestId::new();
        let outcome = fx
            .workflow
            .bulk_respond(
                &[a.id, b.id, missing],
                admin,
                PermissionDecision::Approved,
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.successful, 1);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].id, a.id);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[tokio::test]
    async fn pending_listing_is_enriched() {
        let fx = Fixture::new().await;
        let user = fx.user().await;
        let record = fx.records.add(user);

        fx.workflow
            .request_permission(user, record, PermissionType::EditForm, "fix typo")
            .await
            .unwrap();

        let page = fx.workflow.list_pending(Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        let entry = &page.items[0];
        assert_eq!(entry.requester.as_ref().unwrap().id, user);
        assert_eq!(entry.record.as_ref().unwrap().id, record);
    }
}
