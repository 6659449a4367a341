//! Procurement CRUD service.
//!
//! Every mutating operation by a non-admin goes through the authorization
//! gate first; a denial short-circuits before any write is attempted. The
//! service never touches the permission ledger directly.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use pengadaan_auth::Actor;
use pengadaan_core::{DomainError, DomainResult, Page, Pagination, ProcurementId, UserId};
use pengadaan_permissions::AuthorizationGate;

use crate::procurement::{ProcurementItem, ProcurementRecord, ProcurementUpdate};
use crate::store::ProcurementStore;

/// Input for creating a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProcurement {
    pub title: String,
    pub description: String,
    pub items: Vec<ProcurementItem>,
}

pub struct ProcurementService {
    store: Arc<dyn ProcurementStore>,
    gate: AuthorizationGate,
}

impl ProcurementService {
    pub fn new(store: Arc<dyn ProcurementStore>, gate: AuthorizationGate) -> Self {
        Self { store, gate }
    }

    pub async fn create(
        &self,
        actor: Actor,
        input: NewProcurement,
    ) -> DomainResult<ProcurementRecord> {
        let record = ProcurementRecord::new(
            actor.user_id,
            input.title,
            input.description,
            input.items,
            Utc::now(),
        )?;
        self.store.insert(record.clone()).await?;

        tracing::info!(id = %record.id, user = %actor.user_id, "procurement record created");
        Ok(record)
    }

    pub async fn get(&self, id: ProcurementId) -> DomainResult<ProcurementRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("procurement record not found"))
    }

    pub async fn update(
        &self,
        actor: Actor,
        id: ProcurementId,
        changes: ProcurementUpdate,
    ) -> DomainResult<ProcurementRecord> {
        let record = self.get(id).await?;

        if !self
            .gate
            .can_edit(actor.user_id, actor.role, &record.facts())
            .await?
        {
            return Err(DomainError::unauthorized(
                "You do not have permission to edit this record",
            ));
        }

        let updated = record.updated(changes, actor.user_id, Utc::now())?;
        self.store.update(&updated).await?;

        tracing::info!(id = %id, user = %actor.user_id, "procurement record updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: Actor, id: ProcurementId) -> DomainResult<()> {
        let record = self.get(id).await?;

        if !self
            .gate
            .can_delete(actor.user_id, actor.role, &record.facts())
            .await?
        {
            return Err(DomainError::unauthorized(
                "You do not have permission to delete this record",
            ));
        }

        self.store.delete(id).await?;
        tracing::info!(id = %id, user = %actor.user_id, "procurement record deleted");
        Ok(())
    }

    /// Submit a record for review. Only the owner (or an admin) may submit.
    pub async fn submit(&self, actor: Actor, id: ProcurementId) -> DomainResult<ProcurementRecord> {
        let record = self.get(id).await?;

        if !actor.is_admin() && record.created_by != actor.user_id {
            return Err(DomainError::unauthorized(
                "Only the owner may submit this record",
            ));
        }

        let submitted = record.submitted(actor.user_id, Utc::now())?;
        self.store.update(&submitted).await?;

        tracing::info!(id = %id, user = %actor.user_id, "procurement record submitted");
        Ok(submitted)
    }

    /// Lock or unlock a record for editing. Admin only.
    pub async fn set_editable(
        &self,
        actor: Actor,
        id: ProcurementId,
        is_editable: bool,
    ) -> DomainResult<ProcurementRecord> {
        if !actor.is_admin() {
            return Err(DomainError::unauthorized("admin role required"));
        }

        let record = self.get(id).await?;
        let updated = record.with_editable(is_editable, actor.user_id, Utc::now());
        self.store.update(&updated).await?;
        Ok(updated)
    }

    /// Admins see every record; users see their own.
    pub async fn list(
        &self,
        actor: Actor,
        pagination: Pagination,
    ) -> DomainResult<Page<ProcurementRecord>> {
        self.store.list(self.visibility(actor), pagination).await
    }

    pub async fn search(
        &self,
        actor: Actor,
        query: &str,
        pagination: Pagination,
    ) -> DomainResult<Page<ProcurementRecord>> {
        self.store
            .search(query, self.visibility(actor), pagination)
            .await
    }

    pub async fn export(&self, actor: Actor) -> DomainResult<Vec<ProcurementRecord>> {
        self.store.export(self.visibility(actor)).await
    }

    fn visibility(&self, actor: Actor) -> Option<UserId> {
        if actor.is_admin() {
            None
        } else {
            Some(actor.user_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use pengadaan_auth::UserRole;
    use pengadaan_permissions::{
        InMemoryPermissionStore, PermissionRequest, PermissionStatus, PermissionStore,
        PermissionType,
    };

    use crate::store::InMemoryProcurementStore;

    struct Fixture {
        service: ProcurementService,
        ledger: Arc<InMemoryPermissionStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryProcurementStore::new());
            let ledger = Arc::new(InMemoryPermissionStore::new());
            let gate = AuthorizationGate::new(ledger.clone());
            Self {
                service: ProcurementService::new(store, gate),
                ledger,
            }
        }

        /// Plant an active grant straight into the ledger.
        async fn grant(&self, user: UserId, record: ProcurementId, kind: PermissionType) {
            let now = Utc::now();
            let req = PermissionRequest::new(user, record, kind, "granted in test", now).unwrap();
            self.ledger.insert_pending(req.clone()).await.unwrap();
            let approved = req.approve(UserId::new(), None, now).unwrap();
            self.ledger
                .update_if_status(&approved, PermissionStatus::Pending)
                .await
                .unwrap();
        }
    }

    fn user() -> Actor {
        Actor::new(UserId::new(), UserRole::User)
    }

    fn admin() -> Actor {
        Actor::new(UserId::new(), UserRole::Admin)
    }

    fn input(title: &str) -> NewProcurement {
        NewProcurement {
            title: title.to_string(),
            description: "test".to_string(),
            items: vec![ProcurementItem {
                name: "thing".to_string(),
                quantity: 1,
                unit_price: 500,
            }],
        }
    }

    fn retitle(title: &str) -> ProcurementUpdate {
        ProcurementUpdate {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn owner_edits_own_draft() {
        let fx = Fixture::new();
        let owner = user();
        let rec = fx.service.create(owner, input("Draft")).await.unwrap();

        let updated = fx
            .service
            .update(owner, rec.id, retitle("Draft v2"))
            .await
            .unwrap();
        assert_eq!(updated.title, "Draft v2");
        assert_eq!(updated.edit_history.len(), 1);
    }

    #[tokio::test]
    async fn non_owner_cannot_edit() {
        let fx = Fixture::new();
        let rec = fx.service.create(user(), input("Draft")).await.unwrap();

        let err = fx
            .service
            .update(user(), rec.id, retitle("hijacked"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        // Denied before any write: the record is untouched.
        let stored = fx.service.get(rec.id).await.unwrap();
        assert_eq!(stored.title, "Draft");
        assert!(stored.edit_history.is_empty());
    }

    #[tokio::test]
    async fn submission_locks_out_the_owner_until_granted() {
        let fx = Fixture::new();
        let owner = user();
        let rec = fx.service.create(owner, input("Form")).await.unwrap();
        fx.service.submit(owner, rec.id).await.unwrap();

        let err = fx
            .service
            .update(owner, rec.id, retitle("after submit"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        fx.grant(owner.user_id, rec.id, PermissionType::EditForm).await;
        let updated = fx
            .service
            .update(owner, rec.id, retitle("after submit"))
            .await
            .unwrap();
        assert_eq!(updated.title, "after submit");
    }

    #[tokio::test]
    async fn admin_edits_anything() {
        let fx = Fixture::new();
        let rec = fx.service.create(user(), input("Form")).await.unwrap();
        fx.service
            .set_editable(admin(), rec.id, false)
            .await
            .unwrap();

        let updated = fx
            .service
            .update(admin(), rec.id, retitle("admin edit"))
            .await
            .unwrap();
        assert_eq!(updated.title, "admin edit");
    }

    #[tokio::test]
    async fn locked_record_refuses_even_the_owner() {
        let fx = Fixture::new();
        let owner = user();
        let rec = fx.service.create(owner, input("Form")).await.unwrap();
        fx.service
            .set_editable(admin(), rec.id, false)
            .await
            .unwrap();

        let err = fx
            .service
            .update(owner, rec.id, retitle("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn delete_needs_its_own_grant_kind() {
        let fx = Fixture::new();
        let owner = user();
        let rec = fx.service.create(owner, input("Form")).await.unwrap();
        fx.service.submit(owner, rec.id).await.unwrap();

        // An edit grant does not allow deletion.
        fx.grant(owner.user_id, rec.id, PermissionType::EditForm).await;
        let err = fx.service.delete(owner, rec.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        fx.grant(owner.user_id, rec.id, PermissionType::DeleteForm).await;
        fx.service.delete(owner, rec.id).await.unwrap();
        assert!(matches!(
            fx.service.get(rec.id).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn only_owner_or_admin_submits() {
        let fx = Fixture::new();
        let rec = fx.service.create(user(), input("Form")).await.unwrap();

        let err = fx.service.submit(user(), rec.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        let submitted = fx.service.submit(admin(), rec.id).await.unwrap();
        assert!(submitted.submitted_at.is_some());
    }

    #[tokio::test]
    async fn listing_visibility_follows_role() {
        let fx = Fixture::new();
        let alice = user();
        let bob = user();
        fx.service.create(alice, input("Alice 1")).await.unwrap();
        fx.service.create(bob, input("Bob 1")).await.unwrap();

        let page = fx
            .service
            .list(alice, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let page = fx
            .service
            .list(admin(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let exported = fx.service.export(admin()).await.unwrap();
        assert_eq!(exported.len(), 2);
        let exported = fx.service.export(bob).await.unwrap();
        assert_eq!(exported.len(), 1);
    }

    #[tokio::test]
    async fn expired_grant_no_longer_opens_the_record() {
        let fx = Fixture::new();
        let owner = user();
        let rec = fx.service.create(owner, input("Form")).await.unwrap();
        fx.service.submit(owner, rec.id).await.unwrap();

        // Grant approved 25 hours ago: already past its window.
        let past = Utc::now() - Duration::hours(25);
        let req = PermissionRequest::new(
            owner.user_id,
            rec.id,
            PermissionType::EditForm,
            "old",
            past,
        )
        .unwrap();
        fx.ledger.insert_pending(req.clone()).await.unwrap();
        let approved = req.approve(UserId::new(), None, past).unwrap();
        fx.ledger
            .update_if_status(&approved, PermissionStatus::Pending)
            .await
            .unwrap();

        let err = fx
            .service
            .update(owner, rec.id, retitle("too late"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }
}
