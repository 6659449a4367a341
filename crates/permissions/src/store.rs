//! Permission ledger storage.
//!
//! The store is the only shared mutable resource in the workflow (all writes
//! funnel through the workflow service). Two guards close the races a plain
//! find-then-write sequence would leave open:
//!
//! - `insert_pending` enforces the one-pending-per-tuple invariant atomically;
//! - `update_if_status` is a conditional write ("set X where status = Y");
//!   `false` means zero rows were affected and the caller must treat the
//!   operation as a conflict instead of trusting its earlier read.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pengadaan_core::{
    DomainError, DomainResult, Page, Pagination, PermissionRequestId, ProcurementId, UserId,
};

use crate::request::{PermissionRequest, PermissionStatus, PermissionType};

/// Permission ledger store abstraction.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Insert a new `Pending` entry. A pending entry for the same
    /// `(user, record, type)` tuple already existing is a conflict.
    async fn insert_pending(&self, request: PermissionRequest) -> DomainResult<()>;

    /// Fetch one entry by id.
    async fn get(&self, id: PermissionRequestId) -> DomainResult<Option<PermissionRequest>>;

    /// Persist `updated` only if the stored entry still has `expected` status.
    /// Returns whether the write applied; `false` is the conflict signal.
    async fn update_if_status(
        &self,
        updated: &PermissionRequest,
        expected: PermissionStatus,
    ) -> DomainResult<bool>;

    /// Find the pending entry for a tuple, if any.
    async fn find_pending(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
    ) -> DomainResult<Option<PermissionRequest>>;

    /// Find the active (approved, unexpired as of `now`) grant for a tuple.
    async fn find_active_grant(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<PermissionRequest>>;

    /// All entries ever filed by one user, newest first.
    async fn list_by_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionRequest>>;

    /// All entries in a given status, newest first.
    async fn list_by_status(
        &self,
        status: PermissionStatus,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionRequest>>;

    /// Flip every `Approved` entry whose expiry has elapsed to `Expired`.
    /// Returns the number of entries changed; running it again immediately
    /// must return 0.
    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<u64>;
}

/// In-memory ledger store for dev/test.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    entries: RwLock<HashMap<PermissionRequestId, PermissionRequest>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> DomainResult<std::sync::RwLockReadGuard<'_, HashMap<PermissionRequestId, PermissionRequest>>>
    {
        self.entries
            .read()
            .map_err(|_| DomainError::storage("permission store lock poisoned"))
    }

    fn write(
        &self,
    ) -> DomainResult<std::sync::RwLockWriteGuard<'_, HashMap<PermissionRequestId, PermissionRequest>>>
    {
        self.entries
            .write()
            .map_err(|_| DomainError::storage("permission store lock poisoned"))
    }
}

fn page_of(
    mut matching: Vec<PermissionRequest>,
    pagination: Pagination,
) -> Page<PermissionRequest> {
    matching.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(pagination.offset as usize)
        .take(pagination.limit as usize)
        .collect();
    Page::new(items, total, pagination)
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn insert_pending(&self, request: PermissionRequest) -> DomainResult<()> {
        if request.status != PermissionStatus::Pending {
            return Err(DomainError::validation(
                "only pending entries may be inserted",
            ));
        }

        // Check-and-insert under the write lock: the uniqueness guard and the
        // insert are one atomic step.
        let mut entries = self.write()?;
        let duplicate = entries.values().any(|e| {
            e.status == PermissionStatus::Pending
                && e.user_id == request.user_id
                && e.procurement_id == request.procurement_id
                && e.permission_type == request.permission_type
        });
        if duplicate {
            return Err(DomainError::conflict("duplicate pending request"));
        }

        entries.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: PermissionRequestId) -> DomainResult<Option<PermissionRequest>> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn update_if_status(
        &self,
        updated: &PermissionRequest,
        expected: PermissionStatus,
    ) -> DomainResult<bool> {
        let mut entries = self.write()?;
        match entries.get_mut(&updated.id) {
            Some(current) if current.status == expected => {
                *current = updated.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::not_found("permission request not found")),
        }
    }

    async fn find_pending(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
    ) -> DomainResult<Option<PermissionRequest>> {
        Ok(self
            .read()?
            .values()
            .find(|e| {
                e.status == PermissionStatus::Pending
                    && e.user_id == user_id
                    && e.procurement_id == procurement_id
                    && e.permission_type == permission_type
            })
            .cloned())
    }

    async fn find_active_grant(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<PermissionRequest>> {
        Ok(self
            .read()?
            .values()
            .find(|e| {
                e.user_id == user_id
                    && e.procurement_id == procurement_id
                    && e.permission_type == permission_type
                    && e.is_active(now)
            })
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionRequest>> {
        let matching: Vec<_> = self
            .read()?
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        Ok(page_of(matching, pagination))
    }

    async fn list_by_status(
        &self,
        status: PermissionStatus,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionRequest>> {
        let matching: Vec<_> = self
            .read()?
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        Ok(page_of(matching, pagination))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let mut entries = self.write()?;
        let mut swept = 0u64;

        for entry in entries.values_mut() {
            if entry.status == PermissionStatus::Approved && entry.is_expired(now) {
                match entry.clone().expire(now) {
                    Ok(expired) => {
                        *entry = expired;
                        swept += 1;
                    }
                    // Individual failures are skipped, not fatal to the sweep.
                    Err(err) => {
                        tracing::warn!(id = %entry.id, error = %err, "sweep skipped entry");
                    }
                }
            }
        }

        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::request::GRANT_TTL_HOURS;

    fn pending(user: UserId, record: ProcurementId) -> PermissionRequest {
        PermissionRequest::new(user, record, PermissionType::EditForm, "reason", Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemoryPermissionStore::new();
        let req = pending(UserId::new(), ProcurementId::new());

        store.insert_pending(req.clone()).await.unwrap();
        assert_eq!(store.get(req.id).await.unwrap(), Some(req));
    }

    #[tokio::test]
    async fn duplicate_pending_tuple_is_rejected() {
        let store = InMemoryPermissionStore::new();
        let user = UserId::new();
        let record = ProcurementId::new();

        store.insert_pending(pending(user, record)).await.unwrap();
        let err = store
            .insert_pending(pending(user, record))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // A different permission type for the same record is fine.
        let delete_req = PermissionRequest::new(
            user,
            record,
            PermissionType::DeleteForm,
            "obsolete",
            Utc::now(),
        )
        .unwrap();
        store.insert_pending(delete_req).await.unwrap();
    }

    #[tokio::test]
    async fn conditional_update_applies_once() {
        let store = InMemoryPermissionStore::new();
        let admin = UserId::new();
        let req = pending(UserId::new(), ProcurementId::new());
        store.insert_pending(req.clone()).await.unwrap();

        let now = Utc::now();
        let approved = req.clone().approve(admin, None, now).unwrap();
        let rejected = req.reject(admin, "slow admin", now).unwrap();

        // Two racing responses: only the first conditional write lands.
        assert!(store
            .update_if_status(&approved, PermissionStatus::Pending)
            .await
            .unwrap());
        assert!(!store
            .update_if_status(&rejected, PermissionStatus::Pending)
            .await
            .unwrap());

        let stored = store.get(approved.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PermissionStatus::Approved);
    }

    #[tokio::test]
    async fn active_grant_lookup_respects_expiry() {
        let store = InMemoryPermissionStore::new();
        let user = UserId::new();
        let record = ProcurementId::new();
        let now = Utc::now();

        let req = pending(user, record);
        store.insert_pending(req.clone()).await.unwrap();
        let approved = req.approve(UserId::new(), None, now).unwrap();
        store
            .update_if_status(&approved, PermissionStatus::Pending)
            .await
            .unwrap();

        let found = store
            .find_active_grant(user, record, PermissionType::EditForm, now)
            .await
            .unwrap();
        assert_eq!(found.map(|g| g.id), Some(approved.id));

        let later = now + Duration::hours(GRANT_TTL_HOURS) + Duration::seconds(1);
        let found = store
            .find_active_grant(user, record, PermissionType::EditForm, later)
            .await
            .unwrap();
        assert!(found.is_none());

        // Scoped to the requested permission type.
        let found = store
            .find_active_grant(user, record, PermissionType::DeleteForm, now)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let store = InMemoryPermissionStore::new();
        let now = Utc::now();

        for _ in 0..3 {
            let req = pending(UserId::new(), ProcurementId::new());
            let id = req.id;
            store.insert_pending(req).await.unwrap();
            let approved = store
                .get(id)
                .await
                .unwrap()
                .unwrap()
                .approve(UserId::new(), None, now - Duration::hours(GRANT_TTL_HOURS + 1))
                .unwrap();
            store
                .update_if_status(&approved, PermissionStatus::Pending)
                .await
                .unwrap();
        }

        assert_eq!(store.expire_due(now).await.unwrap(), 3);
        assert_eq!(store.expire_due(now).await.unwrap(), 0);
    }
}
