//! Procurement record storage.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use pengadaan_core::{DomainError, DomainResult, Page, Pagination, ProcurementId, UserId};
use pengadaan_permissions::{RecordDirectory, RecordSummary};

use crate::procurement::ProcurementRecord;

/// Procurement record store abstraction.
#[async_trait]
pub trait ProcurementStore: Send + Sync {
    async fn insert(&self, record: ProcurementRecord) -> DomainResult<()>;

    async fn get(&self, id: ProcurementId) -> DomainResult<Option<ProcurementRecord>>;

    /// Whole-document replace of an existing record.
    async fn update(&self, record: &ProcurementRecord) -> DomainResult<()>;

    /// Returns whether a record was actually removed.
    async fn delete(&self, id: ProcurementId) -> DomainResult<bool>;

    /// Newest first; `owner` limits the listing to one creator.
    async fn list(
        &self,
        owner: Option<UserId>,
        pagination: Pagination,
    ) -> DomainResult<Page<ProcurementRecord>>;

    /// Case-insensitive text search over title and description.
    async fn search(
        &self,
        query: &str,
        owner: Option<UserId>,
        pagination: Pagination,
    ) -> DomainResult<Page<ProcurementRecord>>;

    /// Full dump for export, optionally limited to one creator.
    async fn export(&self, owner: Option<UserId>) -> DomainResult<Vec<ProcurementRecord>>;
}

/// In-memory record store for dev/test.
#[derive(Debug, Default)]
pub struct InMemoryProcurementStore {
    records: RwLock<HashMap<ProcurementId, ProcurementRecord>>,
}

impl InMemoryProcurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> DomainResult<std::sync::RwLockReadGuard<'_, HashMap<ProcurementId, ProcurementRecord>>>
    {
        self.records
            .read()
            .map_err(|_| DomainError::storage("record store lock poisoned"))
    }

    fn write(
        &self,
    ) -> DomainResult<std::sync::RwLockWriteGuard<'_, HashMap<ProcurementId, ProcurementRecord>>>
    {
        self.records
            .write()
            .map_err(|_| DomainError::storage("record store lock poisoned"))
    }
}

fn page_of(mut matching: Vec<ProcurementRecord>, pagination: Pagination) -> Page<ProcurementRecord> {
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(pagination.offset as usize)
        .take(pagination.limit as usize)
        .collect();
    Page::new(items, total, pagination)
}

#[async_trait]
impl ProcurementStore for InMemoryProcurementStore {
    async fn insert(&self, record: ProcurementRecord) -> DomainResult<()> {
        let mut records = self.write()?;
        if records.contains_key(&record.id) {
            return Err(DomainError::conflict("record already exists"));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: ProcurementId) -> DomainResult<Option<ProcurementRecord>> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn update(&self, record: &ProcurementRecord) -> DomainResult<()> {
        let mut records = self.write()?;
        if !records.contains_key(&record.id) {
            return Err(DomainError::not_found("procurement record not found"));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: ProcurementId) -> DomainResult<bool> {
        Ok(self.write()?.remove(&id).is_some())
    }

    async fn list(
        &self,
        owner: Option<UserId>,
        pagination: Pagination,
    ) -> DomainResult<Page<ProcurementRecord>> {
        let matching: Vec<_> = self
            .read()?
            .values()
            .filter(|r| owner.is_none_or(|o| r.created_by == o))
            .cloned()
            .collect();
        Ok(page_of(matching, pagination))
    }

    async fn search(
        &self,
        query: &str,
        owner: Option<UserId>,
        pagination: Pagination,
    ) -> DomainResult<Page<ProcurementRecord>> {
        let needle = query.trim().to_lowercase();
        let matching: Vec<_> = self
            .read()?
            .values()
            .filter(|r| owner.is_none_or(|o| r.created_by == o))
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(page_of(matching, pagination))
    }

    async fn export(&self, owner: Option<UserId>) -> DomainResult<Vec<ProcurementRecord>> {
        let mut all: Vec<_> = self
            .read()?
            .values()
            .filter(|r| owner.is_none_or(|o| r.created_by == o))
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

#[async_trait]
impl RecordDirectory for InMemoryProcurementStore {
    async fn record_summary(&self, id: ProcurementId) -> DomainResult<Option<RecordSummary>> {
        Ok(self.read()?.get(&id).map(|r| r.summary()))
    }
}
