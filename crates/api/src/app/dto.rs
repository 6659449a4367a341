//! Request DTOs and explicit response projections.
//!
//! Every response shape is a named struct; handlers never compose ad hoc
//! JSON for domain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pengadaan_auth::{Account, AccountStatus, UserRole};
use pengadaan_core::{ProcurementId, UserId};
use pengadaan_permissions::{PermissionDecision, PermissionType};
use pengadaan_records::{EditLogEntry, ProcurementItem, ProcurementRecord, ProcurementUpdate};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProcurementRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<ProcurementItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProcurementRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Option<Vec<ProcurementItem>>,
    pub note: Option<String>,
}

impl From<UpdateProcurementRequest> for ProcurementUpdate {
    fn from(req: UpdateProcurementRequest) -> Self {
        ProcurementUpdate {
            title: req.title,
            description: req.description,
            items: req.items,
            note: req.note,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetEditableRequest {
    pub is_editable: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub procurement_id: String,
    /// Defaults to `EDIT_FORM` when omitted.
    pub permission_type: Option<PermissionType>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondPermissionRequest {
    pub status: PermissionDecision,
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevokePermissionRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkRespondRequest {
    pub permission_ids: Vec<String>,
    pub status: PermissionDecision,
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Subject id from the identity provider; generated when omitted.
    pub id: Option<String>,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct AccountStatusRequest {
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -------------------------
// Response projections
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ProcurementDto {
    pub id: ProcurementId,
    pub title: String,
    pub description: String,
    pub items: Vec<ProcurementItem>,
    pub total_amount: u64,
    pub created_by: UserId,
    pub is_editable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submitted_by: Option<UserId>,
    pub edit_history: Vec<EditLogEntry>,
}

impl From<ProcurementRecord> for ProcurementDto {
    fn from(record: ProcurementRecord) -> Self {
        let total_amount = record.total_amount();
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            items: record.items,
            total_amount,
            created_by: record.created_by,
            is_editable: record.is_editable,
            created_at: record.created_at,
            updated_at: record.updated_at,
            submitted_at: record.submitted_at,
            submitted_by: record.submitted_by,
            edit_history: record.edit_history,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountDto {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountDto {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            display_name: account.display_name,
            role: account.role,
            status: account.status,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionCheckResponse {
    pub has_permission: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub cleaned_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkRespondResponse {
    pub successful: u32,
    pub failed: u32,
    pub results: Vec<pengadaan_permissions::PermissionResponse>,
    pub errors: Vec<pengadaan_permissions::BulkItemError>,
}

impl BulkRespondResponse {
    pub fn from_outcome(
        outcome: pengadaan_permissions::BulkRespondOutcome,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            successful: outcome.successful,
            failed: outcome.failed,
            results: outcome.results.iter().map(|r| r.to_response(now)).collect(),
            errors: outcome.errors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResponse<T> {
    pub count: usize,
    pub exported_at: DateTime<Utc>,
    pub items: Vec<T>,
}
