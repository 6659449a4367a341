//! Permission request ledger entries and their lifecycle transitions.
//!
//! Transitions are pure: each consumes the current state and returns the next
//! one (or a domain error), leaving persistence to the store invoked by the
//! workflow service. That keeps the state machine testable without a live
//! backing store.
//!
//! # Invariants
//! - `id`, `user_id`, `procurement_id`, `permission_type`, `reason` and
//!   `requested_at` are immutable after creation.
//! - `status` moves one-directionally: `Pending -> {Approved, Rejected}`,
//!   `Approved -> Expired`. Transitions refuse any other prior state.
//! - `responded_at` is set exactly once, when status leaves `Pending`.
//! - `expires_at` is only ever set on approval (now + 24h) or moved to "now"
//!   by a revocation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use pengadaan_core::{DomainError, DomainResult, PermissionRequestId, ProcurementId, UserId};

/// How long an approved grant stays active.
pub const GRANT_TTL_HOURS: i64 = 24;

/// Longest accepted justification text.
pub const MAX_REASON_LEN: usize = 500;

/// What the requester wants to do with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    EditForm,
    DeleteForm,
}

impl core::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PermissionType::EditForm => f.write_str("EDIT_FORM"),
            PermissionType::DeleteForm => f.write_str("DELETE_FORM"),
        }
    }
}

/// Lifecycle state of one permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl PermissionStatus {
    /// Terminal states never transition again (an `Approved` grant still can).
    pub fn is_terminal(&self) -> bool {
        matches!(self, PermissionStatus::Rejected | PermissionStatus::Expired)
    }
}

impl core::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PermissionStatus::Pending => f.write_str("PENDING"),
            PermissionStatus::Approved => f.write_str("APPROVED"),
            PermissionStatus::Rejected => f.write_str("REJECTED"),
            PermissionStatus::Expired => f.write_str("EXPIRED"),
        }
    }
}

/// One entry in the permission ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: PermissionRequestId,
    pub user_id: UserId,
    pub admin_id: Option<UserId>,
    pub procurement_id: ProcurementId,
    pub permission_type: PermissionType,
    pub status: PermissionStatus,
    pub reason: String,
    pub admin_response: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PermissionRequest {
    /// Create a fresh `Pending` entry.
    pub fn new(
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let reason = reason.into().trim().to_string();
        if reason.is_empty() {
            return Err(DomainError::validation("reason cannot be empty"));
        }
        if reason.len() > MAX_REASON_LEN {
            return Err(DomainError::validation(format!(
                "reason is longer than {MAX_REASON_LEN} characters"
            )));
        }

        Ok(Self {
            id: PermissionRequestId::new(),
            user_id,
            admin_id: None,
            procurement_id,
            permission_type,
            status: PermissionStatus::Pending,
            reason,
            admin_response: None,
            requested_at: now,
            responded_at: None,
            expires_at: None,
        })
    }

    /// True iff an expiry is set and lies in the past. Pure; no side effect.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// An "active grant": approved and not yet expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == PermissionStatus::Approved && !self.is_expired(now)
    }

    /// `Pending -> Approved`. Sets the responder, an optional note, and the
    /// 24-hour expiry window.
    pub fn approve(
        mut self,
        admin_id: UserId,
        response: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        self.ensure_pending()?;

        self.status = PermissionStatus::Approved;
        self.admin_id = Some(admin_id);
        self.admin_response = response.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.responded_at = Some(now);
        self.expires_at = Some(now + Duration::hours(GRANT_TTL_HOURS));
        Ok(self)
    }

    /// `Pending -> Rejected`. The response note is mandatory; `expires_at`
    /// stays unset.
    pub fn reject(
        mut self,
        admin_id: UserId,
        response: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        self.ensure_pending()?;

        let response = response.into().trim().to_string();
        if response.is_empty() {
            return Err(DomainError::validation(
                "Response is required when rejecting a request",
            ));
        }

        self.status = PermissionStatus::Rejected;
        self.admin_id = Some(admin_id);
        self.admin_response = Some(response);
        self.responded_at = Some(now);
        Ok(self)
    }

    /// Force an active grant to expire immediately, recording the reason as a
    /// revocation note on `admin_response`.
    pub fn revoke(
        mut self,
        admin_id: UserId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !self.is_active(now) {
            return Err(DomainError::conflict("Permission is not active"));
        }

        let note = format!("Revoked: {}", reason.into().trim());
        self.admin_response = Some(match self.admin_response.take() {
            Some(existing) => format!("{existing} | {note}"),
            None => note,
        });
        self.admin_id = Some(admin_id);
        self.status = PermissionStatus::Expired;
        self.expires_at = Some(now);
        Ok(self)
    }

    /// `Approved -> Expired` once the expiry window has elapsed. Used by the
    /// sweep; refuses grants that are still live.
    pub fn expire(mut self, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.status != PermissionStatus::Approved {
            return Err(DomainError::conflict("permission is not an approved grant"));
        }
        if !self.is_expired(now) {
            return Err(DomainError::conflict("grant has not expired yet"));
        }

        self.status = PermissionStatus::Expired;
        Ok(self)
    }

    /// Project into the boundary DTO. Every API response goes through this;
    /// nothing beyond these fields is ever exposed.
    pub fn to_response(&self, now: DateTime<Utc>) -> PermissionResponse {
        PermissionResponse {
            id: self.id,
            user_id: self.user_id,
            admin_id: self.admin_id,
            procurement_id: self.procurement_id,
            permission_type: self.permission_type,
            status: self.status,
            reason: self.reason.clone(),
            admin_response: self.admin_response.clone(),
            requested_at: self.requested_at,
            responded_at: self.responded_at,
            expires_at: self.expires_at,
            is_expired: self.is_expired(now),
        }
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if self.status != PermissionStatus::Pending {
            return Err(DomainError::conflict("Request has already been processed"));
        }
        Ok(())
    }
}

/// Boundary projection of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub id: PermissionRequestId,
    pub user_id: UserId,
    pub admin_id: Option<UserId>,
    pub procurement_id: ProcurementId,
    pub permission_type: PermissionType,
    pub status: PermissionStatus,
    pub reason: String,
    pub admin_response: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
}

/// Requester shown alongside a pending request in admin listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterSummary {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}

/// Target record shown alongside a pending request in admin listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: ProcurementId,
    pub title: String,
    pub created_by: UserId,
}

/// A ledger entry enriched with requester/record context for admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionWithContext {
    #[serde(flatten)]
    pub permission: PermissionResponse,
    pub requester: Option<RequesterSummary>,
    pub record: Option<RecordSummary>,
}
