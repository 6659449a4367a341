//! Procurement record entity.
//!
//! # Invariants
//! - `id`, `created_by` and `created_at` are immutable after creation.
//! - `edit_history` is append-only; entries are never rewritten or removed.
//! - `submitted_at`/`submitted_by` are set exactly once; submission cannot be
//!   undone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pengadaan_core::{DomainError, DomainResult, ProcurementId, UserId};
use pengadaan_permissions::{RecordFacts, RecordSummary};

/// One line item on a procurement form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementItem {
    pub name: String,
    pub quantity: i64,
    /// Unit price in the smallest currency unit.
    pub unit_price: u64,
}

/// One append-only entry in a record's edit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLogEntry {
    pub edited_by: UserId,
    pub edited_at: DateTime<Utc>,
    pub note: String,
}

/// Partial update applied to a record; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcurementUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Option<Vec<ProcurementItem>>,
    /// Free-text note recorded in the edit history.
    pub note: Option<String>,
}

impl ProcurementUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.items.is_none()
    }
}

/// A procurement ("Pengadaan") form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementRecord {
    pub id: ProcurementId,
    pub title: String,
    pub description: String,
    pub items: Vec<ProcurementItem>,
    pub created_by: UserId,
    pub is_editable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submitted_by: Option<UserId>,
    pub edit_history: Vec<EditLogEntry>,
}

impl ProcurementRecord {
    pub fn new(
        created_by: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        items: Vec<ProcurementItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        validate_items(&items)?;

        Ok(Self {
            id: ProcurementId::new(),
            title,
            description: description.into().trim().to_string(),
            items,
            created_by,
            is_editable: true,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            submitted_by: None,
            edit_history: Vec::new(),
        })
    }

    /// Apply a partial update, appending to the edit history.
    pub fn updated(
        mut self,
        changes: ProcurementUpdate,
        editor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if changes.is_empty() {
            return Err(DomainError::validation("update contains no changes"));
        }

        if let Some(title) = changes.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(DomainError::validation("title cannot be empty"));
            }
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description.trim().to_string();
        }
        if let Some(items) = changes.items {
            validate_items(&items)?;
            self.items = items;
        }

        self.updated_at = now;
        self.edit_history.push(EditLogEntry {
            edited_by: editor,
            edited_at: now,
            note: changes.note.unwrap_or_else(|| "record updated".to_string()),
        });
        Ok(self)
    }

    /// Stamp the record as submitted. One-shot.
    pub fn submitted(mut self, by: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.submitted_at.is_some() {
            return Err(DomainError::conflict("record has already been submitted"));
        }

        self.submitted_at = Some(now);
        self.submitted_by = Some(by);
        self.updated_at = now;
        self.edit_history.push(EditLogEntry {
            edited_by: by,
            edited_at: now,
            note: "record submitted".to_string(),
        });
        Ok(self)
    }

    /// Flip the editability flag (admin action).
    pub fn with_editable(mut self, is_editable: bool, by: UserId, now: DateTime<Utc>) -> Self {
        self.is_editable = is_editable;
        self.updated_at = now;
        self.edit_history.push(EditLogEntry {
            edited_by: by,
            edited_at: now,
            note: if is_editable {
                "record unlocked".to_string()
            } else {
                "record locked".to_string()
            },
        });
        self
    }

    /// The slice of state the authorization gate reasons about.
    pub fn facts(&self) -> RecordFacts {
        RecordFacts {
            id: self.id,
            created_by: self.created_by,
            is_editable: self.is_editable,
            submitted_at: self.submitted_at,
        }
    }

    /// Summary shown alongside permission requests in admin listings.
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            title: self.title.clone(),
            created_by: self.created_by,
        }
    }

    /// Total value of all line items.
    pub fn total_amount(&self) -> u64 {
        self.items
            .iter()
            .map(|i| i.unit_price.saturating_mul(i.quantity.max(0) as u64))
            .sum()
    }
}

fn validate_items(items: &[ProcurementItem]) -> DomainResult<()> {
    for item in items {
        if item.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if item.quantity <= 0 {
            return Err(DomainError::validation("item quantity must be positive"));
        }
    }
    Ok(())
}
