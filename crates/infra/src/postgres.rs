//! PostgreSQL-backed permission ledger store.
//!
//! The two invariant guards live in the database itself:
//!
//! - a partial unique index on `(user_id, procurement_id, permission_type)
//!   WHERE status = 'PENDING'` makes the duplicate-pending check atomic;
//! - every terminal mutation is a conditional `UPDATE ... WHERE status = $n`,
//!   and zero rows affected is reported back as the conflict signal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use pengadaan_core::{
    DomainError, DomainResult, Page, Pagination, PermissionRequestId, ProcurementId, UserId,
};
use pengadaan_permissions::{
    PermissionRequest, PermissionStatus, PermissionStore, PermissionType,
};

/// Create the ledger table and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> DomainResult<()> {
    sqlx::raw_sql(include_str!("schema.sql"))
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub struct PostgresPermissionStore {
    pool: PgPool,
}

impl PostgresPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, admin_id, procurement_id, permission_type, status, \
                              reason, admin_response, requested_at, responded_at, expires_at";

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    async fn insert_pending(&self, request: PermissionRequest) -> DomainResult<()> {
        if request.status != PermissionStatus::Pending {
            return Err(DomainError::validation(
                "only pending entries may be inserted",
            ));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO permission_requests
                (id, user_id, admin_id, procurement_id, permission_type, status,
                 reason, admin_response, requested_at, responded_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*request.id.as_uuid())
        .bind(*request.user_id.as_uuid())
        .bind(request.admin_id.map(|id| *id.as_uuid()))
        .bind(*request.procurement_id.as_uuid())
        .bind(request.permission_type.to_string())
        .bind(request.status.to_string())
        .bind(&request.reason)
        .bind(&request.admin_response)
        .bind(request.requested_at)
        .bind(request.responded_at)
        .bind(request.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(DomainError::conflict("duplicate pending request"))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get(&self, id: PermissionRequestId) -> DomainResult<Option<PermissionRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM permission_requests WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| row_to_request(&r)).transpose()
    }

    async fn update_if_status(
        &self,
        updated: &PermissionRequest,
        expected: PermissionStatus,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE permission_requests
               SET admin_id = $1,
                   status = $2,
                   admin_response = $3,
                   responded_at = $4,
                   expires_at = $5
             WHERE id = $6 AND status = $7
            "#,
        )
        .bind(updated.admin_id.map(|id| *id.as_uuid()))
        .bind(updated.status.to_string())
        .bind(&updated.admin_response)
        .bind(updated.responded_at)
        .bind(updated.expires_at)
        .bind(*updated.id.as_uuid())
        .bind(expected.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Zero rows: distinguish "status moved on" from "no such entry".
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM permission_requests WHERE id = $1)",
        )
        .bind(*updated.id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        if exists {
            Ok(false)
        } else {
            Err(DomainError::not_found("permission request not found"))
        }
    }

    async fn find_pending(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
    ) -> DomainResult<Option<PermissionRequest>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM permission_requests
             WHERE user_id = $1 AND procurement_id = $2
               AND permission_type = $3 AND status = 'PENDING'
            "#
        ))
        .bind(*user_id.as_uuid())
        .bind(*procurement_id.as_uuid())
        .bind(permission_type.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| row_to_request(&r)).transpose()
    }

    async fn find_active_grant(
        &self,
        user_id: UserId,
        procurement_id: ProcurementId,
        permission_type: PermissionType,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<PermissionRequest>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM permission_requests
             WHERE user_id = $1 AND procurement_id = $2
               AND permission_type = $3 AND status = 'APPROVED'
               AND expires_at >= $4
             LIMIT 1
            "#
        ))
        .bind(*user_id.as_uuid())
        .bind(*procurement_id.as_uuid())
        .bind(permission_type.to_string())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| row_to_request(&r)).transpose()
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionRequest>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM permission_requests WHERE user_id = $1")
                .bind(*user_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM permission_requests
             WHERE user_id = $1
             ORDER BY requested_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(*user_id.as_uuid())
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let items = rows
            .iter()
            .map(row_to_request)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    async fn list_by_status(
        &self,
        status: PermissionStatus,
        pagination: Pagination,
    ) -> DomainResult<Page<PermissionRequest>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM permission_requests WHERE status = $1")
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM permission_requests
             WHERE status = $1
             ORDER BY requested_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status.to_string())
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let items = rows
            .iter()
            .map(row_to_request)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE permission_requests
               SET status = 'EXPIRED'
             WHERE status = 'APPROVED' AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }
}

fn db_err(e: sqlx::Error) -> DomainError {
    DomainError::storage(e.to_string())
}

fn row_to_request(row: &PgRow) -> DomainResult<PermissionRequest> {
    let permission_type = parse_type(&row.try_get::<String, _>("permission_type").map_err(col_err)?)?;
    let status = parse_status(&row.try_get::<String, _>("status").map_err(col_err)?)?;

    Ok(PermissionRequest {
        id: PermissionRequestId::from_uuid(row.try_get::<Uuid, _>("id").map_err(col_err)?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(col_err)?),
        admin_id: row
            .try_get::<Option<Uuid>, _>("admin_id")
            .map_err(col_err)?
            .map(UserId::from_uuid),
        procurement_id: ProcurementId::from_uuid(
            row.try_get::<Uuid, _>("procurement_id").map_err(col_err)?,
        ),
        permission_type,
        status,
        reason: row.try_get("reason").map_err(col_err)?,
        admin_response: row.try_get("admin_response").map_err(col_err)?,
        requested_at: row.try_get("requested_at").map_err(col_err)?,
        responded_at: row.try_get("responded_at").map_err(col_err)?,
        expires_at: row.try_get("expires_at").map_err(col_err)?,
    })
}

fn col_err(e: sqlx::Error) -> DomainError {
    DomainError::storage(format!("column decode failed: {e}"))
}

fn parse_status(s: &str) -> DomainResult<PermissionStatus> {
    match s {
        "PENDING" => Ok(PermissionStatus::Pending),
        "APPROVED" => Ok(PermissionStatus::Approved),
        "REJECTED" => Ok(PermissionStatus::Rejected),
        "EXPIRED" => Ok(PermissionStatus::Expired),
        other => Err(DomainError::storage(format!(
            "unknown permission status '{other}' in ledger"
        ))),
    }
}

fn parse_type(s: &str) -> DomainResult<PermissionType> {
    match s {
        "EDIT_FORM" => Ok(PermissionType::EditForm),
        "DELETE_FORM" => Ok(PermissionType::DeleteForm),
        other => Err(DomainError::storage(format!(
            "unknown permission type '{other}' in ledger"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_round_trips() {
        for status in [
            PermissionStatus::Pending,
            PermissionStatus::Approved,
            PermissionStatus::Rejected,
            PermissionStatus::Expired,
        ] {
            assert_eq!(parse_status(&status.to_string()).unwrap(), status);
        }
        assert!(parse_status("pending").is_err());
    }

    #[test]
    fn type_text_round_trips() {
        for kind in [PermissionType::EditForm, PermissionType::DeleteForm] {
            assert_eq!(parse_type(&kind.to_string()).unwrap(), kind);
        }
        assert!(parse_type("EDIT").is_err());
    }
}
