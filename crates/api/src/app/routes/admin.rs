//! Admin endpoints: permission review and account provisioning.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use pengadaan_auth::Account;
use pengadaan_core::{Pagination, PermissionRequestId, UserId};

use crate::app::routes::common::require_admin;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/permissions/pending", get(list_pending_requests))
        .route("/permissions/bulk-respond", post(bulk_respond))
        .route("/permissions/cleanup", post(cleanup_expired))
        .route("/permissions/:id/respond", post(respond_to_request))
        .route("/permissions/:id/revoke", post(revoke_permission))
        .route("/accounts", post(create_account))
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/status", post(set_account_status))
}

pub async fn list_pending_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let pagination = Pagination::from_page(query.page, query.limit);
    match services.workflow.list_pending(pagination).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn respond_to_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RespondPermissionRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let id: PermissionRequestId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid permission request id",
            );
        }
    };

    match services
        .workflow
        .respond_to_request(id, actor.user_id(), body.status, body.response)
        .await
    {
        Ok(updated) => (StatusCode::OK, Json(updated.to_response(Utc::now()))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RevokePermissionRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let id: PermissionRequestId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid permission request id",
            );
        }
    };

    match services
        .workflow
        .revoke_permission(id, actor.user_id(), body.reason)
        .await
    {
        Ok(updated) => (StatusCode::OK, Json(updated.to_response(Utc::now()))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn bulk_respond(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::BulkRespondRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let mut ids = Vec::with_capacity(body.permission_ids.len());
    for raw in &body.permission_ids {
        match raw.parse::<PermissionRequestId>() {
            Ok(id) => ids.push(id),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    format!("invalid permission request id: {raw}"),
                );
            }
        }
    }

    match services
        .workflow
        .bulk_respond(&ids, actor.user_id(), body.status, body.response)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(dto::BulkRespondResponse::from_outcome(outcome, Utc::now())),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn cleanup_expired(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    match services.workflow.cleanup_expired().await {
        Ok(cleaned_count) => (
            StatusCode::OK,
            Json(dto::CleanupResponse { cleaned_count }),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateAccountRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let id = match body.id {
        Some(raw) => match raw.parse::<UserId>() {
            Ok(id) => id,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid account id",
                );
            }
        },
        None => UserId::new(),
    };

    let account = match Account::new(id, body.email, body.display_name, body.role, Utc::now()) {
        Ok(a) => a,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.accounts.insert(account.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(dto::AccountDto::from(account))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id");
        }
    };

    match services.accounts.get(id).await {
        Ok(Some(account)) => (StatusCode::OK, Json(dto::AccountDto::from(account))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn set_account_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AccountStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id");
        }
    };

    match services.accounts.update_status(id, body.status).await {
        Ok(account) => (StatusCode::OK, Json(dto::AccountDto::from(account))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
