use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use pengadaan_core::{Pagination, ProcurementId};
use pengadaan_permissions::PermissionType;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_permission_request))
        .route("/mine", get(list_own_requests))
        .route("/check/:procurement_id", get(check_edit_permission))
}

pub async fn create_permission_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreatePermissionRequest>,
) -> axum::response::Response {
    let procurement_id: ProcurementId = match body.procurement_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    let permission_type = body.permission_type.unwrap_or(PermissionType::EditForm);

    match services
        .workflow
        .request_permission(actor.user_id(), procurement_id, permission_type, body.reason)
        .await
    {
        Ok(request) => (
            StatusCode::CREATED,
            Json(request.to_response(Utc::now())),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_own_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let pagination = Pagination::from_page(query.page, query.limit);
    match services.workflow.list_own(actor.user_id(), pagination).await {
        Ok(page) => {
            let now = Utc::now();
            (StatusCode::OK, Json(page.map(|r| r.to_response(now)))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn check_edit_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(procurement_id): Path<String>,
) -> axum::response::Response {
    let procurement_id: ProcurementId = match procurement_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    let is_admin = actor.is_admin();
    let has_permission = if is_admin {
        true
    } else {
        match services
            .workflow
            .has_edit_permission(actor.user_id(), procurement_id)
            .await
        {
            Ok(v) => v,
            Err(e) => return errors::domain_error_to_response(e),
        }
    };

    (
        StatusCode::OK,
        Json(dto::PermissionCheckResponse {
            has_permission,
            is_admin,
        }),
    )
        .into_response()
}
