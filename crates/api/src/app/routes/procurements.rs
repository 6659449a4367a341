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
use pengadaan_records::NewProcurement;

use crate::app::routes::common::require_admin;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_procurement).get(list_procurements))
        .route("/search", get(search_procurements))
        .route("/export", get(export_procurements))
        .route(
            "/:id",
            get(get_procurement)
                .put(update_procurement)
                .delete(delete_procurement),
        )
        .route("/:id/submit", post(submit_procurement))
        .route("/:id/editable", post(set_editable))
}

pub async fn create_procurement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateProcurementRequest>,
) -> axum::response::Response {
    let input = NewProcurement {
        title: body.title,
        description: body.description,
        items: body.items,
    };

    match services.procurements.create(actor.actor(), input).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(dto::ProcurementDto::from(record)),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_procurements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let pagination = Pagination::from_page(query.page, query.limit);
    match services.procurements.list(actor.actor(), pagination).await {
        Ok(page) => (StatusCode::OK, Json(page.map(dto::ProcurementDto::from))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn search_procurements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::SearchQuery>,
) -> axum::response::Response {
    let pagination = Pagination::from_page(query.page, query.limit);
    match services
        .procurements
        .search(actor.actor(), &query.q, pagination)
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page.map(dto::ProcurementDto::from))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn export_procurements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    match services.procurements.export(actor.actor()).await {
        Ok(records) => {
            let items: Vec<dto::ProcurementDto> =
                records.into_iter().map(dto::ProcurementDto::from).collect();
            (
                StatusCode::OK,
                Json(dto::ExportResponse {
                    count: items.len(),
                    exported_at: Utc::now(),
                    items,
                }),
            )
                .into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_procurement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProcurementId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    match services.procurements.get(id).await {
        Ok(record) => (StatusCode::OK, Json(dto::ProcurementDto::from(record))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_procurement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProcurementRequest>,
) -> axum::response::Response {
    let id: ProcurementId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    match services
        .procurements
        .update(actor.actor(), id, body.into())
        .await
    {
        Ok(record) => (StatusCode::OK, Json(dto::ProcurementDto::from(record))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_procurement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProcurementId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    match services.procurements.delete(actor.actor(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn submit_procurement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProcurementId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    match services.procurements.submit(actor.actor(), id).await {
        Ok(record) => (StatusCode::OK, Json(dto::ProcurementDto::from(record))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn set_editable(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetEditableRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&actor) {
        return resp;
    }

    let id: ProcurementId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id");
        }
    };

    match services
        .procurements
        .set_editable(actor.actor(), id, body.is_editable)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(dto::ProcurementDto::from(record))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
