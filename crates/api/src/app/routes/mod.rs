use axum::{Router, routing::get};

pub mod admin;
pub mod common;
pub mod permissions;
pub mod procurements;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/procurements", procurements::router())
        .nest("/permissions", permissions::router())
        .nest("/admin", admin::router())
}
