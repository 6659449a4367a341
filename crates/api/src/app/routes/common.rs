use axum::http::StatusCode;

use crate::app::errors;
use crate::context::ActorContext;

/// Guard for admin-only handlers. The workflow re-checks the admin's account
/// record; this rejects obviously unauthorized calls before any lookup.
pub fn require_admin(actor: &ActorContext) -> Result<(), axum::response::Response> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "admin role required",
        ))
    }
}
