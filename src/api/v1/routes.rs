/*
 * Responsibility
 * - URL layout of /api/v1
 * - Everything here sits behind CAS, including unknown paths (fallback is
 *   registered before the layer so it is covered too)
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{fallback::not_found, me::me};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/me", get(me))
        .fallback(not_found);

    let router = middleware::cas::apply(router, state);
    middleware::security_headers::apply(router)
}
