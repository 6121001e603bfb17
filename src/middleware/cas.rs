//! CAS authentication middleware.
//!
//! Hands every request under the protected router to the
//! `AuthenticationEngine`. The engine either answers (login redirect,
//! post-validation redirect, proxy receptor) or continues the chain with the
//! validated `Assertion` in the request extensions, where `CasUser` picks it up.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// Put CAS authentication in front of every route of `router`.
///
/// ```ignore
/// let v1 = api::v1::routes(state.clone());
/// let v1 = middleware::cas::apply(v1, state.clone());
/// app = app.nest("/api/v1", v1);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // from_fn cannot take a State extractor in axum 0.8; pass it explicitly
    router.layer(middleware::from_fn_with_state(state, cas_middleware))
}

async fn cas_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    match state.cas.handle(req, |req| next.run(req)).await {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::error!(error = ?err, "CAS ticket validation aborted the request");
            Err(err.into())
        }
    }
}
