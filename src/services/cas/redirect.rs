//! Redirect strategies used to send the browser to the CAS login page.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::cas::request::RequestInfo;

pub trait AuthenticationRedirectStrategy: Send + Sync {
    fn redirect(&self, request: &RequestInfo, target_url: &str) -> Response;
}

/// Plain `302 Found`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRedirectStrategy;

impl AuthenticationRedirectStrategy for DefaultRedirectStrategy {
    fn redirect(&self, _request: &RequestInfo, target_url: &str) -> Response {
        found(target_url)
    }
}

/// Script-initiated requests cannot follow a cross-origin redirect to the
/// login page; they get `401` plus the target so the page can navigate.
#[derive(Debug, Default, Clone, Copy)]
pub struct XhrAwareRedirectStrategy;

impl AuthenticationRedirectStrategy for XhrAwareRedirectStrategy {
    fn redirect(&self, request: &RequestInfo, target_url: &str) -> Response {
        if request.is_xhr() {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "redirect": target_url })),
            )
                .into_response();
        }
        found(target_url)
    }
}

/// `302` to `target_url`. A target that is not a valid header value is logged
/// and answered with an empty `500`; the pipeline itself does not fail.
pub fn found(target_url: &str) -> Response {
    match HeaderValue::from_str(target_url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(err) => {
            tracing::warn!(error = ?err, location = %target_url, "unable to issue redirect");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
