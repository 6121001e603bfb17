use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::cas::Assertion;

/// The validated `Assertion` of the current request.
///
/// Requires the CAS middleware in front of the handler. Without an assertion
/// (unprotected route, gateway pass-through, failed validation) it rejects
/// with 401.
pub struct CasUser(pub Assertion);

impl<S> FromRequestParts<S> for CasUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Assertion>()
            .cloned()
            .map(CasUser)
            .ok_or(AppError::Unauthorized)
    }
}
