/*
 * Responsibility
 * - GET /api/v1/me: the authenticated principal and its attributes
 */
use axum::Json;

use crate::api::v1::dto::me::MeResponse;
use crate::api::v1::extractors::CasUser;

pub async fn me(CasUser(assertion): CasUser) -> Json<MeResponse> {
    tracing::debug!(user = %assertion.principal().name(), "me");
    Json(MeResponse::from(&assertion))
}
