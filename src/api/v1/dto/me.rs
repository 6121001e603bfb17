use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::cas::{Assertion, Attributes};

/// Response of `GET /api/v1/me`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: String,
    pub attributes: Attributes,
    pub authentication_date: DateTime<Utc>,
    pub proxy_granting_ticket: bool,
}

impl From<&Assertion> for MeResponse {
    fn from(assertion: &Assertion) -> Self {
        let principal = assertion.principal();
        Self {
            user: principal.name().to_string(),
            attributes: principal.attributes().clone(),
            authentication_date: assertion.authentication_date(),
            proxy_granting_ticket: principal.proxy_granting_ticket().is_some(),
        }
    }
}
