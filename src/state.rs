/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - cas: the authentication engine used by the CAS middleware
 *   - proxy_tickets: PGT storage shared by the validator and the receptor route
 * - Cheap to Clone (everything behind Arc)
 */
use std::sync::Arc;

use crate::services::cas::{AuthenticationEngine, ProxyGrantingTicketStorage};

#[derive(Clone)]
pub struct AppState {
    pub cas: Arc<AuthenticationEngine>,
    pub proxy_tickets: Arc<dyn ProxyGrantingTicketStorage>,
}

impl AppState {
    pub fn new(
        cas: Arc<AuthenticationEngine>,
        proxy_tickets: Arc<dyn ProxyGrantingTicketStorage>,
    ) -> Self {
        Self { cas, proxy_tickets }
    }
}
