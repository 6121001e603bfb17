use axum::{body::Body, http::Request};

use crate::services::cas::assertion::Assertion;

/// Extension points around the CAS decision.
///
/// Every method has a no-op default; implement only what you need.
pub trait AuthenticationHooks: Send + Sync {
    /// Runs after the configuration is loaded, before any CAS logic.
    fn before(&self, _request: &mut Request<Body>) {}

    /// Runs for requests that are authenticated (restored from the session or
    /// freshly validated). The returned request continues down the chain.
    fn on_successful_validation(&self, request: Request<Body>, _assertion: &Assertion) -> Request<Body> {
        request
    }

    /// Runs right after the validator rejected a ticket.
    fn on_failed_validation(&self, _request: &Request<Body>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl AuthenticationHooks for NoopHooks {}
