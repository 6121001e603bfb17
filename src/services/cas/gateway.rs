use crate::services::session::RequestSession;

/// Session attribute marking that a gateway redirect was already issued.
pub const CONST_CAS_GATEWAY: &str = "_const_cas_gateway_";

/// Remembers which requests were already sent to CAS in gateway mode, so the
/// unauthenticated return trip is let through instead of redirected again.
pub trait GatewayResolver: Send + Sync {
    fn has_gatewayed_already(&self, session: &mut RequestSession, service_url: &str) -> bool;

    /// Record a gateway attempt; returns the service URL to send to CAS.
    fn store_gateway_information(&self, session: &mut RequestSession, service_url: &str) -> String;
}

/// Session-backed resolver. The marker is consumed by the check, so one
/// gateway attempt allows exactly one pass-through.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionGatewayResolver;

impl GatewayResolver for SessionGatewayResolver {
    fn has_gatewayed_already(&self, session: &mut RequestSession, _service_url: &str) -> bool {
        if !session.get().is_some_and(|s| s.contains(CONST_CAS_GATEWAY)) {
            return false;
        }
        session
            .get_mut()
            .and_then(|s| s.remove(CONST_CAS_GATEWAY))
            .is_some()
    }

    fn store_gateway_information(&self, session: &mut RequestSession, service_url: &str) -> String {
        if let Err(err) = session.get_or_create().insert(CONST_CAS_GATEWAY, &"yes") {
            tracing::warn!(error = ?err, "failed to record gateway attempt");
        }
        service_url.to_string()
    }
}
