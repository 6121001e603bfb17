/*
 * Responsibility
 * - CAS client settings for one layer instance (CasConfig)
 * - Validation of the settings before the layer is built
 * - ConfigSource: how the engine obtains the settings for a request
 */
use std::fmt;
use std::sync::Arc;

use axum::{body::Body, http::Request};

use crate::services::cas::error::CasConfigError;
use crate::services::cas::gateway::{GatewayResolver, SessionGatewayResolver};
use crate::services::cas::proxy::{InMemoryProxyGrantingTicketStorage, ProxyGrantingTicketStorage};
use crate::services::cas::redirect::{AuthenticationRedirectStrategy, DefaultRedirectStrategy};

pub const DEFAULT_ARTIFACT_PARAMETER_NAME: &str = "ticket";
pub const DEFAULT_SERVICE_PARAMETER_NAME: &str = "service";

#[derive(Clone)]
pub struct CasConfig {
    pub cas_server_url_prefix: String,
    pub cas_server_login_url: String,
    /// Space separated host names this application is reachable under.
    pub server_name: String,
    /// Fixed service URL; bypasses reconstruction from the request.
    pub service: Option<String>,
    pub artifact_parameter_name: String,
    pub service_parameter_name: String,
    pub encode_service_url: bool,
    pub append_port: bool,
    pub gateway: bool,
    pub renew: bool,
    pub use_session: bool,
    pub redirect_after_validation: bool,
    pub exception_on_validation_failure: bool,
    /// When false, unauthenticated requests pass through instead of being
    /// sent to the login page.
    pub redirect_auth_url: bool,
    pub proxy_receptor_url: Option<String>,
    pub redirect_strategy: Arc<dyn AuthenticationRedirectStrategy>,
    pub gateway_storage: Arc<dyn GatewayResolver>,
    pub proxy_granting_ticket_storage: Arc<dyn ProxyGrantingTicketStorage>,
}

impl CasConfig {
    pub fn new(
        cas_server_url_prefix: impl Into<String>,
        cas_server_login_url: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            cas_server_url_prefix: cas_server_url_prefix.into(),
            cas_server_login_url: cas_server_login_url.into(),
            server_name: server_name.into(),
            service: None,
            artifact_parameter_name: DEFAULT_ARTIFACT_PARAMETER_NAME.to_string(),
            service_parameter_name: DEFAULT_SERVICE_PARAMETER_NAME.to_string(),
            encode_service_url: true,
            append_port: true,
            gateway: false,
            renew: false,
            use_session: true,
            redirect_after_validation: true,
            exception_on_validation_failure: false,
            redirect_auth_url: true,
            proxy_receptor_url: None,
            redirect_strategy: Arc::new(DefaultRedirectStrategy),
            gateway_storage: Arc::new(SessionGatewayResolver),
            proxy_granting_ticket_storage: Arc::new(InMemoryProxyGrantingTicketStorage::default()),
        }
    }

    pub fn validate(&self) -> Result<(), CasConfigError> {
        if self.cas_server_url_prefix.trim().is_empty() {
            return Err(CasConfigError::Missing("casServerUrlPrefix"));
        }
        if url::Url::parse(&self.cas_server_url_prefix).is_err() {
            return Err(CasConfigError::Invalid("casServerUrlPrefix"));
        }
        if self.cas_server_login_url.trim().is_empty() {
            return Err(CasConfigError::Missing("casServerLoginUrl"));
        }
        if url::Url::parse(&self.cas_server_login_url).is_err() {
            return Err(CasConfigError::Invalid("casServerLoginUrl"));
        }
        let has_service = self.service.as_deref().is_some_and(|s| !s.trim().is_empty());
        if self.server_name.trim().is_empty() && !has_service {
            return Err(CasConfigError::Missing("serverName or service"));
        }
        if self.artifact_parameter_name.trim().is_empty() {
            return Err(CasConfigError::Invalid("artifactParameterName"));
        }
        if self.service_parameter_name.trim().is_empty() {
            return Err(CasConfigError::Invalid("serviceParameterName"));
        }
        Ok(())
    }

    /// Receptor path, if one is configured and non-empty.
    pub fn proxy_receptor_path(&self) -> Option<&str> {
        self.proxy_receptor_url.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for CasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CasConfig")
            .field("cas_server_url_prefix", &self.cas_server_url_prefix)
            .field("cas_server_login_url", &self.cas_server_login_url)
            .field("server_name", &self.server_name)
            .field("service", &self.service)
            .field("gateway", &self.gateway)
            .field("renew", &self.renew)
            .field("use_session", &self.use_session)
            .field("redirect_after_validation", &self.redirect_after_validation)
            .field("redirect_auth_url", &self.redirect_auth_url)
            .field("proxy_receptor_url", &self.proxy_receptor_url)
            .finish_non_exhaustive()
    }
}

/// Supplies the configuration for a request.
///
/// The engine asks once per request and threads the result through the call;
/// nothing is cached on shared state.
pub trait ConfigSource: Send + Sync {
    fn load(&self, request: &Request<Body>) -> Result<Arc<CasConfig>, CasConfigError>;
}

/// A fixed configuration, validated on every use so a bad value fails open
/// rather than half-working.
impl ConfigSource for Arc<CasConfig> {
    fn load(&self, _request: &Request<Body>) -> Result<Arc<CasConfig>, CasConfigError> {
        self.validate()?;
        Ok(Arc::clone(self))
    }
}
