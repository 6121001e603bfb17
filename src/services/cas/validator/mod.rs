//! Ticket validation: exchanging a service ticket for an `Assertion`.

pub mod cas20;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::cas::assertion::Assertion;

pub use cas20::Cas20ProxyTicketValidator;

#[derive(Debug, Error)]
pub enum TicketValidationError {
    /// The CAS server answered with an authentication failure.
    #[error("{code}: {description}")]
    Rejected { code: String, description: String },

    #[error("proxy chain not allowed: {0:?}")]
    InvalidProxyChain(Vec<String>),

    #[error("invalid CAS server url: {0}")]
    InvalidServerUrl(String),

    #[error("CAS server request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed CAS server response: {0}")]
    MalformedResponse(String),

    /// The server ignored `format=JSON`; JSON responses need CAS 5 or later.
    #[error("unsupported CAS server response format: {0}")]
    UnsupportedResponseFormat(String),
}

/// Redeems `ticket` for `service_url` against the CAS server at
/// `server_url_prefix`. One attempt; failure is final for the request.
#[async_trait]
pub trait TicketValidator: Send + Sync {
    async fn validate(
        &self,
        server_url_prefix: &str,
        ticket: &str,
        service_url: &str,
    ) -> Result<Assertion, TicketValidationError>;
}
