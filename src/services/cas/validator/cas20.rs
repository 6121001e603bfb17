//! CAS 2.0 `proxyValidate` client.
//!
//! Asks the server for the JSON rendition of the service response
//! (`format=JSON`), which CAS 5 and later support on `/proxyValidate`.
//! Older servers ignore the parameter and answer XML; those responses are
//! reported as `UnsupportedResponseFormat` rather than parsed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::services::cas::assertion::{Assertion, AttributePrincipal, Attributes};
use crate::services::cas::proxy::ProxyGrantingTicketStorage;
use crate::services::cas::validator::{TicketValidationError, TicketValidator};

const URL_SUFFIX: &str = "proxyValidate";

/// Validates service and proxy tickets.
///
/// Proxied tickets are only accepted when `accept_any_proxy` is set or the
/// proxy chain equals one of `allowed_proxy_chains`.
pub struct Cas20ProxyTicketValidator {
    http_client: reqwest::Client,
    renew: bool,
    proxy_callback_url: Option<String>,
    proxy_granting_ticket_storage: Option<Arc<dyn ProxyGrantingTicketStorage>>,
    accept_any_proxy: bool,
    allowed_proxy_chains: Vec<Vec<String>>,
}

impl Cas20ProxyTicketValidator {
    pub fn new(timeout: Duration) -> Result<Self, TicketValidationError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(http_client))
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            renew: false,
            proxy_callback_url: None,
            proxy_granting_ticket_storage: None,
            accept_any_proxy: false,
            allowed_proxy_chains: Vec::new(),
        }
    }

    pub fn renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }

    /// Ask CAS for a PGT delivered to `callback_url`, resolved through `storage`.
    pub fn proxy_callback(
        mut self,
        callback_url: impl Into<String>,
        storage: Arc<dyn ProxyGrantingTicketStorage>,
    ) -> Self {
        self.proxy_callback_url = Some(callback_url.into());
        self.proxy_granting_ticket_storage = Some(storage);
        self
    }

    pub fn accept_any_proxy(mut self, accept: bool) -> Self {
        self.accept_any_proxy = accept;
        self
    }

    pub fn allowed_proxy_chains(mut self, chains: Vec<Vec<String>>) -> Self {
        self.allowed_proxy_chains = chains;
        self
    }

    pub fn validation_url(
        &self,
        server_url_prefix: &str,
        ticket: &str,
        service_url: &str,
    ) -> Result<Url, TicketValidationError> {
        let base = format!("{}/{}", server_url_prefix.trim_end_matches('/'), URL_SUFFIX);
        let mut url = Url::parse(&base)
            .map_err(|_| TicketValidationError::InvalidServerUrl(server_url_prefix.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ticket", ticket);
            query.append_pair("service", service_url);
            if let Some(callback) = &self.proxy_callback_url {
                query.append_pair("pgtUrl", callback);
            }
            if self.renew {
                query.append_pair("renew", "true");
            }
            query.append_pair("format", "JSON");
        }

        Ok(url)
    }

    fn parse_response(&self, body: &str) -> Result<Assertion, TicketValidationError> {
        if body.trim_start().starts_with('<') {
            return Err(TicketValidationError::UnsupportedResponseFormat(
                "XML (CAS server older than 5.0?)".into(),
            ));
        }
        let envelope: ServiceResponseEnvelope = serde_json::from_str(body)
            .map_err(|e| TicketValidationError::MalformedResponse(e.to_string()))?;

        let success = match envelope.service_response {
            ServiceResponse {
                authentication_success: Some(success),
                ..
            } => success,
            ServiceResponse {
                authentication_failure: Some(failure),
                ..
            } => {
                return Err(TicketValidationError::Rejected {
                    code: failure.code,
                    description: failure.description.trim().to_string(),
                });
            }
            _ => {
                return Err(TicketValidationError::MalformedResponse(
                    "neither authenticationSuccess nor authenticationFailure".into(),
                ));
            }
        };

        if success.user.trim().is_empty() {
            return Err(TicketValidationError::MalformedResponse(
                "no principal was found in the response from the CAS server".into(),
            ));
        }

        if !success.proxies.is_empty() && !self.proxy_chain_allowed(&success.proxies) {
            return Err(TicketValidationError::InvalidProxyChain(success.proxies));
        }

        let mut principal = AttributePrincipal::new(success.user).with_attributes(success.attributes);
        if let (Some(iou), Some(storage)) = (
            success.proxy_granting_ticket.as_deref(),
            self.proxy_granting_ticket_storage.as_ref(),
        ) {
            match storage.retrieve(iou) {
                Some(pgt) => principal = principal.with_proxy_granting_ticket(pgt),
                None => tracing::warn!(pgt_iou = %iou, "proxy granting ticket not found for IOU"),
            }
        }

        Ok(Assertion::new(principal))
    }

    fn proxy_chain_allowed(&self, proxies: &[String]) -> bool {
        self.accept_any_proxy || self.allowed_proxy_chains.iter().any(|chain| chain == proxies)
    }
}

#[async_trait]
impl TicketValidator for Cas20ProxyTicketValidator {
    async fn validate(
        &self,
        server_url_prefix: &str,
        ticket: &str,
        service_url: &str,
    ) -> Result<Assertion, TicketValidationError> {
        let url = self.validation_url(server_url_prefix, ticket, service_url)?;
        tracing::debug!(url = %url, "validating ticket");

        let body = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        self.parse_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceResponseEnvelope {
    #[serde(rename = "serviceResponse")]
    service_response: ServiceResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResponse {
    authentication_success: Option<AuthenticationSuccess>,
    authentication_failure: Option<AuthenticationFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationSuccess {
    user: String,
    #[serde(default)]
    proxy_granting_ticket: Option<String>,
    #[serde(default)]
    proxies: Vec<String>,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
struct AuthenticationFailure {
    code: String,
    #[serde(default)]
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cas::proxy::InMemoryProxyGrantingTicketStorage;

    fn validator() -> Cas20ProxyTicketValidator {
        Cas20ProxyTicketValidator::with_client(reqwest::Client::new())
    }

    #[test]
    fn builds_validation_url() {
        let url = validator()
            .renew(true)
            .validation_url(
                "https://cas.example.com/cas/",
                "ST-1",
                "http://app.example.com/app?x=1",
            )
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://cas.example.com/cas/proxyValidate?ticket=ST-1&service=http%3A%2F%2Fapp.example.com%2Fapp%3Fx%3D1&renew=true&format=JSON"
        );
    }

    #[test]
    fn xml_response_is_reported_as_unsupported() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess><cas:user>alice</cas:user></cas:authenticationSuccess>
        </cas:serviceResponse>"#;

        let err = validator().parse_response(body).unwrap_err();
        assert!(matches!(err, TicketValidationError::UnsupportedResponseFormat(_)));
    }

    #[test]
    fn rejects_unparseable_server_prefix() {
        let err = validator().validation_url("not a url", "ST-1", "http://a/").unwrap_err();
        assert!(matches!(err, TicketValidationError::InvalidServerUrl(_)));
    }

    #[test]
    fn parses_success_with_attributes() {
        let body = r#"{"serviceResponse":{"authenticationSuccess":{
            "user":"alice",
            "attributes":{"mail":["alice@example.com"],"displayName":"Alice"}
        }}}"#;

        let assertion = validator().parse_response(body).unwrap();
        assert_eq!(assertion.principal().name(), "alice");
        assert_eq!(
            assertion.principal().attributes()["displayName"],
            serde_json::json!("Alice")
        );
    }

    #[test]
    fn parses_failure() {
        let body = r#"{"serviceResponse":{"authenticationFailure":{
            "code":"INVALID_TICKET","description":" Ticket ST-1 not recognized "
        }}}"#;

        match validator().parse_response(body) {
            Err(TicketValidationError::Rejected { code, description }) => {
                assert_eq!(code, "INVALID_TICKET");
                assert_eq!(description, "Ticket ST-1 not recognized");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn proxy_chain_must_be_allowed() {
        let body = r#"{"serviceResponse":{"authenticationSuccess":{
            "user":"alice","proxies":["https://proxy.example.com/cb"]
        }}}"#;

        assert!(matches!(
            validator().parse_response(body),
            Err(TicketValidationError::InvalidProxyChain(_))
        ));
        assert!(
            validator()
                .allowed_proxy_chains(vec![vec!["https://proxy.example.com/cb".into()]])
                .parse_response(body)
                .is_ok()
        );
        assert!(validator().accept_any_proxy(true).parse_response(body).is_ok());
    }

    #[test]
    fn resolves_pgt_from_iou() {
        let storage = Arc::new(InMemoryProxyGrantingTicketStorage::default());
        storage.save("PGTIOU-1", "PGT-1");
        let validator = validator().proxy_callback("https://app.example.com/proxy", storage);

        let body = r#"{"serviceResponse":{"authenticationSuccess":{
            "user":"alice","proxyGrantingTicket":"PGTIOU-1"
        }}}"#;

        let assertion = validator.parse_response(body).unwrap();
        assert_eq!(assertion.principal().proxy_granting_ticket(), Some("PGT-1"));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            validator().parse_response("<cas:serviceResponse/>"),
            Err(TicketValidationError::MalformedResponse(_))
        ));
        assert!(matches!(
            validator().parse_response(r#"{"serviceResponse":{}}"#),
            Err(TicketValidationError::MalformedResponse(_))
        ));
    }
}
