/*
 * Responsibility
 * - Storage of proxy-granting tickets keyed by their IOU
 * - The proxy receptor callback answered on behalf of the CAS server
 */
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::services::cas::request::RequestInfo;

pub const PARAM_PROXY_GRANTING_TICKET_IOU: &str = "pgtIou";
pub const PARAM_PROXY_GRANTING_TICKET: &str = "pgtId";

const PROXY_SUCCESS_BODY: &str = concat!(
    "<?xml version=\"1.0\"?>",
    "<casClient:proxySuccess xmlns:casClient=\"http://www.yale.edu/tp/casClient\" />"
);

pub trait ProxyGrantingTicketStorage: Send + Sync {
    fn save(&self, pgt_iou: &str, pgt_id: &str);

    /// Take the PGT for `pgt_iou`; an IOU can be redeemed once.
    fn retrieve(&self, pgt_iou: &str) -> Option<String>;

    fn cleanup(&self);
}

/// In-memory storage. The CAS server calls back just before it answers the
/// validation request, so entries only need to live for a short while.
pub struct InMemoryProxyGrantingTicketStorage {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    timeout: Duration,
}

impl InMemoryProxyGrantingTicketStorage {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout,
        }
    }
}

impl Default for InMemoryProxyGrantingTicketStorage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl ProxyGrantingTicketStorage for InMemoryProxyGrantingTicketStorage {
    fn save(&self, pgt_iou: &str, pgt_id: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!("proxy granting ticket storage lock poisoned");
            return;
        };
        entries.insert(pgt_iou.to_string(), (pgt_id.to_string(), Instant::now()));
    }

    fn retrieve(&self, pgt_iou: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        match entries.remove(pgt_iou) {
            Some((pgt, saved)) if saved.elapsed() < self.timeout => Some(pgt),
            Some(_) => {
                tracing::debug!(pgt_iou = %pgt_iou, "proxy granting ticket expired");
                None
            }
            None => {
                tracing::debug!(pgt_iou = %pgt_iou, "no proxy granting ticket for IOU");
                None
            }
        }
    }

    fn cleanup(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            let timeout = self.timeout;
            entries.retain(|_, (_, saved)| saved.elapsed() < timeout);
        }
    }
}

/// Answer a proxy receptor callback: store IOU -> PGT and acknowledge.
/// Missing parameters get an empty `200`.
pub fn respond_to_proxy_receptor_request(
    request: &RequestInfo,
    storage: &dyn ProxyGrantingTicketStorage,
) -> Response {
    let pgt_iou = request.parameter(PARAM_PROXY_GRANTING_TICKET_IOU);
    let pgt_id = request.parameter(PARAM_PROXY_GRANTING_TICKET);

    let (Some(pgt_iou), Some(pgt_id)) = (pgt_iou, pgt_id) else {
        return (StatusCode::OK, "").into_response();
    };

    tracing::debug!(pgt_iou = %pgt_iou, "received proxy granting ticket");
    storage.save(&pgt_iou, &pgt_id);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        PROXY_SUCCESS_BODY,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;

    use super::*;
    use crate::services::session::SessionCookie;

    fn info(uri: &str) -> RequestInfo {
        RequestInfo::from_request(
            &Request::builder().uri(uri).body(Body::empty()).unwrap(),
            &SessionCookie::default(),
        )
    }

    #[test]
    fn retrieve_consumes_entry() {
        let storage = InMemoryProxyGrantingTicketStorage::default();
        storage.save("PGTIOU-1", "PGT-1");

        assert_eq!(storage.retrieve("PGTIOU-1").as_deref(), Some("PGT-1"));
        assert_eq!(storage.retrieve("PGTIOU-1"), None);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let storage = InMemoryProxyGrantingTicketStorage::new(Duration::ZERO);
        storage.save("PGTIOU-1", "PGT-1");
        storage.save("PGTIOU-2", "PGT-2");

        storage.cleanup();
        assert_eq!(storage.retrieve("PGTIOU-2"), None);
    }

    #[tokio::test]
    async fn receptor_stores_and_acknowledges() {
        let storage = InMemoryProxyGrantingTicketStorage::default();
        let resp = respond_to_proxy_receptor_request(
            &info("/proxy/receptor?pgtIou=PGTIOU-9&pgtId=PGT-9"),
            &storage,
        );

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, PROXY_SUCCESS_BODY.as_bytes());
        assert_eq!(storage.retrieve("PGTIOU-9").as_deref(), Some("PGT-9"));
    }

    #[tokio::test]
    async fn receptor_without_parameters_answers_empty() {
        let storage = InMemoryProxyGrantingTicketStorage::default();
        let resp = respond_to_proxy_receptor_request(&info("/proxy/receptor?pgtIou=X"), &storage);

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(storage.retrieve("X"), None);
    }
}
