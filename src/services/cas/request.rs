//! Read-only view of the inbound request used by the CAS layer.
//!
//! Everything the service URL builder and the decision engine consult is
//! captured once, up front, so neither needs to know about axum types.

use axum::extract::OriginalUri;
use axum::http::{HeaderMap, Method, Request, header};
use cookie::Cookie;

use crate::services::session::SessionCookie;

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_REQUESTED_WITH: &str = "x-requested-with";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIdSource {
    Cookie,
    // Cookie-less client: the id travels as a query parameter
    UrlParameter,
}

#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub secure: bool,
    pub host: Option<String>,
    pub forwarded_host: Option<String>,
    pub requested_with: Option<String>,
    pub server_port: u16,
    /// Path as received (not decoded), without the query string.
    pub path: String,
    /// Raw query string, `None` when absent.
    pub query: Option<String>,
    pub has_cookies: bool,
    pub session_id: Option<String>,
    pub session_id_source: Option<SessionIdSource>,
    session_parameter_name: String,
}

impl RequestInfo {
    pub fn from_request<B>(req: &Request<B>, session_cookie: &SessionCookie) -> Self {
        // Nested routers rewrite `req.uri()`; the service URL must use what the
        // browser actually requested.
        let uri = req
            .extensions()
            .get::<OriginalUri>()
            .map(|o| &o.0)
            .unwrap_or_else(|| req.uri());
        let headers = req.headers();

        let host = header_str(headers, header::HOST.as_str())
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()));
        let forwarded_host = header_str(headers, X_FORWARDED_HOST);

        let secure = uri.scheme_str() == Some("https")
            || header_str(headers, X_FORWARDED_PROTO)
                .and_then(|v| v.split(',').next().map(|p| p.trim().eq_ignore_ascii_case("https")))
                .unwrap_or(false);

        let server_port = host
            .as_deref()
            .and_then(port_of)
            .or_else(|| uri.port_u16())
            .unwrap_or(if secure { 443 } else { 80 });

        let query = uri.query().filter(|q| !q.is_empty()).map(str::to_string);

        let mut has_cookies = false;
        let mut cookie_session = None;
        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for cookie in Cookie::split_parse(raw).flatten() {
                has_cookies = true;
                if cookie.name() == session_cookie.name && cookie_session.is_none() {
                    cookie_session = Some(cookie.value().to_string());
                }
            }
        }

        let (session_id, session_id_source) = match cookie_session {
            Some(id) => (Some(id), Some(SessionIdSource::Cookie)),
            None => match query
                .as_deref()
                .and_then(|q| query_parameter(q, &session_cookie.name))
            {
                Some(id) => (Some(id), Some(SessionIdSource::UrlParameter)),
                None => (None, None),
            },
        };

        Self {
            method: req.method().clone(),
            secure,
            host,
            forwarded_host,
            requested_with: header_str(headers, X_REQUESTED_WITH),
            server_port,
            path: uri.path().to_string(),
            query,
            has_cookies,
            session_id,
            session_id_source,
            session_parameter_name: session_cookie.name.clone(),
        }
    }

    /// Query parameter lookup that only parses when the raw query mentions
    /// `name`. Blank values read as absent.
    pub fn parameter(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        if !query.contains(name) {
            return None;
        }
        query_parameter(query, name).filter(|v| !v.trim().is_empty())
    }

    pub fn is_xhr(&self) -> bool {
        self.requested_with
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    /// Session URL-encoding hook.
    ///
    /// Clients that carry the session id in the URL keep it on every URL we
    /// hand back; for cookie clients this is the identity.
    pub fn encode_url(&self, url: &str) -> String {
        let (Some(id), Some(SessionIdSource::UrlParameter)) =
            (self.session_id.as_deref(), self.session_id_source.as_ref())
        else {
            return url.to_string();
        };

        let (without_fragment, fragment) = match url.split_once('#') {
            Some((u, f)) => (u, Some(f)),
            None => (url, None),
        };

        if without_fragment
            .split_once('?')
            .and_then(|(_, q)| query_parameter(q, &self.session_parameter_name))
            .is_some()
        {
            return url.to_string();
        }

        let separator = if without_fragment.contains('?') { '&' } else { '?' };
        let mut encoded = format!(
            "{without_fragment}{separator}{}={}",
            self.session_parameter_name,
            super::service_url::url_encode(id)
        );
        if let Some(fragment) = fragment {
            encoded.push('#');
            encoded.push_str(fragment);
        }
        encoded
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn query_parameter(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

// "host:port" -> port; bracketed IPv6 literals are handled.
fn port_of(host: &str) -> Option<u16> {
    let after_bracket = match host.rfind(']') {
        Some(idx) => &host[idx + 1..],
        None => host,
    };
    after_bracket.rsplit_once(':')?.1.parse().ok()
}

/// Host name part of a `Host` header value.
pub(crate) fn host_name(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_inclusive(']').next().unwrap_or(host);
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn info(req: Request<Body>) -> RequestInfo {
        RequestInfo::from_request(&req, &SessionCookie::default())
    }

    #[test]
    fn reads_host_port_and_scheme() {
        let req = Request::builder()
            .uri("/app/page?x=1")
            .header("host", "app.example.com:8443")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap();
        let info = info(req);

        assert!(info.secure);
        assert_eq!(info.server_port, 8443);
        assert_eq!(info.path, "/app/page");
        assert_eq!(info.query.as_deref(), Some("x=1"));
        assert!(!info.has_cookies);
    }

    #[test]
    fn default_port_follows_scheme() {
        let req = Request::builder()
            .uri("https://app.example.com/")
            .body(Body::empty())
            .unwrap();
        let info = info(req);

        assert!(info.secure);
        assert_eq!(info.server_port, 443);
        assert_eq!(info.host.as_deref(), Some("app.example.com"));
    }

    #[test]
    fn session_id_prefers_cookie_over_url() {
        let req = Request::builder()
            .uri("/?CASCLIENTSESSION=from-url")
            .header("cookie", "theme=dark; CASCLIENTSESSION=from-cookie")
            .body(Body::empty())
            .unwrap();
        let info = info(req);

        assert!(info.has_cookies);
        assert_eq!(info.session_id.as_deref(), Some("from-cookie"));
        assert_eq!(info.session_id_source, Some(SessionIdSource::Cookie));
        assert_eq!(info.encode_url("http://a/b"), "http://a/b");
    }

    #[test]
    fn url_session_is_reattached_once() {
        let req = Request::builder()
            .uri("/?CASCLIENTSESSION=sid-1")
            .body(Body::empty())
            .unwrap();
        let info = info(req);

        assert_eq!(info.session_id_source, Some(SessionIdSource::UrlParameter));
        assert_eq!(
            info.encode_url("http://a/b"),
            "http://a/b?CASCLIENTSESSION=sid-1"
        );
        assert_eq!(
            info.encode_url("http://a/b?x=1&CASCLIENTSESSION=sid-1"),
            "http://a/b?x=1&CASCLIENTSESSION=sid-1"
        );
    }

    #[test]
    fn blank_parameter_reads_as_absent() {
        let req = Request::builder()
            .uri("/?ticket=%20&other=1")
            .body(Body::empty())
            .unwrap();
        let info = info(req);

        assert_eq!(info.parameter("ticket"), None);
        assert_eq!(info.parameter("other").as_deref(), Some("1"));
        assert_eq!(info.parameter("missing"), None);
    }

    #[test]
    fn host_name_strips_port() {
        assert_eq!(host_name("localhost:8080"), "localhost");
        assert_eq!(host_name("[::1]:8080"), "[::1]");
        assert_eq!(port_of("[::1]:8080"), Some(8080));
        assert_eq!(port_of("[::1]"), None);
    }
}
