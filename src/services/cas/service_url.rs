//! Service URL reconstruction.
//!
//! The same request must always yield the same service URL: it is sent to the
//! CAS server when validating a ticket and used again as the post-validation
//! redirect target, and CAS compares the two byte for byte.

use crate::services::cas::request::{RequestInfo, host_name};

const HTTP: &str = "http://";
const HTTPS: &str = "https://";

/// Build the canonical service (callback) URL for `request`.
///
/// `service` is an explicit override; `server_names` is the configured,
/// space separated list of host names this application answers to.
pub fn build_service_url(
    request: &RequestInfo,
    service: Option<&str>,
    server_names: &str,
    artifact_parameter_name: &str,
    append_port: bool,
    encode: bool,
) -> String {
    if let Some(service) = service.filter(|s| !s.trim().is_empty()) {
        return finish(request, service.to_string(), encode);
    }

    let server_name = find_matching_server_name(request, server_names);
    let contains_scheme = server_name.starts_with(HTTPS) || server_name.starts_with(HTTP);

    let mut buffer = String::with_capacity(server_name.len() + request.path.len() + 32);
    if !contains_scheme {
        buffer.push_str(if request.secure { HTTPS } else { HTTP });
    }
    buffer.push_str(server_name);

    if append_port
        && !server_name_contains_port(contains_scheme, server_name)
        && !request_is_on_standard_port(request)
    {
        buffer.push(':');
        buffer.push_str(&request.server_port.to_string());
    }

    buffer.push_str(&request.path);

    if let Some(query) = request
        .query
        .as_deref()
        .and_then(|q| strip_artifact(q, artifact_parameter_name))
    {
        buffer.push('?');
        buffer.push_str(query);
    }

    finish(request, buffer, encode)
}

fn finish(request: &RequestInfo, url: String, encode: bool) -> String {
    let url = if encode { request.encode_url(&url) } else { url };
    tracing::debug!(service_url = %url, "serviceUrl generated");
    url
}

/// Pick the configured server name matching the request host.
///
/// With a single configured name it is returned as is. Otherwise the `Host`
/// header (or `X-Forwarded-Host` behind a local proxy) is compared, case
/// insensitively, as a substring of each candidate; the first configured
/// name is the fallback.
pub fn find_matching_server_name<'a>(request: &RequestInfo, server_names: &'a str) -> &'a str {
    let candidates: Vec<&str> = server_names.split(' ').filter(|s| !s.is_empty()).collect();
    let Some(first) = candidates.first().copied() else {
        return server_names;
    };
    if candidates.len() == 1 {
        return first;
    }

    let comparison_host = match (&request.host, &request.forwarded_host) {
        (Some(host), Some(forwarded)) if host_name(host).eq_ignore_ascii_case("localhost") => {
            Some(forwarded)
        }
        (Some(host), _) => Some(host),
        (None, _) => None,
    };
    let Some(comparison_host) = comparison_host.map(|h| h.to_ascii_lowercase()) else {
        return first;
    };

    candidates
        .iter()
        .copied()
        .find(|candidate| candidate.to_ascii_lowercase().contains(&comparison_host))
        .unwrap_or(first)
}

fn server_name_contains_port(contains_scheme: bool, server_name: &str) -> bool {
    if !contains_scheme && server_name.contains(':') {
        return true;
    }
    // "https://host" has one colon, "https://host:8443" has two
    server_name.find(':') != server_name.rfind(':')
}

fn request_is_on_standard_port(request: &RequestInfo) -> bool {
    matches!(request.server_port, 80 | 443)
}

/// Remove the artifact parameter from a raw query string.
///
/// Leading artifact pairs are dropped and whatever follows them is kept; the
/// remainder is then cut at the first `&<artifact>=`.
/// Returns `None` when nothing is left.
fn strip_artifact<'q>(query: &'q str, artifact_parameter_name: &str) -> Option<&'q str> {
    if query.trim().is_empty() {
        return None;
    }

    let marker = format!("{artifact_parameter_name}=");
    let mut rest = query;
    while rest.starts_with(&marker) {
        rest = rest.split_once('&').map(|(_, tail)| tail).unwrap_or("");
    }
    let stripped = match rest.find(&format!("&{marker}")) {
        Some(cut) => &rest[..cut],
        None => rest,
    };

    (!stripped.is_empty()).then_some(stripped)
}

/// Login redirect URL: `<login>?<service_param>=<encoded service>[&renew=true][&gateway=true]`.
pub fn construct_redirect_url(
    cas_server_login_url: &str,
    service_parameter_name: &str,
    service_url: &str,
    renew: bool,
    gateway: bool,
) -> String {
    let separator = if cas_server_login_url.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{cas_server_login_url}{separator}{service_parameter_name}={}",
        url_encode(service_url)
    );
    if renew {
        url.push_str("&renew=true");
    }
    if gateway {
        url.push_str("&gateway=true");
    }
    url
}

/// `application/x-www-form-urlencoded` encoding (space becomes `+`).
pub fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
