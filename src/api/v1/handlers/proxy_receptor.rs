/*
 * Responsibility
 * - Proxy receptor mounted outside CAS protection
 *
 * The CAS server calls back without a session cookie or ticket, so behind the
 * CAS layer the callback would be answered with a login redirect. app.rs mounts
 * this handler at CAS_PROXY_RECEPTOR_URL instead.
 */
use axum::{body::Body, extract::State, http::Request, response::Response};

use crate::services::cas::proxy::respond_to_proxy_receptor_request;
use crate::services::cas::RequestInfo;
use crate::services::session::SessionCookie;
use crate::state::AppState;

pub async fn proxy_receptor(State(state): State<AppState>, req: Request<Body>) -> Response {
    let info = RequestInfo::from_request(&req, &SessionCookie::default());
    respond_to_proxy_receptor_request(&info, state.proxy_tickets.as_ref())
}
