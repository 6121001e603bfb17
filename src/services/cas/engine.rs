//! Per-request CAS authentication decision.
//!
//! Classifies the request (authenticated session, returning ticket, nothing)
//! and either lets it through, sends the browser to the CAS login page, or
//! redeems the ticket with the validator.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, header},
    response::Response,
};

use crate::services::cas::assertion::Assertion;
use crate::services::cas::config::{CasConfig, ConfigSource};
use crate::services::cas::error::CasError;
use crate::services::cas::hooks::{AuthenticationHooks, NoopHooks};
use crate::services::cas::proxy::respond_to_proxy_receptor_request;
use crate::services::cas::redirect;
use crate::services::cas::request::RequestInfo;
use crate::services::cas::service_url::{build_service_url, construct_redirect_url};
use crate::services::cas::validator::TicketValidator;
use crate::services::session::{RequestSession, SessionCookie, SessionStore};

/// Session attribute holding the validated `Assertion`.
pub const CONST_CAS_ASSERTION: &str = "_const_cas_assertion_";

#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    NoAssertionNoTicket,
    AssertionPresent(Assertion),
    TicketPresent(String),
    /// Nothing to act on: the gateway round trip came back without a ticket,
    /// or the session holds an assertion without a principal.
    GatewayedNoOp,
}

impl RequestState {
    pub fn classify(assertion: Option<Assertion>, ticket: Option<String>, was_gatewayed: bool) -> Self {
        match (assertion, ticket) {
            (None, None) if !was_gatewayed => Self::NoAssertionNoTicket,
            (Some(assertion), _) if assertion.is_authenticated() => Self::AssertionPresent(assertion),
            (_, Some(ticket)) => Self::TicketPresent(ticket),
            _ => Self::GatewayedNoOp,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NoAssertionNoTicket => "no_assertion_no_ticket",
            Self::AssertionPresent(_) => "assertion_present",
            Self::TicketPresent(_) => "ticket_present",
            Self::GatewayedNoOp => "gatewayed_no_op",
        }
    }
}

enum Step {
    Continue(Request<Body>),
    Respond(Response),
}

/// The CAS decision engine. One instance serves all requests; it holds only
/// shared, immutable collaborators.
pub struct AuthenticationEngine {
    config: Arc<dyn ConfigSource>,
    validator: Arc<dyn TicketValidator>,
    sessions: Arc<dyn SessionStore>,
    session_cookie: SessionCookie,
    hooks: Arc<dyn AuthenticationHooks>,
}

impl AuthenticationEngine {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        validator: Arc<dyn TicketValidator>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            validator,
            sessions,
            session_cookie: SessionCookie::default(),
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AuthenticationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_session_cookie(mut self, session_cookie: SessionCookie) -> Self {
        self.session_cookie = session_cookie;
        self
    }

    /// Run the CAS decision for `request`; `next` is the rest of the chain.
    ///
    /// Only a validation failure with `exception_on_validation_failure` is
    /// returned as an error.
    pub async fn handle<F, Fut>(&self, mut request: Request<Body>, next: F) -> Result<Response, CasError>
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let config = match self.config.load(&request) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "CAS configuration unavailable; request passes unauthenticated");
                return Ok(next(request).await);
            }
        };
        self.hooks.before(&mut request);

        let info = RequestInfo::from_request(&request, &self.session_cookie);
        let mut session = RequestSession::open(self.sessions.as_ref(), info.session_id.as_deref()).await;

        let step = self.decide(&config, &info, &mut session, request).await;

        if let Err(err) = session.commit(self.sessions.as_ref()).await {
            tracing::warn!(
                error = ?err,
                backend = self.sessions.backend_name(),
                "session write failed"
            );
        }

        let mut response = match step? {
            Step::Respond(response) => response,
            Step::Continue(request) => next(request).await,
        };

        if let Some(cookie) = session.set_cookie(&self.session_cookie, info.secure) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }

        Ok(response)
    }

    async fn decide(
        &self,
        config: &CasConfig,
        info: &RequestInfo,
        session: &mut RequestSession,
        mut request: Request<Body>,
    ) -> Result<Step, CasError> {
        let assertion: Option<Assertion> = session.get().and_then(|s| s.get(CONST_CAS_ASSERTION));
        let service_url = service_url_for(config, info);
        let ticket = read_ticket(config, info);
        let was_gatewayed =
            config.gateway && config.gateway_storage.has_gatewayed_already(session, &service_url);

        let state = RequestState::classify(assertion, ticket, was_gatewayed);
        tracing::debug!(state = state.name(), path = %info.path, "CAS request classified");

        let ticket = match state {
            RequestState::NoAssertionNoTicket => {
                return Ok(self.redirect_to_login(config, info, session, service_url, request));
            }
            RequestState::AssertionPresent(assertion) => {
                request.extensions_mut().insert(assertion.clone());
                let request = self.hooks.on_successful_validation(request, &assertion);
                return Ok(Step::Continue(request));
            }
            RequestState::TicketPresent(ticket) => Some(ticket),
            RequestState::GatewayedNoOp => None,
        };

        if config
            .proxy_receptor_path()
            .is_some_and(|receptor| info.path.ends_with(receptor))
        {
            return Ok(Step::Respond(respond_to_proxy_receptor_request(
                info,
                config.proxy_granting_ticket_storage.as_ref(),
            )));
        }

        let Some(ticket) = ticket else {
            return Ok(Step::Continue(request));
        };

        tracing::debug!(ticket = %ticket, "attempting to validate ticket");

        match self
            .validator
            .validate(&config.cas_server_url_prefix, &ticket, &service_url)
            .await
        {
            Ok(assertion) => {
                tracing::debug!(principal = %assertion.principal().name(), "successfully authenticated user");

                if config.use_session {
                    if let Err(err) = session.get_or_create().insert(CONST_CAS_ASSERTION, &assertion) {
                        tracing::warn!(error = ?err, "unable to store assertion in session");
                    }
                }
                request.extensions_mut().insert(assertion.clone());
                let request = self.hooks.on_successful_validation(request, &assertion);

                if config.redirect_after_validation {
                    tracing::debug!("redirecting after successful ticket validation");
                    return Ok(Step::Respond(redirect::found(&service_url_for(config, info))));
                }
                Ok(Step::Continue(request))
            }
            Err(err) => {
                tracing::debug!(error = %err, "ticket validation failed");
                self.hooks.on_failed_validation(&request);

                if config.exception_on_validation_failure {
                    return Err(CasError::TicketValidation(err));
                }
                Ok(Step::Continue(request))
            }
        }
    }

    fn redirect_to_login(
        &self,
        config: &CasConfig,
        info: &RequestInfo,
        session: &mut RequestSession,
        service_url: String,
        request: Request<Body>,
    ) -> Step {
        tracing::debug!("no ticket and no assertion found");
        if !config.redirect_auth_url {
            return Step::Continue(request);
        }

        let modified_service_url = if config.gateway {
            tracing::debug!("setting gateway attribute in session");
            config.gateway_storage.store_gateway_information(session, &service_url)
        } else {
            service_url
        };
        tracing::debug!(service_url = %modified_service_url, "constructed service url");

        let url_to_redirect_to = construct_redirect_url(
            &config.cas_server_login_url,
            &config.service_parameter_name,
            &modified_service_url,
            config.renew,
            config.gateway,
        );
        tracing::debug!(login_url = %url_to_redirect_to, "redirecting to CAS login");

        Step::Respond(config.redirect_strategy.redirect(info, &url_to_redirect_to))
    }
}

fn service_url_for(config: &CasConfig, info: &RequestInfo) -> String {
    build_service_url(
        info,
        config.service.as_deref(),
        &config.server_name,
        &config.artifact_parameter_name,
        config.append_port,
        config.encode_service_url,
    )
}

// Deviation from upstream CAS semantics: a ticket on a request without any
// cookie is treated as a stale redirect artifact and ignored. Cookie-less
// browsers therefore never get their first ticket validated.
fn read_ticket(config: &CasConfig, info: &RequestInfo) -> Option<String> {
    let ticket = info.parameter(&config.artifact_parameter_name)?;
    if !info.has_cookies {
        tracing::debug!("ignoring ticket on request without cookies");
        return None;
    }
    Some(ticket)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;
    use crate::services::cas::assertion::AttributePrincipal;
    use crate::services::cas::error::CasConfigError;
    use crate::services::cas::validator::TicketValidationError;
    use crate::services::session::{MemorySessionStore, Session};

    const LOGIN: &str = "https://cas.example.com/cas/login";

    struct StubValidator {
        principal: Option<&'static str>,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl StubValidator {
        fn accepting(principal: &'static str) -> Arc<Self> {
            Arc::new(Self {
                principal: Some(principal),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn rejecting() -> Arc<Self> {
            Arc::new(Self {
                principal: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TicketValidator for StubValidator {
        async fn validate(
            &self,
            server_url_prefix: &str,
            ticket: &str,
            service_url: &str,
        ) -> Result<Assertion, TicketValidationError> {
            self.calls.lock().unwrap().push((
                server_url_prefix.to_string(),
                ticket.to_string(),
                service_url.to_string(),
            ));
            match self.principal {
                Some(name) => Ok(Assertion::new(AttributePrincipal::new(name))),
                None => Err(TicketValidationError::Rejected {
                    code: "INVALID_TICKET".into(),
                    description: format!("ticket {ticket} not recognized"),
                }),
            }
        }
    }

    #[derive(Default)]
    struct CountingHooks {
        successes: AtomicUsize,
        failures: AtomicUsize,
        // whether the assertion was already in the extensions, per success call
        saw_assertion: Mutex<Vec<bool>>,
    }

    impl AuthenticationHooks for CountingHooks {
        fn on_successful_validation(&self, request: Request<Body>, _assertion: &Assertion) -> Request<Body> {
            self.successes.fetch_add(1, Ordering::SeqCst);
            self.saw_assertion
                .lock()
                .unwrap()
                .push(request.extensions().get::<Assertion>().is_some());
            request
        }

        fn on_failed_validation(&self, _request: &Request<Body>) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct BrokenConfig;

    impl ConfigSource for BrokenConfig {
        fn load(&self, _request: &Request<Body>) -> Result<Arc<CasConfig>, CasConfigError> {
            Err(CasConfigError::Missing("casServerUrlPrefix"))
        }
    }

    struct Harness {
        engine: AuthenticationEngine,
        validator: Arc<StubValidator>,
        sessions: Arc<MemorySessionStore>,
        hooks: Arc<CountingHooks>,
    }

    fn base_config() -> CasConfig {
        CasConfig::new("https://cas.example.com/cas", LOGIN, "app.example.com")
    }

    fn harness(config: CasConfig, validator: Arc<StubValidator>) -> Harness {
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(600)));
        let hooks = Arc::new(CountingHooks::default());
        let engine = AuthenticationEngine::new(
            Arc::new(Arc::new(config)),
            validator.clone(),
            sessions.clone(),
        )
        .with_hooks(hooks.clone());

        Harness {
            engine,
            validator,
            sessions,
            hooks,
        }
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri).header("host", "app.example.com");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn run(engine: &AuthenticationEngine, request: Request<Body>) -> Result<Response, CasError> {
        engine
            .handle(request, |request| async move {
                let user = request
                    .extensions()
                    .get::<Assertion>()
                    .map(|a| a.principal().name().to_string())
                    .unwrap_or_else(|| "anonymous".to_string());
                (StatusCode::OK, user).into_response()
            })
            .await
    }

    async fn body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn seed_session(sessions: &MemorySessionStore, id: &str, principal: &str) {
        let mut session = Session::new();
        session
            .insert(
                CONST_CAS_ASSERTION,
                &Assertion::new(AttributePrincipal::new(principal)),
            )
            .unwrap();
        sessions.save(id, &session).await.unwrap();
    }

    #[test]
    fn classification_order() {
        let alice = Assertion::new(AttributePrincipal::new("alice"));
        let nobody = Assertion::new(AttributePrincipal::new(""));

        assert_eq!(
            RequestState::classify(None, None, false),
            RequestState::NoAssertionNoTicket
        );
        assert_eq!(
            RequestState::classify(None, None, true),
            RequestState::GatewayedNoOp
        );
        assert_eq!(
            RequestState::classify(Some(alice.clone()), Some("ST-1".into()), false),
            RequestState::AssertionPresent(alice)
        );
        assert_eq!(
            RequestState::classify(Some(nobody.clone()), Some("ST-1".into()), false),
            RequestState::TicketPresent("ST-1".into())
        );
        assert_eq!(
            RequestState::classify(Some(nobody), None, false),
            RequestState::GatewayedNoOp
        );
    }

    #[tokio::test]
    async fn unauthenticated_request_is_sent_to_login() {
        let h = harness(base_config(), StubValidator::accepting("alice"));

        let resp = run(&h.engine, get("/app?foo=bar", None)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            location(&resp),
            "https://cas.example.com/cas/login?service=http%3A%2F%2Fapp.example.com%2Fapp%3Ffoo%3Dbar"
        );
        assert!(h.validator.calls().is_empty());
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn renew_flag_is_forwarded_to_login() {
        let mut config = base_config();
        config.renew = true;
        let h = harness(config, StubValidator::accepting("alice"));

        let resp = run(&h.engine, get("/app", None)).await.unwrap();

        assert!(location(&resp).ends_with("&renew=true"));
    }

    #[tokio::test]
    async fn without_redirect_auth_url_request_passes_anonymously() {
        let mut config = base_config();
        config.redirect_auth_url = false;
        let h = harness(config, StubValidator::accepting("alice"));

        let resp = run(&h.engine, get("/app", None)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, "anonymous");
    }

    #[tokio::test]
    async fn session_assertion_passes_without_validation() {
        let h = harness(base_config(), StubValidator::accepting("bob"));
        seed_session(&h.sessions, "sid-1", "alice").await;

        let resp = run(
            &h.engine,
            get("/app?ticket=ST-ignored", Some("CASCLIENTSESSION=sid-1")),
        )
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, "alice");
        assert!(h.validator.calls().is_empty());
        assert_eq!(h.hooks.successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn valid_ticket_is_stored_and_redirected_without_ticket() {
        let h = harness(base_config(), StubValidator::accepting("alice"));

        let resp = run(
            &h.engine,
            get("/app?foo=bar&ticket=ST-1", Some("theme=dark")),
        )
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "http://app.example.com/app?foo=bar");
        assert_eq!(
            h.validator.calls(),
            vec![(
                "https://cas.example.com/cas".to_string(),
                "ST-1".to_string(),
                "http://app.example.com/app?foo=bar".to_string(),
            )]
        );

        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        let sid = cookie
            .strip_prefix("CASCLIENTSESSION=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let stored = h.sessions.load(sid).await.unwrap().unwrap();
        let assertion: Assertion = stored.get(CONST_CAS_ASSERTION).unwrap();
        assert_eq!(assertion.principal().name(), "alice");
        assert_eq!(h.hooks.successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_hook_sees_assertion_on_both_paths() {
        let h = harness(base_config(), StubValidator::accepting("alice"));

        let resp = run(&h.engine, get("/app?ticket=ST-1", Some("theme=dark")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        let sid = cookie
            .strip_prefix("CASCLIENTSESSION=")
            .and_then(|rest| rest.split(';').next())
            .unwrap()
            .to_string();

        let resp = run(&h.engine, get("/app", Some(&format!("CASCLIENTSESSION={sid}"))))
            .await
            .unwrap();
        assert_eq!(body(resp).await, "alice");

        assert_eq!(*h.hooks.saw_assertion.lock().unwrap(), vec![true, true]);
    }

    #[tokio::test]
    async fn valid_ticket_without_redirect_continues_authenticated() {
        let mut config = base_config();
        config.redirect_after_validation = false;
        config.use_session = false;
        let h = harness(config, StubValidator::accepting("alice"));

        let resp = run(&h.engine, get("/app?ticket=ST-1", Some("a=b")))
            .await
            .unwrap();

        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, "alice");
        assert_eq!(h.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn rejected_ticket_continues_unauthenticated() {
        let h = harness(base_config(), StubValidator::rejecting());

        let resp = run(&h.engine, get("/app?ticket=ST-bad", Some("a=b")))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, "anonymous");
        assert_eq!(h.hooks.failures.load(Ordering::SeqCst), 1);
        assert_eq!(h.hooks.successes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_ticket_aborts_when_configured() {
        let mut config = base_config();
        config.exception_on_validation_failure = true;
        let h = harness(config, StubValidator::rejecting());

        let err = run(&h.engine, get("/app?ticket=ST-bad", Some("a=b")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CasError::TicketValidation(TicketValidationError::Rejected { .. })
        ));
        assert_eq!(h.hooks.failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ticket_without_cookies_is_treated_as_absent() {
        let h = harness(base_config(), StubValidator::accepting("alice"));

        let resp = run(&h.engine, get("/app?ticket=ST-1", None)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            location(&resp),
            "https://cas.example.com/cas/login?service=http%3A%2F%2Fapp.example.com%2Fapp"
        );
        assert!(h.validator.calls().is_empty());
    }

    #[tokio::test]
    async fn proxy_receptor_short_circuits_validation() {
        let mut config = base_config();
        config.proxy_receptor_url = Some("/proxy/receptor".into());
        let h = harness(config, StubValidator::accepting("alice"));

        let resp = run(
            &h.engine,
            get(
                "/app/proxy/receptor?pgtIou=PGTIOU-1&pgtId=PGT-1&ticket=ST-1",
                Some("a=b"),
            ),
        )
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body(resp).await.contains("casClient:proxySuccess"));
        assert!(h.validator.calls().is_empty());
    }

    #[tokio::test]
    async fn gateway_redirects_once_then_lets_through() {
        let mut config = base_config();
        config.gateway = true;
        let h = harness(config, StubValidator::accepting("alice"));

        let first = run(&h.engine, get("/app", None)).await.unwrap();
        assert_eq!(first.status(), StatusCode::FOUND);
        assert!(location(&first).ends_with("&gateway=true"));
        let cookie = first.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        // CAS came back without a ticket: no second redirect
        let second = run(&h.engine, get("/app", Some(&cookie))).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body(second).await, "anonymous");

        // marker consumed: the next visit is gatewayed again
        let third = run(&h.engine, get("/app", Some(&cookie))).await.unwrap();
        assert_eq!(third.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn missing_configuration_fails_open() {
        let validator = StubValidator::accepting("alice");
        let engine = AuthenticationEngine::new(
            Arc::new(BrokenConfig),
            validator.clone(),
            Arc::new(MemorySessionStore::new(Duration::from_secs(60))),
        );

        let resp = run(&engine, get("/app?ticket=ST-1", Some("a=b"))).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, "anonymous");
        assert!(validator.calls().is_empty());
    }
}
