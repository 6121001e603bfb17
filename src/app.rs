/*
 * Responsibility
 * - Load Config → build services (validator, sessions) → assemble the Router
 * - Apply middleware (CAS on /api/v1, HTTP plumbing everywhere)
 * - Start with axum::serve()
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::{health::health, proxy_receptor::proxy_receptor};
use crate::config::Config;
use crate::middleware;
use crate::services::cas::{AuthenticationEngine, Cas20ProxyTicketValidator, ProxyGrantingTicketStorage};
use crate::services::session::{CacheSessionStore, MemorySessionStore, SessionCookie, SessionStore};
use crate::state::AppState;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,cas_client=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting CAS client in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(cas = ?config.cas, "CAS configuration");

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build process-level services and inject them into the shared state.
pub async fn build_state(config: &Config) -> Result<AppState> {
    // The validator records PGTs where the receptor route reads them.
    let proxy_tickets = Arc::clone(&config.cas.proxy_granting_ticket_storage);

    let mut validator = Cas20ProxyTicketValidator::new(config.validation_timeout)?
        .renew(config.cas.renew)
        .accept_any_proxy(config.accept_any_proxy);
    if let Some(url) = &config.proxy_callback_url {
        validator = validator.proxy_callback(url.clone(), Arc::clone(&proxy_tickets));
    }

    let (sessions, memory_sessions): (Arc<dyn SessionStore>, Option<Arc<MemorySessionStore>>) =
        match &config.valkey_url {
            Some(url) => {
                let store = CacheSessionStore::connect(url, config.session_ttl).await?;
                (Arc::new(store) as Arc<dyn SessionStore>, None)
            }
            None => {
                tracing::warn!("VALKEY_URL not set; sessions are kept in process memory");
                let store = Arc::new(MemorySessionStore::new(config.session_ttl));
                (store.clone() as Arc<dyn SessionStore>, Some(store))
            }
        };
    tracing::info!(backend = sessions.backend_name(), "session store ready");

    spawn_housekeeping(memory_sessions, Arc::clone(&proxy_tickets));

    let engine = AuthenticationEngine::new(
        Arc::new(Arc::new(config.cas.clone())),
        Arc::new(validator),
        sessions,
    )
    .with_session_cookie(SessionCookie::new(config.session_cookie_name.clone()));

    Ok(AppState::new(Arc::new(engine), proxy_tickets))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(state.clone()));

    if let Some(path) = config.cas.proxy_receptor_path() {
        router = router.route(path, get(proxy_receptor));
    }

    middleware::http::apply(router.with_state(state), config.request_timeout)
}

/// Periodically drop expired proxy-granting tickets and idle in-memory sessions.
fn spawn_housekeeping(
    sessions: Option<Arc<MemorySessionStore>>,
    proxy_tickets: Arc<dyn ProxyGrantingTicketStorage>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            interval.tick().await;
            proxy_tickets.cleanup();
            if let Some(sessions) = &sessions {
                let purged = sessions.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "expired sessions removed");
                }
            }
        }
    });
}
