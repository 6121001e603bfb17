use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::services::cache::{CacheClient, ValkeyClient};
use crate::services::session::store::{Session, SessionError, SessionResult, SessionStore};

/// Session store on top of a `CacheClient` (Valkey in production).
///
/// Sessions are stored as JSON under `<prefix>:<id>`; the TTL is refreshed
/// on every load and save.
#[derive(Clone)]
pub struct CacheSessionStore<C: CacheClient> {
    cache: Arc<C>,
    // Key prefix to avoid collisions across applications sharing one Valkey
    prefix: String,
    ttl: Duration,
}

impl CacheSessionStore<ValkeyClient> {
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, SessionError> {
        let client = ValkeyClient::new(redis_url).await?;
        Ok(Self::new_with_cache(Arc::new(client), "cas:session", ttl))
    }
}

impl<C: CacheClient> CacheSessionStore<C> {
    pub fn new_with_cache(cache: Arc<C>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

#[async_trait]
impl<C: CacheClient> SessionStore for CacheSessionStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn load(&self, id: &str) -> SessionResult<Option<Session>> {
        // Every read slides the expiry, so active sessions stay alive.
        match self.cache.get_string_with_ttl(&self.key(id), self.ttl).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str, session: &Session) -> SessionResult<()> {
        let raw = serde_json::to_string(session)?;
        self.cache.set_with_ttl(&self.key(id), &raw, self.ttl).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> SessionResult<()> {
        self.cache.del(&self.key(id)).await?;
        Ok(())
    }
}
