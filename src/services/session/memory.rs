use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::services::session::store::{Session, SessionResult, SessionStore};

/// Process-local session store with idle expiry.
///
/// Expired entries are dropped lazily on access and by `purge_expired`.
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

struct Entry {
    session: Session,
    touched: Instant,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Remove expired sessions; returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| e.touched.elapsed() < ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, id: &str) -> SessionResult<Option<Session>> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) if entry.touched.elapsed() < self.ttl => {
                entry.touched = Instant::now();
                Ok(Some(entry.session.clone()))
            }
            Some(_) => {
                entries.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str, session: &Session) -> SessionResult<()> {
        self.entries.write().await.insert(
            id.to_string(),
            Entry {
                session: session.clone(),
                touched: Instant::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &str) -> SessionResult<()> {
        self.entries.write().await.remove(id);
        Ok(())
    }
}
