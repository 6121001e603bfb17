use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::services::cache::CacheError;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Session contents: a generic attribute map.
///
/// Values are stored as JSON so any backend can persist them verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    attributes: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed read. A value that does not decode as `T` reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> SessionResult<()> {
        self.attributes
            .insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.attributes.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Session backend.
///
/// Must tolerate concurrent access from overlapping requests of one browser;
/// the CAS engine adds no locking of its own.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    async fn load(&self, id: &str) -> SessionResult<Option<Session>>;

    async fn save(&self, id: &str, session: &Session) -> SessionResult<()>;

    async fn remove(&self, id: &str) -> SessionResult<()>;
}
