//! Cache client interface used by the session layer.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Kept independent from the session and CAS error types; the session layer
/// decides how a backend failure is surfaced.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// Small string-based cache interface.
///
/// Sessions only need GETEX, SET with expiry and DEL.
/// Implementations must be cheap to clone (typically `Arc<...>` inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Backend name for logging.
    fn backend_name(&self) -> &'static str;

    // Get a value and reset its TTL in the same round trip (sliding expiry).
    async fn get_string_with_ttl(&self, key: &str, ttl: Duration) -> CacheResult<Option<String>>;

    // Set (or overwrite) a value with TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    // Delete a key. Returns number of deleted keys.
    async fn del(&self, key: &str) -> CacheResult<u64>;
}
