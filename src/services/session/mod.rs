/*
 * Responsibility
 * - Session storage for the CAS layer (key/value store keyed by an opaque id)
 * - Per-request session handle (lazy creation, dirty tracking, Set-Cookie)
 */
pub mod cache_store;
pub mod handle;
pub mod memory;
pub mod store;

pub use cache_store::CacheSessionStore;
pub use handle::{RequestSession, SessionCookie};
pub use memory::MemorySessionStore;
pub use store::{Session, SessionError, SessionResult, SessionStore};
