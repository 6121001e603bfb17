pub mod fallback;
pub mod health;
pub mod me;
pub mod proxy_receptor;
