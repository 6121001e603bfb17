//! CAS (Central Authentication Service) client for axum.
//!
//! The `middleware::cas` layer sends unauthenticated browsers to the CAS
//! login page, redeems returning service tickets against the CAS server and
//! keeps the resulting `Assertion` in a server-side session. Handlers read it
//! through the `CasUser` extractor.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
