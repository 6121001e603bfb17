/*
 * Responsibility
 * - Public entry points of v1 (routes() and the pieces app.rs mounts)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
