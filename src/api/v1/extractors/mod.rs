/*
 * Responsibility
 * - Extractors shared by v1 handlers (re-export)
 */
pub mod cas_user;

pub use cas_user::CasUser;
