/*!
 * Authenticated CAS user extractor
 *
 * Responsibility:
 * - Hand the Assertion placed in request extensions by the CAS middleware
 *   to handlers
 *
 * Public API:
 * - CasUser
 */

mod core;

pub use core::CasUser;
