/*
 * Responsibility
 * - Domain services used by the middleware and handlers
 *   - cas: CAS authentication decision, service URLs, ticket validation
 *   - session: server-side sessions addressed by a cookie
 *   - cache: key/value backend (Valkey) behind a trait
 */
pub mod cache;
pub mod cas;
pub mod session;
