/*
 * Responsibility
 * - Public interface of the middleware layer
 *   - cas: CAS authentication for protected routes
 *   - http: request id / tracing / body limit / timeout
 *   - security_headers: response headers for routes that carry tickets
 */
pub mod cas;
pub mod http;
pub mod security_headers;
