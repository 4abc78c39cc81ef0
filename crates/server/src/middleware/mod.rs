//! HTTP middleware.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span, echoed in the response)
//! 4. CORS
//! 5. Rate limiting on auth and order submission routes (governor)
//!
//! Authentication is not a layer: handlers take a [`RequireAuth`] or
//! [`RequireAdmin`] extractor.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{AuthRejection, BearerToken, RequireAdmin, RequireAuth};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::{make_request_span, request_id_middleware};
