//! Request admission policies
//!
//! Rate limiting, IP access control, basic authentication and CORS. Each
//! policy returns a typed decision; turning a decision into an HTTP
//! response is left to the request pipeline.

pub mod access;
pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use access::{resolve_client_ip, AccessControl, AccessDecision};
pub use auth::{AuthOutcome, Authenticator};
pub use cors::{CorsOutcome, CorsPolicy};
pub use rate_limit::{retry_after_secs, RateDecision, RateLimiter};
