//! Authentication module for MiniChat server
//!
//! Token issuance and verification, request admission, password hashing
//! and the signup / login flows built on them.

pub mod extractor;
pub mod handlers;
pub mod middleware;
pub mod password;
mod rate_limit;
mod service;
mod token;

pub use extractor::Authenticated;
pub use middleware::AdmissionControl;
pub use rate_limit::{Admission, RateLimiter, RateLimitConfig};
pub use service::{AuthService, SessionTokens};
pub use token::{Claims, TokenKind, TokenSecrets, TokenService};
