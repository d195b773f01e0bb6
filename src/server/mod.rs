//! HTTP server for filesearchd.
//!
//! - `config`: TOML configuration and secrets
//! - `routes`: route table and middleware stack
//! - `handlers`: request handlers
//! - `middleware`: request ids, security headers, metrics, timeouts, rate limits
//! - `error`: JSON error responses

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use rate_limit::{RateLimitConfig, RateLimiter, RouteClass, TokenBucket};
pub use routes::router;
pub use state::AppState;
