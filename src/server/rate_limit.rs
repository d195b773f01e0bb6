//! Per-client token bucket rate limiting.
//!
//! Each (route class, client) pair gets its own bucket. Buckets live in a
//! bounded moka cache and are evicted after ten idle minutes, so memory
//! stays flat no matter how many distinct clients show up.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method};
use parking_lot::Mutex;
use serde::Deserialize;

const BUCKET_IDLE_TTL: Duration = Duration::from_secs(600);

/// Routes sharing a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    UploadSingle,
    UploadMultiple,
    Search,
    /// Store creation and deletion.
    StoreWrite,
    /// Listing, health and metrics.
    General,
}

impl RouteClass {
    /// Class for a matched route template. `None` means unlimited.
    pub fn classify(method: &Method, route: &str) -> Option<Self> {
        match route {
            "/" => None,
            "/api/upload/single" => Some(RouteClass::UploadSingle),
            "/api/upload/multiple" => Some(RouteClass::UploadMultiple),
            "/api/search" => Some(RouteClass::Search),
            "/api/stores" if method == Method::POST => Some(RouteClass::StoreWrite),
            "/api/stores/{name}" => Some(RouteClass::StoreWrite),
            _ => Some(RouteClass::General),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RouteClass::UploadSingle => "upload_single",
            RouteClass::UploadMultiple => "upload_multiple",
            RouteClass::Search => "search",
            RouteClass::StoreWrite => "store_write",
            RouteClass::General => "general",
        }
    }
}

/// Requests per minute per client. Zero disables the limit for that class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub upload_single_per_minute: u32,
    pub upload_multiple_per_minute: u32,
    pub search_per_minute: u32,
    pub store_write_per_minute: u32,
    pub general_per_minute: u32,
    /// Key clients by the first `x-forwarded-for` entry instead of the
    /// peer address. Only enable behind a proxy that sets the header.
    pub trust_forwarded_for: bool,
    /// Upper bound on tracked (class, client) buckets.
    pub max_tracked_clients: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            upload_single_per_minute: 10,
            upload_multiple_per_minute: 5,
            search_per_minute: 100,
            store_write_per_minute: 20,
            general_per_minute: 100,
            trust_forwarded_for: false,
            max_tracked_clients: 10_000,
        }
    }
}

impl RateLimitConfig {
    pub fn per_minute(&self, class: RouteClass) -> u32 {
        match class {
            RouteClass::UploadSingle => self.upload_single_per_minute,
            RouteClass::UploadMultiple => self.upload_multiple_per_minute,
            RouteClass::Search => self.search_per_minute,
            RouteClass::StoreWrite => self.store_write_per_minute,
            RouteClass::General => self.general_per_minute,
        }
    }
}

/// A token bucket rate limiter.
///
/// Holds up to `capacity` tokens and refills continuously at `capacity`
/// tokens per minute. Each [`try_acquire`](TokenBucket::try_acquire) call
/// consumes one token.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    /// Tokens per second.
    rate: f64,
}

impl TokenBucket {
    /// Full bucket allowing `per_minute` requests per minute.
    pub fn per_minute(per_minute: u32) -> Self {
        Self::per_minute_at(per_minute, Instant::now())
    }

    pub fn per_minute_at(per_minute: u32, now: Instant) -> Self {
        let capacity = f64::from(per_minute.max(1));
        Self {
            tokens: capacity,
            last_refill: now,
            capacity,
            rate: capacity / 60.0,
        }
    }

    /// Take one token, or return how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.rate))
        }
    }
}

/// Buckets for every (route class, client) pair seen recently.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: moka::sync::Cache<(RouteClass, String), Arc<Mutex<TokenBucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let buckets = moka::sync::Cache::builder()
            .max_capacity(config.max_tracked_clients)
            .time_to_idle(BUCKET_IDLE_TTL)
            .build();
        Self { config, buckets }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request. `Err` carries the suggested wait.
    pub fn check(&self, class: RouteClass, client: &str) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }
        let per_minute = self.config.per_minute(class);
        if per_minute == 0 {
            return Ok(());
        }
        let bucket = self
            .buckets
            .get_with((class, client.to_string()), || {
                Arc::new(Mutex::new(TokenBucket::per_minute(per_minute)))
            });
        let mut bucket = bucket.lock();
        bucket.try_acquire()
    }

    /// Identify the client behind a request.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.config.trust_forwarded_for {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(client) = forwarded {
                return client.to_string();
            }
        }
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bucket_allows_burst_then_rejects() {
        let start = Instant::now();
        let mut bucket = TokenBucket::per_minute_at(3, start);
        for _ in 0..3 {
            assert!(bucket.try_acquire_at(start).is_ok());
        }
        let wait = bucket.try_acquire_at(start).unwrap_err();
        assert!(wait > Duration::from_secs(19) && wait < Duration::from_secs(21));
    }

    #[test]
    fn bucket_refills_over_time() {
        let start = Instant::now();
        let mut bucket = TokenBucket::per_minute_at(60, start);
        for _ in 0..60 {
            bucket.try_acquire_at(start).unwrap();
        }
        assert!(bucket.try_acquire_at(start).is_err());
        assert!(bucket.try_acquire_at(start + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn classify_routes() {
        assert_eq!(RouteClass::classify(&Method::GET, "/"), None);
        assert_eq!(
            RouteClass::classify(&Method::POST, "/api/upload/single"),
            Some(RouteClass::UploadSingle)
        );
        assert_eq!(
            RouteClass::classify(&Method::POST, "/api/stores"),
            Some(RouteClass::StoreWrite)
        );
        assert_eq!(
            RouteClass::classify(&Method::GET, "/api/stores"),
            Some(RouteClass::General)
        );
        assert_eq!(
            RouteClass::classify(&Method::DELETE, "/api/stores/{name}"),
            Some(RouteClass::StoreWrite)
        );
        assert_eq!(
            RouteClass::classify(&Method::GET, "/metrics"),
            Some(RouteClass::General)
        );
    }

    #[test]
    fn limiter_is_per_client_and_class() {
        let limiter = RateLimiter::new(RateLimitConfig {
            upload_multiple_per_minute: 1,
            ..Default::default()
        });
        assert!(limiter.check(RouteClass::UploadMultiple, "a").is_ok());
        assert!(limiter.check(RouteClass::UploadMultiple, "a").is_err());
        assert!(limiter.check(RouteClass::UploadMultiple, "b").is_ok());
        assert!(limiter.check(RouteClass::Search, "a").is_ok());
    }

    #[test]
    fn disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            upload_multiple_per_minute: 1,
            ..Default::default()
        });
        for _ in 0..5 {
            assert!(limiter.check(RouteClass::UploadMultiple, "a").is_ok());
        }
    }

    #[test]
    fn client_key_sources() {
        let peer: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));

        let limiter = RateLimiter::new(RateLimitConfig::default());
        assert_eq!(limiter.client_key(&headers, Some(peer)), "10.0.0.7");
        assert_eq!(limiter.client_key(&headers, None), "unknown");

        let trusting = RateLimiter::new(RateLimitConfig {
            trust_forwarded_for: true,
            ..Default::default()
        });
        assert_eq!(trusting.client_key(&headers, Some(peer)), "203.0.113.9");
    }
}
