//! Per-client, per-path request budgets.
//!
//! Each key (client IP plus request path) owns three token buckets, one per
//! window (second, minute, hour). A request spends one token from every
//! bucket; the first empty bucket rejects it with 429.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use eb_config::RateLimitConfig;

use crate::error::ApiError;

/// Keys idle this long are dropped; every bucket is full again by then.
const IDLE_TTL: Duration = Duration::from_secs(3600);

/// How often idle keys are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Budget {
    capacity: f64,
    window: Duration,
}

impl Budget {
    fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity: f64::from(capacity),
            window,
        }
    }

    fn refill_per_sec(self) -> f64 {
        self.capacity / self.window.as_secs_f64()
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    updated: Instant,
}

impl Bucket {
    fn refill(&mut self, budget: Budget, now: Instant) {
        let elapsed = now.saturating_duration_since(self.updated).as_secs_f64();
        self.tokens = (self.tokens + elapsed * budget.refill_per_sec()).min(budget.capacity);
        self.updated = now;
    }

    /// Time until one token is available.
    fn wait(&self, budget: Budget) -> Duration {
        Duration::from_secs_f64(((1.0 - self.tokens) / budget.refill_per_sec()).max(0.0))
    }
}

struct Buckets {
    buckets: [Bucket; 3],
    last_seen: Instant,
}

struct Table {
    keys: HashMap<String, Buckets>,
    last_sweep: Instant,
}

/// Token-bucket limiter over the three configured windows.
pub(crate) struct RateLimiter {
    budgets: [Budget; 3],
    table: Mutex<Table>,
}

impl RateLimiter {
    pub(crate) fn new(config: &RateLimitConfig) -> Self {
        Self {
            budgets: [
                Budget::new(config.per_second, Duration::from_secs(1)),
                Budget::new(config.per_minute, Duration::from_secs(60)),
                Budget::new(config.per_hour, Duration::from_secs(3600)),
            ],
            table: Mutex::new(Table {
                keys: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Spend one token for `key`, or return how long to wait.
    pub(crate) fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut table = self.table.lock().unwrap();
        if now.saturating_duration_since(table.last_sweep) >= SWEEP_INTERVAL {
            table
                .keys
                .retain(|_, entry| now.saturating_duration_since(entry.last_seen) < IDLE_TTL);
            table.last_sweep = now;
        }

        let budgets = self.budgets;
        let entry = table.keys.entry(key.to_owned()).or_insert_with(|| Buckets {
            buckets: budgets.map(|budget| Bucket {
                tokens: budget.capacity,
                updated: now,
            }),
            last_seen: now,
        });
        entry.last_seen = now;

        for (bucket, budget) in entry.buckets.iter_mut().zip(budgets) {
            bucket.refill(budget, now);
        }
        if let Some((bucket, budget)) = entry
            .buckets
            .iter()
            .zip(budgets)
            .find(|(bucket, _)| bucket.tokens < 1.0)
        {
            return Err(bucket.wait(budget));
        }
        for bucket in &mut entry.buckets {
            bucket.tokens -= 1.0;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.table.lock().unwrap().keys.len()
    }
}

/// Reject requests over budget for their client and path.
pub(crate) async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.ip().to_string());
    let key = format!("{client} {}", request.uri().path());

    if let Err(retry_after) = limiter.check(&key) {
        tracing::debug!(key, ?retry_after, "Rate limited");
        return ApiError::RateLimited { retry_after }.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_second: u32, per_minute: u32, per_hour: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            per_second,
            per_minute,
            per_hour,
        })
    }

    #[test]
    fn test_per_second_budget() {
        let limiter = limiter(2, 100, 1000);
        let now = Instant::now();
        assert!(limiter.check_at("a /", now).is_ok());
        assert!(limiter.check_at("a /", now).is_ok());
        assert!(limiter.check_at("a /", now).is_err());
        // Other keys have their own buckets
        assert!(limiter.check_at("b /", now).is_ok());
        assert!(limiter.check_at("a /x", now).is_ok());
        // Half a second refills one token
        assert!(limiter.check_at("a /", now + Duration::from_millis(500)).is_ok());
    }

    #[test]
    fn test_minute_budget_outlasts_second() {
        let limiter = limiter(5, 3, 1000);
        let start = Instant::now();
        for i in 0..3 {
            assert!(limiter.check_at("k", start + Duration::from_secs(i)).is_ok());
        }
        let wait = limiter.check_at("k", start + Duration::from_secs(3)).unwrap_err();
        assert!(wait > Duration::from_secs(1), "{wait:?}");
        assert!(limiter.check_at("k", start + Duration::from_secs(30)).is_ok());
    }

    #[test]
    fn test_rejected_request_spends_nothing() {
        let limiter = limiter(1, 1, 2);
        let now = Instant::now();
        assert!(limiter.check_at("k", now).is_ok());
        assert!(limiter.check_at("k", now).is_err());
        // Hour bucket still holds one token
        assert!(limiter.check_at("k", now + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_idle_keys_swept() {
        let limiter = limiter(5, 30, 1000);
        let now = Instant::now();
        limiter.check_at("old", now).unwrap();
        limiter.check_at("new", now + IDLE_TTL).unwrap();
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
