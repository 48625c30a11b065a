//! Per-caller request quota: fixed 60-second window, 60 requests.
//!
//! Windows reset lazily on the first access past expiry — there is no
//! background timer. State is process-local, same trade-off as the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cache::Clock;

pub const WINDOW: Duration = Duration::from_secs(60);
pub const LIMIT: u32 = 60;

struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window quota keyed by caller identity (the `x-client-id` header;
/// absent callers share the "anonimo" bucket).
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
    limit: u32,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            limit,
            clock,
        }
    }

    /// Registers one request for `identity`. Returns `false` when the caller
    /// has exhausted the current window's quota; the handler maps that to a
    /// 429, distinct from any other failure.
    pub fn try_acquire(&self, identity: &str) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");

        let window = windows.entry(identity.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.limit {
            return false;
        }

        window.count += 1;
        true
    }
}
