//! In-memory TTL response cache with FIFO eviction.
//!
//! Two instances exist at runtime: a search cache in front of the upstream
//! pricing API (15 min TTL, 1000 entries) and a dashboard cache for joined
//! summaries (5 min TTL, 100 entries). Both are process-local by policy —
//! price freshness is secondary to not hammering the upstream — which means
//! horizontal scaling loses cache coherence. Known limitation, not a bug.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;

pub const SEARCH_CACHE_CAPACITY: usize = 1000;
pub const SEARCH_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
pub const DASHBOARD_CACHE_CAPACITY: usize = 100;
pub const DASHBOARD_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Time source for the cache and rate limiter. Production uses
/// [`SystemClock`]; tests substitute a manual clock to drive expiry
/// deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    payload: Value,
    inserted_at: Instant,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    // Insertion order only. Eviction is FIFO, not LRU: reads never reorder.
    order: VecDeque<String>,
}

/// Bounded TTL cache keyed by canonicalized query strings.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
            clock,
        }
    }

    /// Returns the cached payload, or `None` when the key is absent or its
    /// entry has outlived the TTL. Expired entries are dropped lazily here;
    /// there is no background sweeper.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let expired = match inner.entries.get(key) {
            Some(entry) => now.duration_since(entry.inserted_at) > self.ttl,
            None => return None,
        };

        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }

        inner.entries.get(key).map(|e| e.payload.clone())
    }

    /// Stores a payload. Re-inserting an existing key refreshes its payload
    /// and timestamp but keeps its original FIFO slot. On overflow the
    /// oldest-inserted entry is evicted.
    pub fn set(&self, key: &str, payload: Value) {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let fresh = !inner.entries.contains_key(key);
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                inserted_at: now,
            },
        );
        if fresh {
            inner.order.push_back(key.to_string());
        }

        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").entries.len()
    }
}

/// Builds an order-independent cache key: the action name plus every query
/// parameter, sorted by parameter name. Two requests with the same params in
/// a different order share one entry.
pub fn cache_key(action: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut key = String::from(action);
    for (name, value) in sorted {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(&value);
    }
    key
}


#[cfg(test)]
mod tests {
    use super::test_support::ManualClock;
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn cache_with_clock(capacity: usize, ttl: Duration) -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = ResponseCache::new(capacity, ttl, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, _clock) = cache_with_clock(10, Duration::from_secs(60));
        cache.set("k", json!({"v": 1}));
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));
    }

    #[test]
    fn test_miss_after_ttl() {
        let (cache, clock) = cache_with_clock(10, Duration::from_secs(60));
        cache.set("k", json!(1));
        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0, "expired entry should be dropped on read");
    }

    #[test]
    fn test_fifo_eviction_at_search_capacity() {
        let (cache, _clock) = cache_with_clock(SEARCH_CACHE_CAPACITY, SEARCH_CACHE_TTL);
        for i in 0..=SEARCH_CACHE_CAPACITY {
            cache.set(&format!("k{i}"), json!(i));
        }
        // 1001 distinct keys: exactly the first-inserted one is gone.
        assert_eq!(cache.get("k0"), None);
        assert_eq!(cache.get("k1"), Some(json!(1)));
        assert_eq!(cache.get(&format!("k{SEARCH_CACHE_CAPACITY}")), Some(json!(1000)));
        assert_eq!(cache.len(), SEARCH_CACHE_CAPACITY);
    }

    #[test]
    fn test_reinsert_keeps_fifo_slot() {
        let (cache, _clock) = cache_with_clock(2, Duration::from_secs(60));
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.set("a", json!(3)); // refresh, not a new slot
        cache.set("c", json!(4)); // evicts "a", still the oldest insertion
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(4)));
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let a = cache_key(
            "products",
            &[("termo", "dipirona".into()), ("raio", "10".into())],
        );
        let b = cache_key(
            "products",
            &[("raio", "10".into()), ("termo", "dipirona".into())],
        );
        assert_eq!(a, b);
        assert_eq!(a, "products|raio=10|termo=dipirona");
    }

    #[test]
    fn test_cache_key_distinguishes_actions() {
        let a = cache_key("products", &[("termo", "x".into())]);
        let b = cache_key("categories", &[("termo", "x".into())]);
        assert_ne!(a, b);
    }
}
