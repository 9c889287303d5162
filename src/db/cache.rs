//! Small TTL cache for dropdown options and slider-bound statistics.
//!
//! These come from `SELECT DISTINCT`/aggregate queries that change rarely
//! relative to page loads. Expiry is lazy: an expired entry is dropped on
//! the next read and recomputed by the caller.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    inner: RwLock<HashMap<String, (Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        {
            let guard = self.inner.read();
            if let Some((stored_at, value)) = guard.get(key) {
                if stored_at.elapsed() < self.ttl {
                    return Some(value.clone());
                }
            } else {
                return None;
            }
        }
        // Entry exists but expired; drop it under the write lock.
        self.inner.write().remove(key);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: T) {
        self.inner.write().insert(key.into(), (Instant::now(), value));
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put("tiers", vec!["A".to_string()]);
        assert_eq!(cache.get("tiers"), Some(vec!["A".to_string()]));
    }

    #[test]
    fn expired_entry_is_dropped() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.put("tiers", vec!["A".to_string()]);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get("tiers"), None);
        // a second read must not panic on the now-missing key
        assert_eq!(cache.get("tiers"), None);
    }

    #[test]
    fn clear_empties_everything() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put("a", 1);
        cache.put("b", 2);
        cache.clear();
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache: TtlCache<i64> = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("nope"), None);
    }
}
