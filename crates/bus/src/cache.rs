//! Shared value cache with optional expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

/// JSON value cache keyed by string, mirroring the cache half of the
/// coordination substrate (`reference_data`, `model_update`).
#[derive(Default)]
pub struct ValueCache {
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_entry(key, value, None);
    }

    pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        self.set_entry(key, value, Some(Instant::now() + ttl));
    }

    fn set_entry<T: Serialize>(&self, key: &str, value: &T, expires_at: Option<Instant>) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize cache value — dropped");
                return;
            }
        };
        let mut map = self.inner.lock().expect("cache lock poisoned");
        map.insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Fetch and decode a value; expired entries are evicted on read.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut map = self.inner.lock().expect("cache lock poisoned");
        let entry = map.get(key)?;
        if let Some(expires_at) = entry.expires_at {
            if expires_at <= Instant::now() {
                map.remove(key);
                return None;
            }
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "cache value failed to decode");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.inner.lock().expect("cache lock poisoned").remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let cache = ValueCache::new();
        cache.set("answer", &42u32);
        assert_eq!(cache.get::<u32>("answer"), Some(42));
        assert_eq!(cache.get::<u32>("missing"), None);
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = ValueCache::new();
        cache.set_with_ttl("gone", &1u8, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get::<u8>("gone"), None);
        assert!(!cache.contains("gone"));
    }

    #[test]
    fn overwrite_replaces_value() {
        let cache = ValueCache::new();
        cache.set("k", &"old");
        cache.set("k", &"new");
        assert_eq!(cache.get::<String>("k").as_deref(), Some("new"));
    }
}
