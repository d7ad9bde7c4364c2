//! In-process string cache with per-key expiry, used for pending SMS codes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// String-keyed store with per-key TTL.
///
/// `take_if` compares and removes under one lock, so a code can be
/// redeemed at most once even when two verification requests race on the
/// same key, while a failed comparison leaves the entry untouched.
#[derive(Default)]
pub struct CodeCache {
    inner: Mutex<HashMap<String, Entry>>,
}

impl CodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, value: &str, ttl: Duration) {
        let mut map = self.inner.lock();
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut map = self.inner.lock();
        match map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Compare-and-delete: removes and returns the value only when `pred`
    /// accepts it. Read, comparison and delete happen under one lock, so
    /// of two concurrent matching takers only the first succeeds, and a
    /// rejected value stays cached for another attempt.
    pub fn take_if<F>(&self, key: &str, pred: F) -> Option<String>
    where
        F: FnOnce(&str) -> bool,
    {
        let mut map = self.inner.lock();
        let entry = map.get(key)?;
        if entry.expires_at <= Instant::now() {
            map.remove(key);
            return None;
        }
        if !pred(&entry.value) {
            return None;
        }
        map.remove(key).map(|entry| entry.value)
    }

    pub fn forget(&self, key: &str) {
        self.inner.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let cache = CodeCache::new();
        cache.put("sms_code_79123456789", "4217", Duration::from_secs(300));
        assert_eq!(
            cache.get("sms_code_79123456789").as_deref(),
            Some("4217")
        );
    }

    #[test]
    fn take_if_consumes_exactly_once_on_match() {
        let cache = CodeCache::new();
        cache.put("k", "1234", Duration::from_secs(300));
        assert_eq!(cache.take_if("k", |v| v == "1234").as_deref(), Some("1234"));
        assert_eq!(cache.take_if("k", |v| v == "1234"), None);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn take_if_preserves_value_on_mismatch() {
        let cache = CodeCache::new();
        cache.put("k", "1234", Duration::from_secs(300));
        assert_eq!(cache.take_if("k", |v| v == "9999"), None);
        assert_eq!(cache.get("k").as_deref(), Some("1234"));
        assert_eq!(cache.take_if("k", |v| v == "1234").as_deref(), Some("1234"));
    }

    #[test]
    fn put_overwrites_pending_value() {
        let cache = CodeCache::new();
        cache.put("k", "1111", Duration::from_secs(300));
        cache.put("k", "2222", Duration::from_secs(300));
        assert_eq!(cache.take_if("k", |_| true).as_deref(), Some("2222"));
    }

    #[test]
    fn expired_entries_behave_as_absent() {
        let cache = CodeCache::new();
        cache.put("k", "1234", Duration::from_secs(0));
        assert_eq!(cache.get("k"), None);
        cache.put("k", "1234", Duration::from_secs(0));
        assert_eq!(cache.take_if("k", |_| true), None);
    }

    #[test]
    fn forget_removes_the_key() {
        let cache = CodeCache::new();
        cache.put("k", "1234", Duration::from_secs(300));
        cache.forget("k");
        assert_eq!(cache.get("k"), None);
    }
}
