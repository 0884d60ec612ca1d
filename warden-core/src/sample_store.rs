//! Bounded, TTL-bearing recent-history lists keyed by endpoint.
//!
//! This is the only shared mutable state the analysis subsystems touch.
//! `push_with_cap` is a single atomic operation (append, trim to the
//! most-recent cap, refresh TTL) so concurrent writers never grow a list
//! past its cap and never lose the most-recent items. Keys silently expire
//! after their TTL; consumers must treat a missing key as "no data".

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct SampleList {
    items: VecDeque<String>,
    expires_at: Instant,
}

/// In-process bounded sample store. Cheap to clone; all clones share state.
#[derive(Debug, Clone, Default)]
pub struct BoundedSampleStore {
    inner: Arc<Mutex<HashMap<String, SampleList>>>,
}

impl BoundedSampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `items` to the list at `key`, trim to the most recent
    /// `max_count` entries, and refresh the key's TTL. One critical section.
    pub fn push_with_cap(&self, key: &str, items: Vec<String>, max_count: usize, ttl: Duration) {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map.entry(key.to_string()).or_insert_with(|| SampleList {
            items: VecDeque::new(),
            expires_at: now + ttl,
        });
        if entry.expires_at <= now {
            entry.items.clear();
        }
        entry.items.extend(items);
        while entry.items.len() > max_count {
            entry.items.pop_front();
        }
        entry.expires_at = now + ttl;
    }

    /// Contents of `key` over `[start, end]` inclusive; negative indices count
    /// from the end (`end = -1` reads through the last item). Missing or
    /// expired keys read as empty.
    pub fn range_read(&self, key: &str, start: i64, end: i64) -> Vec<String> {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let expired = matches!(map.get(key), Some(list) if list.expires_at <= now);
        if expired {
            map.remove(key);
            return Vec::new();
        }
        let Some(list) = map.get(key) else {
            return Vec::new();
        };
        let len = list.items.len() as i64;
        let s = if start < 0 { (len + start).max(0) } else { start.min(len) };
        let e = if end < 0 { len + end + 1 } else { (end + 1).min(len) };
        if e <= s {
            return Vec::new();
        }
        list.items
            .iter()
            .skip(s as usize)
            .take((e - s) as usize)
            .cloned()
            .collect()
    }

    /// Current length of the list at `key` (0 for missing/expired keys).
    pub fn len(&self, key: &str) -> usize {
        let now = Instant::now();
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(key) {
            Some(list) if list.expires_at > now => list.items.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_most_recent_in_push_order() {
        let store = BoundedSampleStore::new();
        for i in 0..25 {
            store.push_with_cap("k", vec![format!("item-{i}")], 10, Duration::from_secs(60));
        }
        let items = store.range_read("k", 0, -1);
        assert_eq!(items.len(), 10);
        let expected: Vec<String> = (15..25).map(|i| format!("item-{i}")).collect();
        assert_eq!(items, expected);
    }

    #[test]
    fn batch_push_trims_in_one_operation() {
        let store = BoundedSampleStore::new();
        let batch: Vec<String> = (0..30).map(|i| format!("b-{i}")).collect();
        store.push_with_cap("k", batch, 8, Duration::from_secs(60));
        let items = store.range_read("k", 0, -1);
        assert_eq!(items.first().map(String::as_str), Some("b-22"));
        assert_eq!(items.last().map(String::as_str), Some("b-29"));
    }

    #[test]
    fn concurrent_pushers_never_exceed_cap() {
        let store = BoundedSampleStore::new();
        let mut handles = Vec::new();
        for t in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    store.push_with_cap(
                        "shared",
                        vec![format!("{t}-{i}")],
                        50,
                        Duration::from_secs(60),
                    );
                    assert!(store.len("shared") <= 50);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len("shared"), 50);
    }

    #[test]
    fn expired_key_reads_as_missing() {
        let store = BoundedSampleStore::new();
        store.push_with_cap("k", vec!["x".to_string()], 10, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        assert!(store.range_read("k", 0, -1).is_empty());
        assert_eq!(store.len("k"), 0);
    }

    #[test]
    fn push_refreshes_ttl() {
        let store = BoundedSampleStore::new();
        store.push_with_cap("k", vec!["a".to_string()], 10, Duration::from_millis(40));
        std::thread::sleep(Duration::from_millis(25));
        store.push_with_cap("k", vec!["b".to_string()], 10, Duration::from_millis(40));
        std::thread::sleep(Duration::from_millis(25));
        // First TTL would have lapsed by now; the second push refreshed it.
        assert_eq!(store.range_read("k", 0, -1), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn range_bounds() {
        let store = BoundedSampleStore::new();
        let items: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        store.push_with_cap("k", items, 10, Duration::from_secs(60));
        assert_eq!(store.range_read("k", 1, 3), vec!["1", "2", "3"]);
        assert_eq!(store.range_read("k", -2, -1), vec!["3", "4"]);
        assert!(store.range_read("k", 4, 2).is_empty());
        assert!(store.range_read("missing", 0, -1).is_empty());
    }
}
