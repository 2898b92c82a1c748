//! Bounded per-key TTL cache for read views.
//!
//! Holds display data only. Balance and tier values are never cached here;
//! they are read through the store so a request always sees the transaction
//! it just wrote.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// A mutex-guarded map with a fixed TTL and a max-entries bound. When full,
/// inserting a new key evicts the oldest entry.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<BTreeMap<K, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: Ord + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().expect("lock cache entries");
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().expect("lock cache entries");
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, CacheEntry {
            value,
            inserted_at: Instant::now(),
        });
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().expect("lock cache entries").remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().expect("lock cache entries").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock cache entries").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::TtlCache;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(30), 8);
        cache.insert("key".to_string(), 1_u32);
        assert_eq!(cache.get(&"key".to_string()), Some(1));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"key".to_string()), None);
    }

    #[test]
    fn bound_evicts_oldest_entry() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), 1_u32);
        cache.insert("b".to_string(), 2_u32);
        cache.insert("c".to_string(), 3_u32);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn invalidate_removes_single_key() {
        let cache = TtlCache::new(Duration::from_secs(60), 8);
        cache.insert("a".to_string(), 1_u32);
        cache.insert("b".to_string(), 2_u32);
        cache.invalidate(&"a".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
    }
}
