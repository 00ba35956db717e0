//! Small invalidate-on-write cache helper shared by the three catalog
//! services. Each service caches `findAll` results and per-id/per-family
//! lookups; every write path invalidates the pertinent keys rather than the
//! whole cache, matching spec §4.2's "each service maintains an in-process
//! cache; write paths invalidate the pertinent keys".

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

/// A tiny read-through cache: callers populate it explicitly (`put`) after a
/// cache miss and invalidate explicitly on write. No TTL or eviction policy —
/// the catalog is the system of record and the cache only exists to avoid
/// recomputing `findAll`/`findByFamilyId` scans on the hot read path.
pub struct InvalidatingCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for InvalidatingCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }
}

impl<K, V> InvalidatingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().expect("cache lock poisoned").get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        self.entries.write().expect("cache lock poisoned").insert(key, value);
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.write().expect("cache lock poisoned").remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }
}

/// Well-known cache key families used across `IntentCatalog`/`NodeCatalog`/
/// `WorkflowCatalog`, so invalidation call sites read as intent rather than
/// bare strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    All,
    ById(uuid::Uuid),
    ByFamilyIdLatest(uuid::Uuid),
    ByIntent(uuid::Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let cache: InvalidatingCache<CacheKey, u32> = InvalidatingCache::default();
        cache.put(CacheKey::All, 7);
        assert_eq!(cache.get(&CacheKey::All), Some(7));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache: InvalidatingCache<CacheKey, u32> = InvalidatingCache::default();
        cache.put(CacheKey::All, 7);
        cache.invalidate(&CacheKey::All);
        assert_eq!(cache.get(&CacheKey::All), None);
    }
}
