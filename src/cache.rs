use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use crate::discogs::LookupResponse;
use crate::metrics::{LOOKUP_CACHE_HITS, LOOKUP_CACHE_MISSES};

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub response: LookupResponse,
    pub created_at: Instant,
}

// Create a cache key (hash of the trimmed catalog number). Case is kept because
// results echo the query back when Discogs omits the catalog number
pub fn make_cache_key(catno: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(catno.trim());
    format!("{:x}", hasher.finalize())
}

// Catalog lookups are stable, so successful answers are reused for `ttl`
pub struct LookupCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl LookupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, catno: &str) -> Option<LookupResponse> {
        let key = make_cache_key(catno);
        if let Some(entry) = self.entries.get(&key) {
            if entry.created_at.elapsed() < self.ttl {
                LOOKUP_CACHE_HITS.inc();
                return Some(entry.response.clone());
            }
        }
        LOOKUP_CACHE_MISSES.inc();
        // drop a stale entry so the map does not keep it forever
        self.entries
            .remove_if(&key, |_, entry| entry.created_at.elapsed() >= self.ttl);
        None
    }

    pub fn insert(&self, catno: &str, response: LookupResponse) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(
            make_cache_key(catno),
            CacheEntry {
                response,
                created_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(total: u64) -> LookupResponse {
        LookupResponse {
            success: true,
            results: Vec::new(),
            total,
        }
    }

    #[test]
    fn key_ignores_padding_but_not_case() {
        assert_eq!(make_cache_key(" BLP 1577 "), make_cache_key("BLP 1577"));
        assert_ne!(make_cache_key("BLP 1577"), make_cache_key("blp 1577"));
        assert_ne!(make_cache_key("BLP 1577"), make_cache_key("BLP 1578"));
    }

    #[test]
    fn returns_fresh_entries() {
        let cache = LookupCache::new(Duration::from_secs(60));
        assert!(cache.get("ST-123").is_none());
        cache.insert("ST-123", response(7));
        assert_eq!(cache.get(" ST-123 ").map(|r| r.total), Some(7));
        assert!(cache.get("st-123").is_none());
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = LookupCache::new(Duration::ZERO);
        cache.insert("ST-123", response(1));
        assert!(cache.is_empty());
        assert!(cache.get("ST-123").is_none());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = LookupCache::new(Duration::from_millis(1));
        cache.insert("ST-123", response(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("ST-123").is_none());
        assert_eq!(cache.len(), 0);
    }
}
