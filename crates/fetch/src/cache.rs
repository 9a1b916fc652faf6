use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::client::FetchResponse;

/// In-memory page cache with TTL-based expiration.
///
/// License resolution touches the same HuggingFace repo page from several
/// strategies in one run; the cache keeps that to one fetch.
pub struct UrlCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

struct CacheEntry {
    response: FetchResponse,
    inserted_at: Instant,
}

impl UrlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Get a cached response if it exists and hasn't expired.
    pub fn get(&self, url: &str) -> Option<FetchResponse> {
        if let Some(entry) = self.entries.get(url) {
            if entry.inserted_at.elapsed() < self.ttl {
                metrics::counter!("catalog.fetch.cache.hit").increment(1);
                return Some(entry.response.clone());
            }
        }
        metrics::counter!("catalog.fetch.cache.miss").increment(1);
        None
    }

    /// Insert a response, evicting expired entries.
    pub fn insert(&mut self, url: String, response: FetchResponse) {
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);

        self.entries.insert(
            url,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_miss() {
        let mut cache = UrlCache::new(Duration::from_secs(3600));
        assert!(cache.get("https://huggingface.co/org/repo").is_none());

        cache.insert(
            "https://huggingface.co/org/repo".into(),
            FetchResponse {
                status: 200,
                body: "page".into(),
            },
        );

        let hit = cache.get("https://huggingface.co/org/repo").unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, "page");
    }

    #[test]
    fn test_cache_expiry() {
        let mut cache = UrlCache::new(Duration::from_millis(1));
        cache.insert(
            "https://huggingface.co/org/repo".into(),
            FetchResponse {
                status: 200,
                body: "old".into(),
            },
        );

        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("https://huggingface.co/org/repo").is_none());
    }
}
