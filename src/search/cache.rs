use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use crate::core::types::TermId;
use crate::index::posting::Posting;

/// Decoded posting lists of recently queried terms
pub struct PostingCache {
    pub cache: Option<Mutex<LruCache<TermId, Arc<Vec<Posting>>>>>,  // None when disabled
    pub size_limit: usize,
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
}

impl PostingCache {
    /// A `size_limit` of 0 disables caching; every lookup misses
    pub fn new(size_limit: usize) -> Self {
        PostingCache {
            cache: NonZeroUsize::new(size_limit).map(|cap| Mutex::new(LruCache::new(cap))),
            size_limit,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, term_id: TermId) -> Option<Arc<Vec<Posting>>> {
        let found = self.cache
            .as_ref()
            .and_then(|cache| cache.lock().get(&term_id).cloned());

        match found {
            Some(postings) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(postings)
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, term_id: TermId, postings: Arc<Vec<Posting>>) {
        if let Some(cache) = &self.cache {
            cache.lock().put(term_id, postings);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.cache.as_ref().map(|c| c.lock().len()).unwrap_or(0),
            capacity: self.size_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId;

    fn postings(doc: u32) -> Arc<Vec<Posting>> {
        Arc::new(vec![Posting::new(DocId(doc), 1.0)])
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = PostingCache::new(2);
        cache.put(TermId(1), postings(1));
        cache.put(TermId(2), postings(2));
        assert!(cache.get(TermId(1)).is_some());
        cache.put(TermId(3), postings(3));

        assert!(cache.get(TermId(2)).is_none());
        assert_eq!(cache.get(TermId(3)).unwrap()[0].doc_id, DocId(3));

        let stats = cache.stats();
        assert_eq!((stats.hit_count, stats.miss_count, stats.size), (2, 1, 2));
    }

    #[test]
    fn zero_capacity_disables() {
        let cache = PostingCache::new(0);
        cache.put(TermId(1), postings(1));
        assert!(cache.get(TermId(1)).is_none());
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }
}
