use crate::entity::{EntityId, EntityRecord};
use crate::AppError;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Decoded records shared read-only with every reader. A commit invalidates the ids it wrote
/// and bumps the generation, readers that opened their snapshot before that commit stop
/// publishing into the cache so a stale record cannot be reinserted.
pub struct ObjectCache {
    inner: Mutex<CacheState>,
}

struct CacheState {
    lru: LruCache<EntityId, Arc<EntityRecord>>,
    generation: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl ObjectCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        ObjectCache {
            inner: Mutex::new(CacheState { lru: LruCache::new(capacity), generation: 0, hits: 0, misses: 0 }),
        }
    }

    pub fn get(&self, id: EntityId) -> Result<Option<Arc<EntityRecord>>, AppError> {
        let mut state = self.inner.lock()?;
        let found = state.lru.get(&id).cloned();
        match found {
            Some(_) => state.hits += 1,
            None => state.misses += 1,
        }
        Ok(found)
    }

    pub fn generation(&self) -> Result<u64, AppError> {
        Ok(self.inner.lock()?.generation)
    }

    /// Publishes a record read at `generation`; ignored once a later commit happened.
    pub fn insert(&self, generation: u64, record: Arc<EntityRecord>) -> Result<(), AppError> {
        let mut state = self.inner.lock()?;
        if state.generation == generation {
            state.lru.put(record.id, record);
        }
        Ok(())
    }

    pub fn invalidate(&self, ids: &[EntityId]) -> Result<(), AppError> {
        let mut state = self.inner.lock()?;
        for id in ids {
            state.lru.pop(id);
        }
        state.generation += 1;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, AppError> {
        let state = self.inner.lock()?;
        Ok(CacheStats { entries: state.lru.len(), hits: state.hits, misses: state.misses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> Arc<EntityRecord> {
        Arc::new(EntityRecord::new(EntityId(id), "Gene"))
    }

    #[test]
    fn invalidation_drops_written_ids() {
        let cache = ObjectCache::new(4);
        let generation = cache.generation().unwrap();
        cache.insert(generation, record(1)).unwrap();
        cache.insert(generation, record(2)).unwrap();

        cache.invalidate(&[EntityId(1)]).unwrap();
        assert!(cache.get(EntityId(1)).unwrap().is_none());
        assert!(cache.get(EntityId(2)).unwrap().is_some());
        let stats = cache.stats().unwrap();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn stale_generation_is_not_published() {
        let cache = ObjectCache::new(4);
        let before = cache.generation().unwrap();
        cache.invalidate(&[]).unwrap();
        cache.insert(before, record(3)).unwrap();
        assert!(cache.get(EntityId(3)).unwrap().is_none());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = ObjectCache::new(2);
        let generation = cache.generation().unwrap();
        for id in 1..=3 {
            cache.insert(generation, record(id)).unwrap();
        }
        assert!(cache.get(EntityId(1)).unwrap().is_none());
        assert_eq!(cache.stats().unwrap().entries, 2);
    }
}
