use crate::core::geo::TileCoord;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// In-memory cache of encoded tile payloads with LRU eviction.
///
/// Payloads are shared as `Arc<Vec<u8>>` so cache hits hand out the same
/// buffer an in-flight consumer may still be reading.
#[derive(Debug)]
pub struct TileCache {
    cache: Mutex<LruCache<TileCoord, Arc<Vec<u8>>>>,
}

impl TileCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1024).unwrap());
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a tile from the cache
    pub fn get(&self, coord: &TileCoord) -> Option<Arc<Vec<u8>>> {
        self.cache.lock().ok()?.get(coord).cloned()
    }

    /// Insert a tile into the cache
    pub fn insert(&self, coord: TileCoord, data: Arc<Vec<u8>>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(coord, data);
        }
    }

    /// Check if a tile is in the cache
    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.contains(coord))
            .unwrap_or(false)
    }

    /// Clear all tiles from the cache
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Get the current number of cached tiles
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_cache_basic_operations() {
        let cache = TileCache::new(2);
        let coord1 = TileCoord::new(1, 2, 3);
        let coord2 = TileCoord::new(4, 5, 6);

        assert!(cache.is_empty());

        cache.insert(coord1, Arc::new(vec![1, 2, 3]));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&coord1));
        assert_eq!(*cache.get(&coord1).unwrap(), vec![1, 2, 3]);

        cache.insert(coord2, Arc::new(vec![4]));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_tile_cache_lru_eviction() {
        let cache = TileCache::new(2);
        let coord1 = TileCoord::new(1, 1, 1);
        let coord2 = TileCoord::new(2, 2, 2);
        let coord3 = TileCoord::new(3, 3, 3);

        cache.insert(coord1, Arc::new(vec![1]));
        cache.insert(coord2, Arc::new(vec![2]));
        cache.insert(coord3, Arc::new(vec![3]));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&coord1)); // Evicted
        assert!(cache.contains(&coord2));
        assert!(cache.contains(&coord3));
    }
}
