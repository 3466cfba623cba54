use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::compression::Encoding;

/// Compressed bodies keyed by normalized request path, one map per encoding.
#[derive(Debug, Default)]
pub struct CacheMaps {
    gzip: HashMap<String, Arc<[u8]>>,
    deflate: HashMap<String, Arc<[u8]>>,
}

impl CacheMaps {
    fn map(&self, encoding: Encoding) -> &HashMap<String, Arc<[u8]>> {
        match encoding {
            Encoding::Gzip => &self.gzip,
            Encoding::Deflate => &self.deflate,
        }
    }

    fn map_mut(&mut self, encoding: Encoding) -> &mut HashMap<String, Arc<[u8]>> {
        match encoding {
            Encoding::Gzip => &mut self.gzip,
            Encoding::Deflate => &mut self.deflate,
        }
    }

    pub fn get(&self, encoding: Encoding, key: &str) -> Option<Arc<[u8]>> {
        self.map(encoding).get(key).cloned()
    }

    /// Stores the entry unless one exists already; the stored bytes are returned.
    pub fn insert(&mut self, encoding: Encoding, key: &str, bytes: Vec<u8>) -> Arc<[u8]> {
        self.map_mut(encoding)
            .entry(key.to_string())
            .or_insert_with(|| Arc::from(bytes))
            .clone()
    }
}

/// The lock also serializes the file read and compression of a cache fill.
#[derive(Debug, Default)]
pub struct CompressedCache {
    maps: Mutex<CacheMaps>,
}

impl CompressedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic during a fill only ever happens before `insert`, so the maps
    /// behind a poisoned lock are still consistent and the guard is recovered.
    pub fn lock(&self) -> MutexGuard<'_, CacheMaps> {
        self.maps.lock().unwrap_or_else(|poisoned| {
            log::warn!("Recovering compressed cache lock after a panicked fill");
            self.maps.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    pub fn len(&self, encoding: Encoding) -> usize {
        self.lock().map(encoding).len()
    }

    /// Removes `key` from both maps, returning how many entries went away.
    pub fn invalidate(&self, key: &str) -> usize {
        let mut maps = self.lock();
        [Encoding::Gzip, Encoding::Deflate]
            .into_iter()
            .filter(|&encoding| maps.map_mut(encoding).remove(key).is_some())
            .count()
    }

    pub fn clear(&self) {
        let mut maps = self.lock();
        maps.gzip.clear();
        maps.deflate.clear();
    }
}
