use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::TranscriptionOutput;
use crate::fingerprint::Fingerprint;

/// Capacity-bounded LRU cache of transcription results keyed by content
/// fingerprint.
///
/// Entries are write-once and never expire: identical content always yields
/// identical output, so only capacity evicts. Insertion order in the map is
/// recency order, least recently used first. One lock guards the map; it is
/// never held across engine calls.
///
/// Producers of a missing entry serialize per fingerprint through
/// [`ResultCache::claim`], so identical content submitted concurrently is
/// decoded once and the later callers read the stored result.
pub struct ResultCache {
    capacity: usize,
    entries: Mutex<IndexMap<Fingerprint, Arc<TranscriptionOutput>>>,
    in_flight: DashMap<Fingerprint, Arc<tokio::sync::Mutex<()>>>,
}

/// Exclusive right to produce the entry for one fingerprint. Released on drop.
pub struct CacheClaim<'a> {
    cache: &'a ResultCache,
    key: Fingerprint,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CacheClaim<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.cache
            .in_flight
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity + 1)),
            in_flight: DashMap::new(),
        }
    }

    /// Waits until no other caller is producing `key`, then claims it.
    ///
    /// Check the cache again after claiming: the previous holder has usually
    /// just stored the entry.
    pub async fn claim(&self, key: &Fingerprint) -> CacheClaim<'_> {
        let lock = Arc::clone(self.in_flight.entry(key.clone()).or_default().value());
        let guard = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(hash = %key.short(), "Waiting for in-flight transcription");
                lock.lock_owned().await
            }
        };
        CacheClaim {
            cache: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Fingerprints currently claimed or awaited.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Looks up an entry, promoting it to most recently used on a hit.
    pub fn get(&self, key: &Fingerprint) -> Option<Arc<TranscriptionOutput>> {
        let mut entries = self.entries.lock();
        let Some(index) = entries.get_index_of(key) else {
            debug!(hash = %key.short(), "Cache miss");
            return None;
        };

        let last = entries.len() - 1;
        entries.move_index(index, last);
        info!(hash = %key.short(), language = %key.language(), "Cache hit");
        entries.get_index(last).map(|(_, value)| Arc::clone(value))
    }

    /// Inserts or overwrites an entry as most recently used, evicting the
    /// least recently used entry when over capacity.
    pub fn put(&self, key: Fingerprint, value: Arc<TranscriptionOutput>) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock();
        let (index, _) = entries.insert_full(key, value);
        let last = entries.len() - 1;
        entries.move_index(index, last);

        if entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                info!(hash = %evicted.short(), "Cache full, evicted least recently used entry");
            }
        }
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
