use std::collections::BTreeMap;
use std::rc::Rc;

use formats::FeatureCollection;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    collection: Rc<FeatureCollection>,
    last_used_tick: u64,
}

/// Session cache of loaded region geography, keyed by region name.
///
/// Notes on determinism:
/// - Entries are keyed in a `BTreeMap` for stable traversal order.
/// - Eviction is LRU by `last_used_tick`, with a tie-break by key ordering.
#[derive(Debug)]
pub struct GeoCache {
    max_entries: usize,
    tick: u64,
    entries: BTreeMap<String, CacheEntry>,
    stats: CacheStats,
}

impl Default for GeoCache {
    fn default() -> Self {
        Self::new(32)
    }
}

impl GeoCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            tick: 0,
            entries: BTreeMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Look up and touch an entry, counting the hit or miss.
    pub fn get(&mut self, name: &str) -> Option<Rc<FeatureCollection>> {
        self.tick += 1;
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.last_used_tick = self.tick;
                self.stats.hits += 1;
                tracing::debug!(region = %name, "geo cache hit");
                Some(Rc::clone(&entry.collection))
            }
            None => {
                self.stats.misses += 1;
                tracing::debug!(region = %name, "geo cache miss");
                None
            }
        }
    }

    /// Store a collection; returns the names evicted to stay within capacity.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        collection: FeatureCollection,
    ) -> (Rc<FeatureCollection>, Vec<String>) {
        self.tick += 1;
        let name = name.into();
        let collection = Rc::new(collection);
        self.entries.insert(
            name.clone(),
            CacheEntry {
                collection: Rc::clone(&collection),
                last_used_tick: self.tick,
            },
        );
        let evicted = self.evict_as_needed(&name);
        (collection, evicted)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_as_needed(&mut self, protected: &str) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.max_entries {
            let candidate = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != protected)
                .min_by(|(ka, ea), (kb, eb)| {
                    ea.last_used_tick
                        .cmp(&eb.last_used_tick)
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(k, _)| k.clone());
            let Some(key) = candidate else {
                break;
            };
            self.entries.remove(&key);
            self.stats.evictions += 1;
            tracing::debug!(region = %key, "geo cache evicted");
            evicted.push(key);
        }
        evicted
    }
}
