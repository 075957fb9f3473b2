use std::collections::HashSet;

use lru::LruCache;

use super::{CacheKey, Fingerprint, Thumbnail, Tier};
use crate::config::MemoryCapacity;

/// Memory tier of the thumbnail cache.
///
/// Holds decoded thumbnails in one count-bounded LRU per [`Tier`], and the
/// set of keys known to be unavailable from the media center. Neither is
/// persisted.
#[derive(Debug)]
pub struct MemoryTier {
    resident: [LruCache<Fingerprint, Thumbnail>; 3],
    unavailable: HashSet<CacheKey>,
}

impl MemoryTier {
    #[must_use]
    pub fn new(capacity: &MemoryCapacity) -> Self {
        debug!(
            "memory tier capacity: {} small, {} medium, {} big",
            capacity.small, capacity.medium, capacity.big
        );

        Self {
            resident: Tier::ALL.map(|tier| LruCache::new(capacity.for_tier(tier))),
            unavailable: HashSet::new(),
        }
    }

    /// Looks up a thumbnail, marking it as most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<Thumbnail> {
        self.resident[key.tier.index()]
            .get(&key.fingerprint)
            .cloned()
    }

    /// Whether a thumbnail is resident, without touching its recency.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.resident[key.tier.index()].contains(&key.fingerprint)
    }

    /// Stores a thumbnail, evicting the least recently used one of the same
    /// tier when full. An existing entry for the key is replaced.
    pub fn insert(&mut self, key: CacheKey, thumbnail: Thumbnail) {
        if let Some((evicted, _)) = self.resident[key.tier.index()].push(key.fingerprint, thumbnail)
        {
            if evicted != key.fingerprint {
                trace!("evicted {} from memory", CacheKey::new(evicted, key.tier));
            }
        }
    }

    /// Records that the key cannot be downloaded.
    ///
    /// Returns `false` if it was already recorded.
    pub fn mark_unavailable(&mut self, key: CacheKey) -> bool {
        self.unavailable.insert(key)
    }

    #[must_use]
    pub fn is_unavailable(&self, key: &CacheKey) -> bool {
        self.unavailable.contains(key)
    }

    /// Number of resident thumbnails across all tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resident.iter().map(LruCache::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn unavailable_len(&self) -> usize {
        self.unavailable.len()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn tier_with_capacity(small: usize) -> MemoryTier {
        MemoryTier::new(&MemoryCapacity {
            small: NonZeroUsize::new(small).unwrap(),
            ..MemoryCapacity::default()
        })
    }

    fn key(checksum: u32, tier: Tier) -> CacheKey {
        CacheKey::new(Fingerprint::new(checksum), tier)
    }

    #[test]
    fn evicts_least_recently_used_per_tier() {
        let mut memory = tier_with_capacity(2);
        memory.insert(key(1, Tier::Small), Thumbnail::placeholder(Tier::Small));
        memory.insert(key(2, Tier::Small), Thumbnail::placeholder(Tier::Small));
        memory.insert(key(1, Tier::Medium), Thumbnail::placeholder(Tier::Medium));

        // Touch 1 so that 2 becomes the eviction candidate.
        assert!(memory.get(&key(1, Tier::Small)).is_some());
        memory.insert(key(3, Tier::Small), Thumbnail::placeholder(Tier::Small));

        assert!(memory.contains(&key(1, Tier::Small)));
        assert!(!memory.contains(&key(2, Tier::Small)));
        assert!(memory.contains(&key(3, Tier::Small)));
        assert!(memory.contains(&key(1, Tier::Medium)));
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn tiers_are_independent() {
        let mut memory = tier_with_capacity(1);
        memory.insert(key(1, Tier::Medium), Thumbnail::placeholder(Tier::Medium));
        assert!(memory.get(&key(1, Tier::Small)).is_none());
        assert!(memory.get(&key(1, Tier::Medium)).is_some());
    }

    #[test]
    fn unavailable_keys_are_remembered() {
        let mut memory = tier_with_capacity(1);
        assert!(memory.mark_unavailable(key(9, Tier::Small)));
        assert!(!memory.mark_unavailable(key(9, Tier::Small)));

        assert!(memory.is_unavailable(&key(9, Tier::Small)));
        assert!(!memory.is_unavailable(&key(9, Tier::Medium)));
        assert_eq!(memory.unavailable_len(), 1);
        assert!(memory.is_empty());
    }
}
