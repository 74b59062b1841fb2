use crate::address::Tag;
use crate::protocol::CoherenceState;
use clap::ValueEnum;
use linked_hash_map::LinkedHashMap;

/// Victim selection used by a full `PrivateCache`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, ValueEnum)]
pub enum EvictionPolicy {
    /// Least recently used: local hits move a line to the back of the victim queue.
    #[default]
    Lru,
    /// Least recently inserted: hits never reorder the victim queue.
    Fifo,
}

/// A single cached line and its coherence state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CacheLine {
    pub tag: Tag,
    pub state: CoherenceState,
}

/// The `PrivateCache` struct models one core's private cache as a fully associative, capacity
/// bounded set of lines. The insertion-ordered map doubles as the victim queue: the front entry is
/// always the next line to be evicted.
#[derive(Debug)]
pub struct PrivateCache {
    capacity: usize,
    policy: EvictionPolicy,
    lines: LinkedHashMap<Tag, CacheLine>,
}

impl PrivateCache {
    /// Create and return an empty cache.
    ///
    /// # Arguments
    ///
    /// * `capacity` - maximum number of lines held at once. Must be non-zero.
    /// * `policy` - victim selection used once the cache is full.
    pub fn build(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            capacity,
            policy,
            lines: LinkedHashMap::with_capacity(capacity),
        }
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.lines.contains_key(&tag)
    }

    pub fn state(&self, tag: Tag) -> Option<CoherenceState> {
        self.lines.get(&tag).map(|line| line.state)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lines(&self) -> impl Iterator<Item = &CacheLine> {
        self.lines.values()
    }

    /// Record a use of `tag` by the owning core. Under LRU the line moves to the back of the
    /// victim queue. Returns whether the line is present.
    pub fn touch(&mut self, tag: Tag) -> bool {
        match self.policy {
            EvictionPolicy::Lru => self.lines.get_refresh(&tag).is_some(),
            EvictionPolicy::Fifo => self.lines.contains_key(&tag),
        }
    }

    /// Change the state of a line already held, leaving its queue position alone. Returns `false`
    /// if the line is not cached.
    pub fn set_state(&mut self, tag: Tag, state: CoherenceState) -> bool {
        match self.lines.get_mut(&tag) {
            Some(line) => {
                line.state = state;
                true
            }
            None => false,
        }
    }

    /// Fill `tag` in `state`. An already cached line only has its state replaced (and is touched).
    /// A new line evicts the front of the victim queue first when the cache is full; the evicted
    /// line is returned so the caller can notify the directory.
    pub fn insert(&mut self, tag: Tag, state: CoherenceState) -> Option<CacheLine> {
        if self.set_state(tag, state) {
            self.touch(tag);
            return None;
        }
        let victim = if self.lines.len() >= self.capacity {
            self.lines.pop_front().map(|(_, line)| line)
        } else {
            None
        };
        self.lines.insert(tag, CacheLine { tag, state });
        victim
    }

    /// Drop `tag` from the cache, returning the line if it was present.
    pub fn invalidate(&mut self, tag: Tag) -> Option<CacheLine> {
        self.lines.remove(&tag)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[cfg(test)]
    mod private_cache_tests {

        use super::*;
        const SIZE_TEST: usize = 3;

        fn filled(policy: EvictionPolicy) -> PrivateCache {
            let mut cache = PrivateCache::build(SIZE_TEST, policy);
            (0..SIZE_TEST as Tag).for_each(|tag| {
                assert!(cache.insert(tag, CoherenceState::Shared).is_none());
            });
            cache
        }

        #[test]
        fn build() {
            let cache = PrivateCache::build(SIZE_TEST, EvictionPolicy::Lru);
            assert!(cache.is_empty());
            assert_eq!(cache.capacity(), SIZE_TEST);
        }

        #[test]
        fn insert_and_state() {
            let mut cache = PrivateCache::build(SIZE_TEST, EvictionPolicy::Lru);
            assert_eq!(cache.state(7), None);
            cache.insert(7, CoherenceState::Exclusive);
            assert!(cache.contains(7));
            assert_eq!(cache.state(7), Some(CoherenceState::Exclusive));
            assert!(cache.insert(7, CoherenceState::Modified).is_none());
            assert_eq!(cache.state(7), Some(CoherenceState::Modified));
            assert_eq!(cache.len(), 1);
        }

        #[test]
        fn capacity_never_exceeded() {
            let mut cache = filled(EvictionPolicy::Fifo);
            (10..20).for_each(|tag| {
                let victim = cache.insert(tag, CoherenceState::Shared);
                assert!(victim.is_some());
                assert_eq!(cache.len(), SIZE_TEST);
            });
        }

        #[test]
        fn fifo_evicts_oldest_insert() {
            let mut cache = filled(EvictionPolicy::Fifo);
            assert!(cache.touch(0));
            let victim = cache.insert(99, CoherenceState::Shared).unwrap();
            assert_eq!(victim.tag, 0);
            assert!(!cache.contains(0));
        }

        #[test]
        fn lru_evicts_least_recently_used() {
            let mut cache = filled(EvictionPolicy::Lru);
            assert!(cache.touch(0));
            let victim = cache.insert(99, CoherenceState::Shared).unwrap();
            assert_eq!(victim.tag, 1);
            assert!(cache.contains(0));
        }

        #[test]
        fn set_state_keeps_order() {
            let mut cache = filled(EvictionPolicy::Lru);
            assert!(cache.set_state(0, CoherenceState::Owned));
            assert!(!cache.set_state(42, CoherenceState::Owned));
            let victim = cache.insert(99, CoherenceState::Shared).unwrap();
            assert_eq!(victim, CacheLine { tag: 0, state: CoherenceState::Owned });
        }

        #[test]
        fn invalidate() {
            let mut cache = filled(EvictionPolicy::Lru);
            assert!(cache.invalidate(1).is_some());
            assert!(cache.invalidate(1).is_none());
            assert!(!cache.contains(1));
            assert_eq!(cache.len(), SIZE_TEST - 1);
            assert!(cache.insert(50, CoherenceState::Shared).is_none());
        }
    }
}
