use crate::address::Tag;
use crate::protocol::CoherenceState;
use crate::topology::CoreId;
use std::collections::{BTreeSet, HashMap};

/// Coherence bookkeeping for one line: its global state, every core holding a copy and, for the
/// Modified/Exclusive/Owned states, the owning core. Sharers are kept ordered so that any scan
/// over them is deterministic.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct DirectoryEntry {
    pub state: CoherenceState,
    pub sharers: BTreeSet<CoreId>,
    pub owner: Option<CoreId>,
}

impl DirectoryEntry {
    pub fn is_sharer(&self, core: CoreId) -> bool {
        self.sharers.contains(&core)
    }

    /// Give `core` the line exclusively in `state`: it becomes the only sharer and the owner.
    pub fn grant_exclusive(&mut self, core: CoreId, state: CoherenceState) {
        self.sharers.clear();
        self.sharers.insert(core);
        self.owner = Some(core);
        self.state = state;
    }

    /// Forget that `core` holds the line after it dropped it silently (capacity eviction).
    /// Returns the state the entry is left in.
    pub fn release(&mut self, core: CoreId) -> CoherenceState {
        self.sharers.remove(&core);
        if self.owner == Some(core) {
            self.owner = None;
            if self.state == CoherenceState::Owned {
                self.state = CoherenceState::Shared;
            }
        }
        if self.sharers.is_empty() {
            self.state = CoherenceState::Invalid;
            self.owner = None;
        }
        self.state
    }
}

/// The `Directory` is the global, lazily populated table of `DirectoryEntry` values keyed by line
/// tag. Entries are created on first reference and never removed for the lifetime of a run.
#[derive(Debug, Default)]
pub struct Directory(HashMap<Tag, DirectoryEntry>);

impl Directory {
    pub fn build() -> Self {
        Self(HashMap::new())
    }

    /// Return the entry for `tag`, creating an `Invalid` one if the line was never referenced.
    pub fn entry(&mut self, tag: Tag) -> &mut DirectoryEntry {
        self.0.entry(tag).or_default()
    }

    pub fn find(&self, tag: Tag) -> Option<&DirectoryEntry> {
        self.0.get(&tag)
    }

    pub fn find_mut(&mut self, tag: Tag) -> Option<&mut DirectoryEntry> {
        self.0.get_mut(&tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &DirectoryEntry)> {
        self.0.iter()
    }
}
