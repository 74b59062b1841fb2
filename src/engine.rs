use crate::address::{LineAddress, Tag, DEFAULT_LINE_SHIFT};
use crate::cache::{CacheLine, EvictionPolicy, PrivateCache};
use crate::directory::{Directory, DirectoryEntry};
use crate::error::{AccessError, ConfigError, InvariantViolation};
use crate::protocol::{CoherenceState, ProtocolPolicy, ProtocolVariant};
use crate::stats::{Stats, StatsCollector};
use crate::topology::{CoreId, Topology};
use crate::trace::{Operation, TraceRecord};
use log::{debug, trace};

/// Everything needed to build a `ProtocolEngine`. Owned by the caller; the engine copies what it
/// needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub dim_x: usize,
    pub dim_y: usize,
    pub cache_lines: usize,
    pub line_shift: u32,
    pub eviction: EvictionPolicy,
    pub policy: ProtocolPolicy,
}

impl EngineConfig {
    /// Default geometry (4x4 grid, 64 lines per core, 64-byte lines) running `variant`.
    pub fn for_variant(variant: ProtocolVariant) -> Self {
        Self {
            dim_x: 4,
            dim_y: 4,
            cache_lines: 64,
            line_shift: DEFAULT_LINE_SHIFT,
            eviction: EvictionPolicy::Lru,
            policy: ProtocolPolicy::preset(variant),
        }
    }

    /// Reject geometry the engine cannot honour.
    ///
    /// # Errors
    ///
    /// A `ConfigError` naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim_x == 0 {
            return Err(ConfigError::Zero("dim_x"));
        } else if self.dim_y == 0 {
            return Err(ConfigError::Zero("dim_y"));
        } else if self.cache_lines == 0 {
            return Err(ConfigError::Zero("cache_lines"));
        } else if self.line_shift >= u64::BITS {
            return Err(ConfigError::LineShift(self.line_shift));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_variant(ProtocolVariant::StrictMesi)
    }
}

/// Where a read got its data from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReadSource {
    LocalHit,
    Owner(CoreId),
    Sharer(CoreId),
    Memory,
}

/// The `ProtocolEngine` is the coherence state machine. It owns the directory, one private cache
/// per core and the run's counters, and applies one trace record at a time. Every call either
/// completes fully or, for an invalid core id, returns an error before touching any state.
#[derive(Debug)]
pub struct ProtocolEngine {
    policy: ProtocolPolicy,
    line_shift: u32,
    topology: Topology,
    caches: Vec<PrivateCache>,
    directory: Directory,
    stats: StatsCollector,
}

impl ProtocolEngine {
    /// Create a new engine with empty caches and an empty directory.
    ///
    /// # Arguments
    ///
    /// * `config` - grid geometry, cache geometry and protocol policy.
    ///
    /// # Errors
    ///
    /// Whatever `EngineConfig::validate` rejects.
    pub fn build(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let topology = Topology::build(config.dim_x, config.dim_y);
        let caches = (0..topology.core_count())
            .map(|_| PrivateCache::build(config.cache_lines, config.eviction))
            .collect();
        Ok(Self {
            policy: config.policy,
            line_shift: config.line_shift,
            topology,
            caches,
            directory: Directory::build(),
            stats: StatsCollector::new(),
        })
    }

    pub fn policy(&self) -> &ProtocolPolicy {
        &self.policy
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn cache(&self, core: CoreId) -> Option<&PrivateCache> {
        self.caches.get(core)
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    pub fn tag_of(&self, address: u64) -> Tag {
        LineAddress::new(address, self.line_shift).tag
    }

    /// Directory entry for the line containing `address`, if the line was ever referenced.
    pub fn entry(&self, address: u64) -> Option<&DirectoryEntry> {
        self.directory.find(self.tag_of(address))
    }

    /// Apply one trace record.
    ///
    /// # Errors
    ///
    /// See `handle_read` and `handle_write`.
    pub fn access(&mut self, record: &TraceRecord) -> Result<(), AccessError> {
        match record.operation {
            Operation::Read => self.handle_read(record.core, record.address).map(|_| ()),
            Operation::Write => self.handle_write(record.core, record.address),
        }
    }

    /// Service a read by `core`. A local hit only touches the counters; a miss is served by the
    /// forwarding owner, then by the nearest sharer still holding the line, then by memory.
    /// Returns where the data came from.
    ///
    /// # Errors
    ///
    /// `AccessError::CoreOutOfRange` if `core` is not on the grid. Nothing is modified.
    pub fn handle_read(&mut self, core: CoreId, address: u64) -> Result<ReadSource, AccessError> {
        self.topology.position(core)?;
        let tag = self.tag_of(address);
        self.stats.record_read();

        if self.caches[core].touch(tag) {
            trace!("core {core} read hit on line {tag:#x}");
            self.stats.record_local_hit(self.policy.latency.local_hit);
            return Ok(ReadSource::LocalHit);
        }

        let source = self.source_for(core, tag)?;
        match source {
            ReadSource::Owner(owner) => self.forward_from_owner(core, owner, tag)?,
            ReadSource::Sharer(sharer) => self.forward_from_sharer(core, sharer, tag)?,
            ReadSource::Memory | ReadSource::LocalHit => self.fetch_from_memory(core, tag),
        }
        Ok(source)
    }

    /// Service a write by `core`: invalidate every other copy and leave `core` as the Modified
    /// owner. Under a strict policy a write by the current Modified owner is a no-op and leaves
    /// every counter untouched.
    ///
    /// # Errors
    ///
    /// `AccessError::CoreOutOfRange` if `core` is not on the grid. Nothing is modified.
    pub fn handle_write(&mut self, core: CoreId, address: u64) -> Result<(), AccessError> {
        self.topology.position(core)?;
        let tag = self.tag_of(address);

        let entry = self.directory.entry(tag);
        if self.policy.strict_write
            && entry.state == CoherenceState::Modified
            && entry.owner == Some(core)
        {
            trace!("core {core} already owns line {tag:#x} modified");
            self.caches[core].touch(tag);
            return Ok(());
        }
        self.stats.record_write();

        let mut victims: Vec<CoreId> = entry
            .sharers
            .iter()
            .copied()
            .filter(|&sharer| sharer != core)
            .collect();
        if let Some(owner) = entry.owner {
            if owner != core && !entry.sharers.contains(&owner) {
                victims.push(owner);
            }
        }
        entry.grant_exclusive(core, CoherenceState::Modified);

        for victim in victims {
            trace!("core {core} write invalidates line {tag:#x} in core {victim}");
            self.caches[victim].invalidate(tag);
            self.stats.record_invalidation();
        }

        if self.policy.fetch_on_write_miss && !self.caches[core].contains(tag) {
            self.stats
                .record_memory_fetch(self.policy.latency.memory_fetch);
        }
        self.stats.record_latency(self.policy.latency.write);
        self.fill(core, tag, CoherenceState::Modified);
        Ok(())
    }

    /// Decide who supplies `tag` to `core` on a read miss. Among sharers the closest one wins when
    /// the policy is distance aware; ties, and every choice under flat latency, go to the lowest
    /// core id.
    fn source_for(&self, core: CoreId, tag: Tag) -> Result<ReadSource, AccessError> {
        let entry = match self.directory.find(tag) {
            Some(entry) => entry,
            None => return Ok(ReadSource::Memory),
        };

        if self.policy.owner_forwards(entry.state) {
            if let Some(owner) = entry.owner {
                if owner != core && self.caches[owner].contains(tag) {
                    return Ok(ReadSource::Owner(owner));
                }
            }
        }

        let mut best: Option<(u64, CoreId)> = None;
        for &sharer in entry.sharers.iter() {
            if sharer == core || !self.caches[sharer].contains(tag) {
                continue;
            }
            let hops = match self.policy.distance_aware {
                true => self.topology.distance(sharer, core)?,
                false => 0,
            };
            if best.map_or(true, |(closest, _)| hops < closest) {
                best = Some((hops, sharer));
            }
        }
        Ok(best.map_or(ReadSource::Memory, |(_, sharer)| ReadSource::Sharer(sharer)))
    }

    fn forward_from_owner(
        &mut self,
        core: CoreId,
        owner: CoreId,
        tag: Tag,
    ) -> Result<(), AccessError> {
        let hops = self.topology.distance(owner, core)?;
        let entry = self.directory.entry(tag);

        if self.policy.supports_owned && entry.state.is_dirty() {
            self.caches[owner].set_state(tag, CoherenceState::Owned);
            entry.state = CoherenceState::Owned;
        } else {
            if entry.state == CoherenceState::Modified {
                self.stats.record_writeback();
            }
            self.caches[owner].set_state(tag, CoherenceState::Shared);
            entry.state = CoherenceState::Shared;
            entry.owner = None;
        }
        entry.sharers.insert(owner);
        entry.sharers.insert(core);
        trace!("core {owner} forwards line {tag:#x} to core {core} ({:?})", entry.state);

        self.stats
            .record_transfer(self.policy.transfer_latency(hops));
        self.fill(core, tag, CoherenceState::Shared);
        Ok(())
    }

    fn forward_from_sharer(
        &mut self,
        core: CoreId,
        sharer: CoreId,
        tag: Tag,
    ) -> Result<(), AccessError> {
        let hops = self.topology.distance(sharer, core)?;
        let entry = self.directory.entry(tag);

        // a clean exclusive holder loses exclusivity once a second copy exists
        if entry.state == CoherenceState::Exclusive {
            if let Some(owner) = entry.owner.take() {
                self.caches[owner].set_state(tag, CoherenceState::Shared);
            }
            entry.state = CoherenceState::Shared;
        }
        entry.sharers.insert(core);
        trace!("core {sharer} shares line {tag:#x} with core {core}");

        self.stats
            .record_transfer(self.policy.transfer_latency(hops));
        self.fill(core, tag, CoherenceState::Shared);
        Ok(())
    }

    fn fetch_from_memory(&mut self, core: CoreId, tag: Tag) {
        trace!("core {core} fetches line {tag:#x} from memory");
        self.directory
            .entry(tag)
            .grant_exclusive(core, CoherenceState::Exclusive);
        self.stats
            .record_memory_fetch(self.policy.latency.memory_fetch);
        self.fill(core, tag, CoherenceState::Exclusive);
    }

    /// Place `tag` in the cache of `core`, handing any capacity victim to `evict`.
    fn fill(&mut self, core: CoreId, tag: Tag, state: CoherenceState) {
        if let Some(victim) = self.caches[core].insert(tag, state) {
            self.evict(core, victim);
        }
    }

    /// Tell the directory that `core` silently dropped `victim`, so sharer and owner sets never
    /// name a core that no longer holds the line.
    fn evict(&mut self, core: CoreId, victim: CacheLine) {
        self.stats.record_eviction();
        if victim.state.is_dirty() {
            self.stats.record_writeback();
        }
        if let Some(entry) = self.directory.find_mut(victim.tag) {
            let state = entry.release(core);
            debug!(
                "core {core} evicted line {:#x} ({:?}), directory now {:?}",
                victim.tag, victim.state, state
            );
        }
    }

    /// Walk the whole directory and every cache and verify that both agree on who holds what.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (&tag, entry) in self.directory.iter() {
            let fail = |reason: String| Err(InvariantViolation { tag, reason });
            match entry.state {
                CoherenceState::Invalid => {
                    if !entry.sharers.is_empty() || entry.owner.is_some() {
                        return fail(format!("invalid line still tracked: {entry:?}"));
                    }
                }
                CoherenceState::Shared => {
                    if entry.sharers.is_empty() {
                        return fail("shared line without sharers".into());
                    }
                    if entry.owner.is_some() {
                        return fail(format!("shared line has owner {:?}", entry.owner));
                    }
                }
                CoherenceState::Exclusive | CoherenceState::Modified => match entry.owner {
                    Some(owner) if entry.sharers.len() == 1 && entry.is_sharer(owner) => {}
                    _ => return fail(format!("exclusive line not held by a lone owner: {entry:?}")),
                },
                CoherenceState::Owned => {
                    if !self.policy.supports_owned {
                        return fail("owned state under a MESI policy".into());
                    }
                    match entry.owner {
                        Some(owner) if entry.is_sharer(owner) => {}
                        _ => return fail(format!("owned line without owner: {entry:?}")),
                    }
                }
            }

            for &sharer in entry.sharers.iter() {
                let expected = match entry.owner {
                    Some(owner) if owner == sharer => entry.state,
                    _ => CoherenceState::Shared,
                };
                let held = self.caches.get(sharer).and_then(|cache| cache.state(tag));
                if held != Some(expected) {
                    return fail(format!(
                        "core {sharer} holds {held:?}, directory expects {expected:?}"
                    ));
                }
            }
        }

        for (core, cache) in self.caches.iter().enumerate() {
            if cache.len() > cache.capacity() {
                return Err(InvariantViolation {
                    tag: 0,
                    reason: format!("core {core} cache over capacity"),
                });
            }
            for line in cache.lines() {
                let tracked = self
                    .directory
                    .find(line.tag)
                    .map_or(false, |entry| entry.is_sharer(core));
                if !tracked {
                    return Err(InvariantViolation {
                        tag: line.tag,
                        reason: format!("core {core} holds an untracked copy"),
                    });
                }
            }
        }
        Ok(())
    }
}
