/// Snapshot of every counter produced by a simulation run. Values only ever grow while a run is
/// in progress; the derived rates are computed on demand.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct Stats {
    pub memory_accesses: u64,
    pub cache_to_cache_transfers: u64,
    pub invalidations: u64,
    pub latency_cycles: u64,
    pub total_reads: u64,
    pub total_writes: u64,
    pub cache_hits: u64,
    pub effective_hits: u64,
    pub writebacks: u64,
    pub evictions: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local hits as a percentage of reads, `0.0` when nothing was read.
    pub fn hit_rate(&self) -> f64 {
        percentage(self.cache_hits, self.total_reads)
    }

    /// Local plus remote-served hits as a percentage of reads, `0.0` when nothing was read.
    pub fn effective_hit_rate(&self) -> f64 {
        percentage(self.effective_hits, self.total_reads)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    match total {
        0 => 0.0,
        _ => 100.0 * part as f64 / total as f64,
    }
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Memory accesses:          {:08}
Cache-to-cache transfers: {:08}
Invalidations:            {:08}
Total simulated latency:  {:08} cycles
Write-backs:              {:08}
Evictions:                {:08}
Total reads:              {:08}
Total writes:             {:08}
Cache hits:               {:08}
Effective hits:           {:08}
Cache hit rate:           {:.2}%
Effective hit rate:       {:.2}%",
            self.memory_accesses,
            self.cache_to_cache_transfers,
            self.invalidations,
            self.latency_cycles,
            self.writebacks,
            self.evictions,
            self.total_reads,
            self.total_writes,
            self.cache_hits,
            self.effective_hits,
            self.hit_rate(),
            self.effective_hit_rate(),
        )
    }
}

/// The `StatsCollector` is the only writer of a run's counters. The engine calls the `record_*`
/// methods as events happen; everyone else reads a `Stats` snapshot.
#[derive(Debug, Default)]
pub struct StatsCollector {
    stats: Stats,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Stats {
        self.stats
    }

    pub fn record_read(&mut self) {
        self.stats.total_reads += 1;
    }

    pub fn record_write(&mut self) {
        self.stats.total_writes += 1;
    }

    /// A read satisfied by the requester's own cache.
    pub fn record_local_hit(&mut self, latency: u64) {
        self.stats.cache_hits += 1;
        self.stats.effective_hits += 1;
        self.stats.latency_cycles += latency;
    }

    /// A read satisfied by another core's cache.
    pub fn record_transfer(&mut self, latency: u64) {
        self.stats.cache_to_cache_transfers += 1;
        self.stats.effective_hits += 1;
        self.stats.latency_cycles += latency;
    }

    pub fn record_memory_fetch(&mut self, latency: u64) {
        self.stats.memory_accesses += 1;
        self.stats.latency_cycles += latency;
    }

    pub fn record_invalidation(&mut self) {
        self.stats.invalidations += 1;
    }

    pub fn record_writeback(&mut self) {
        self.stats.writebacks += 1;
    }

    pub fn record_eviction(&mut self) {
        self.stats.evictions += 1;
    }

    pub fn record_latency(&mut self, cycles: u64) {
        self.stats.latency_cycles += cycles;
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[cfg(test)]
    mod stats_tests {

        use super::*;

        #[test]
        fn new() {
            let stats = Stats::new();
            assert_eq!(stats.memory_accesses, 0);
            assert_eq!(stats.cache_to_cache_transfers, 0);
            assert_eq!(stats.invalidations, 0);
            assert_eq!(stats.latency_cycles, 0);
            assert_eq!(stats.total_reads, 0);
            assert_eq!(stats.cache_hits, 0);
            assert_eq!(stats.effective_hits, 0);
        }

        #[test]
        fn rates_without_reads() {
            let stats = Stats::new();
            assert_eq!(stats.hit_rate(), 0.0);
            assert_eq!(stats.effective_hit_rate(), 0.0);
        }

        #[test]
        fn rates() {
            let stats = Stats {
                total_reads: 8,
                cache_hits: 2,
                effective_hits: 6,
                ..Stats::new()
            };
            assert_eq!(stats.hit_rate(), 25.0);
            assert_eq!(stats.effective_hit_rate(), 75.0);
        }

        #[test]
        fn to_string() {
            let text = Stats::new().to_string();
            assert!(text.contains("Memory accesses"));
            assert!(text.contains("Cache-to-cache transfers"));
            assert!(text.contains("Invalidations"));
            assert!(text.contains("Effective hit rate"));
        }
    }

    #[cfg(test)]
    mod stats_collector_tests {

        use super::*;

        #[test]
        fn records() {
            let mut collector = StatsCollector::new();
            collector.record_read();
            collector.record_local_hit(0);
            collector.record_read();
            collector.record_transfer(30);
            collector.record_read();
            collector.record_memory_fetch(100);
            collector.record_write();
            collector.record_invalidation();
            collector.record_latency(50);

            let stats = collector.snapshot();
            assert_eq!(stats.total_reads, 3);
            assert_eq!(stats.total_writes, 1);
            assert_eq!(stats.cache_hits, 1);
            assert_eq!(stats.effective_hits, 2);
            assert_eq!(stats.cache_to_cache_transfers, 1);
            assert_eq!(stats.memory_accesses, 1);
            assert_eq!(stats.invalidations, 1);
            assert_eq!(stats.latency_cycles, 180);
            assert!(stats.hit_rate() <= stats.effective_hit_rate());
            assert!(stats.effective_hit_rate() <= 100.0);
        }
    }
}
