use clap::ValueEnum;
use std::fmt;

/// Per-line coherence state. `Owned` is only ever produced when the active policy supports it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum CoherenceState {
    #[default]
    Invalid,
    Shared,
    Exclusive,
    Modified,
    Owned,
}

impl CoherenceState {
    /// Whether the holder of a line in this state must write it back before dropping it.
    pub fn is_dirty(&self) -> bool {
        matches!(self, CoherenceState::Modified | CoherenceState::Owned)
    }
}

/// Named protocol presets selectable from the command line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum)]
pub enum ProtocolVariant {
    /// MESI with flat transfer latency and a no-op repeat write by the owner.
    StrictMesi,
    /// MESI on a mesh; transfers cost `distance * hop_latency`.
    DistanceMesi,
    /// MESI plus the Owned state; dirty lines are shared without a write-back.
    Moesi,
    /// MESI that re-invalidates and re-acquires on every write.
    Baseline,
}

impl ProtocolVariant {
    pub const ALL: [ProtocolVariant; 4] = [
        ProtocolVariant::StrictMesi,
        ProtocolVariant::DistanceMesi,
        ProtocolVariant::Moesi,
        ProtocolVariant::Baseline,
    ];
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolVariant::StrictMesi => "strict-MESI",
            ProtocolVariant::DistanceMesi => "distance-MESI",
            ProtocolVariant::Moesi => "MOESI",
            ProtocolVariant::Baseline => "baseline",
        };
        f.write_str(name)
    }
}

/// Latency constants in simulated cycles.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LatencyTable {
    pub local_hit: u64,
    pub transfer: u64,
    pub hop: u64,
    pub memory_fetch: u64,
    pub write: u64,
}

impl Default for LatencyTable {
    fn default() -> Self {
        Self {
            local_hit: 0,
            transfer: 30,
            hop: 3,
            memory_fetch: 100,
            write: 50,
        }
    }
}

/// The knobs that distinguish one protocol variant from another. The engine runs a single
/// read/write skeleton and consults these flags at each decision point.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ProtocolPolicy {
    pub supports_owned: bool,
    pub distance_aware: bool,
    pub strict_write: bool,
    pub fetch_on_write_miss: bool,
    pub latency: LatencyTable,
}

impl ProtocolPolicy {
    /// Build the preset for a named variant using the default latency table.
    pub fn preset(variant: ProtocolVariant) -> Self {
        let latency = LatencyTable::default();
        match variant {
            ProtocolVariant::StrictMesi => Self {
                supports_owned: false,
                distance_aware: false,
                strict_write: true,
                fetch_on_write_miss: false,
                latency,
            },
            ProtocolVariant::DistanceMesi => Self {
                supports_owned: false,
                distance_aware: true,
                strict_write: true,
                fetch_on_write_miss: false,
                latency,
            },
            ProtocolVariant::Moesi => Self {
                supports_owned: true,
                distance_aware: false,
                strict_write: true,
                fetch_on_write_miss: true,
                latency: LatencyTable {
                    write: 100,
                    ..latency
                },
            },
            ProtocolVariant::Baseline => Self {
                supports_owned: false,
                distance_aware: false,
                strict_write: false,
                fetch_on_write_miss: false,
                latency: LatencyTable {
                    write: 100,
                    ..latency
                },
            },
        }
    }

    /// Whether a directory entry in `state` has a single owner able to forward the line.
    pub fn owner_forwards(&self, state: CoherenceState) -> bool {
        if self.supports_owned {
            matches!(state, CoherenceState::Modified | CoherenceState::Owned)
        } else {
            matches!(state, CoherenceState::Modified | CoherenceState::Exclusive)
        }
    }

    /// Cost of moving a line `distance` hops between two caches.
    pub fn transfer_latency(&self, distance: u64) -> u64 {
        if self.distance_aware {
            distance * self.latency.hop
        } else {
            self.latency.transfer
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[cfg(test)]
    mod policy_tests {

        use super::*;

        #[test]
        fn presets() {
            let strict = ProtocolPolicy::preset(ProtocolVariant::StrictMesi);
            assert!(strict.strict_write && !strict.supports_owned && !strict.distance_aware);
            assert_eq!(strict.latency.write, 50);

            let distance = ProtocolPolicy::preset(ProtocolVariant::DistanceMesi);
            assert!(distance.distance_aware);
            assert_eq!(distance.latency.write, 50);

            let moesi = ProtocolPolicy::preset(ProtocolVariant::Moesi);
            assert!(moesi.supports_owned && moesi.fetch_on_write_miss);
            assert_eq!(moesi.latency.write, 100);

            let baseline = ProtocolPolicy::preset(ProtocolVariant::Baseline);
            assert!(!baseline.strict_write);
            assert_eq!(baseline.latency.write, 100);
        }

        #[test]
        fn owner_forwards() {
            let mesi = ProtocolPolicy::preset(ProtocolVariant::StrictMesi);
            assert!(mesi.owner_forwards(CoherenceState::Exclusive));
            assert!(mesi.owner_forwards(CoherenceState::Modified));
            assert!(!mesi.owner_forwards(CoherenceState::Shared));

            let moesi = ProtocolPolicy::preset(ProtocolVariant::Moesi);
            assert!(moesi.owner_forwards(CoherenceState::Owned));
            assert!(moesi.owner_forwards(CoherenceState::Modified));
            assert!(!moesi.owner_forwards(CoherenceState::Exclusive));
        }

        #[test]
        fn transfer_latency() {
            let flat = ProtocolPolicy::preset(ProtocolVariant::StrictMesi);
            assert_eq!(flat.transfer_latency(0), 30);
            assert_eq!(flat.transfer_latency(6), 30);

            let mesh = ProtocolPolicy::preset(ProtocolVariant::DistanceMesi);
            assert_eq!(mesh.transfer_latency(1), 3);
            assert_eq!(mesh.transfer_latency(6), 18);
        }
    }

    #[test]
    fn dirty_states() {
        assert!(CoherenceState::Modified.is_dirty());
        assert!(CoherenceState::Owned.is_dirty());
        assert!(!CoherenceState::Exclusive.is_dirty());
        assert!(!CoherenceState::Shared.is_dirty());
    }

    #[test]
    fn variant_names() {
        assert_eq!(ProtocolVariant::Moesi.to_string(), "MOESI");
        assert_eq!(
            ProtocolVariant::from_str("distance-mesi", true).unwrap(),
            ProtocolVariant::DistanceMesi
        );
    }
}
