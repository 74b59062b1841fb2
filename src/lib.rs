pub mod address;
pub mod cache;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod stats;
pub mod topology;
pub mod trace;

use config::Config;
use engine::{EngineConfig, ProtocolEngine};
use error::{ConfigError, Result, TraceError};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use protocol::ProtocolVariant;
use stats::Stats;
use std::fs;
use std::io::BufRead;
use std::path::Path;
use trace::TraceReader;

const PROGRESS_TEMPLATE: &str = "{prefix:>14} [{bar:40}] {pos}/{len} lines";

/// A single replay: one engine, owned outright, fed one trace from start to finish. Runs never
/// share engine state, so several can be evaluated side by side.
pub struct Simulation {
    engine: ProtocolEngine,
    progress: ProgressBar,
}

impl Simulation {
    /// # Errors
    ///
    /// A `ConfigError` if the engine settings are unusable.
    pub fn build(config: &EngineConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            engine: ProtocolEngine::build(config)?,
            progress: ProgressBar::hidden(),
        })
    }

    /// Draw progress on `progress` while replaying.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// Feed every record of `reader` to the engine. Unparseable lines and records naming a core
    /// outside the grid are skipped; only a read failure stops the replay.
    ///
    /// # Errors
    ///
    /// `TraceError::Io` if the underlying reader fails.
    pub fn replay<R: BufRead>(&mut self, reader: R, path: &Path) -> Result<Stats> {
        let mut reader = TraceReader::new(reader);
        while let Some(item) = reader.next() {
            let record = item.map_err(|source| TraceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if let Err(err) = self.engine.access(&record) {
                warn!("skipping trace line {}: {}", reader.line_number, err);
            }
            self.progress.set_position(reader.line_number);
        }
        self.progress.finish();
        info!(
            "replayed {} lines, {} malformed",
            reader.line_number, reader.skipped
        );
        Ok(self.engine.stats())
    }
}

fn progress_bar(config: &Config, lines: u64, variant: ProtocolVariant) -> ProgressBar {
    if config.quiet {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    ProgressBar::new(lines)
        .with_style(style)
        .with_prefix(variant.to_string())
}

/// Replay the configured trace once per selected variant and return each variant's counters.
///
/// # Errors
///
/// A `ConfigError` for an unset trace path, or a `TraceError` if the trace cannot be read. No
/// simulation is attempted in either case.
pub fn run_simulation(config: &Config) -> Result<Vec<(ProtocolVariant, Stats)>> {
    let path = config.trace_path()?;
    let bytes = fs::read(&path).map_err(|source| TraceError::Io {
        path: path.clone(),
        source,
    })?;
    let lines = count_lines(&bytes);

    config
        .variants()
        .into_iter()
        .map(|variant| -> Result<(ProtocolVariant, Stats)> {
            let progress = progress_bar(config, lines, variant);
            let mut simulation =
                Simulation::build(&config.engine_config(variant))?.with_progress(progress);
            simulation
                .replay(bytes.as_slice(), &path)
                .map(|stats| (variant, stats))
        })
        .collect()
}

/// Number of lines in a raw trace, counting a final line without a trailing newline.
fn count_lines(bytes: &[u8]) -> u64 {
    let newlines = bytes.iter().filter(|&&byte| byte == b'\n').count() as u64;
    match bytes.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::protocol::CoherenceState;
    use std::io::Cursor;

    const TRACE: &str = "READ 0 1000
READ 0 1008
WRITE 1 1000
READ 2 1000
this line is not a record
READ 99 1000
WRITE 1 1000
READ 3 2000
";

    #[cfg(test)]
    mod simulation_tests {

        use super::*;

        fn replay(variant: ProtocolVariant) -> (Stats, Simulation) {
            let mut simulation = Simulation::build(&EngineConfig::for_variant(variant)).unwrap();
            let stats = simulation
                .replay(Cursor::new(TRACE), Path::new("inline"))
                .unwrap();
            (stats, simulation)
        }

        #[test]
        fn replay_strict() {
            let (stats, simulation) = replay(ProtocolVariant::StrictMesi);
            assert_eq!(stats.total_reads, 4);
            assert_eq!(stats.total_writes, 2);
            assert_eq!(stats.cache_hits, 1);
            assert_eq!(stats.memory_accesses, 2);
            assert_eq!(stats.cache_to_cache_transfers, 1);
            assert_eq!(stats.invalidations, 2);
            // 100 + 0 + 50 + 30 + 50 + 100
            assert_eq!(stats.latency_cycles, 330);

            let entry = simulation.engine().entry(0x1000).unwrap();
            assert_eq!(entry.state, CoherenceState::Modified);
            assert_eq!(entry.owner, Some(1));
            simulation.engine().check_invariants().unwrap();
        }

        #[test]
        fn replay_baseline_and_moesi_differ() {
            let (baseline, _) = replay(ProtocolVariant::Baseline);
            let (moesi, _) = replay(ProtocolVariant::Moesi);
            assert_eq!(baseline.invalidations, 2);
            assert_eq!(moesi.invalidations, 2);
            assert_eq!(baseline.memory_accesses, 2);
            // the first write by core 1 misses and fetches; the second finds its Owned copy
            assert_eq!(moesi.memory_accesses, 3);
        }
    }

    #[cfg(test)]
    mod non_utf8_tests {

        use super::*;

        #[test]
        fn replay_skips_undecodable_line() {
            let mut simulation =
                Simulation::build(&EngineConfig::for_variant(ProtocolVariant::StrictMesi)).unwrap();
            let trace: &[u8] = b"READ 0 40\n\xff\xfe garbage\nREAD 1 40\n";
            let stats = simulation
                .replay(Cursor::new(trace), Path::new("inline"))
                .unwrap();
            assert_eq!(stats.total_reads, 2);
            assert_eq!(stats.memory_accesses, 1);
            assert_eq!(stats.cache_to_cache_transfers, 1);
        }

        #[test]
        fn line_counting() {
            assert_eq!(count_lines(b""), 0);
            assert_eq!(count_lines(b"READ 0 40\n"), 1);
            assert_eq!(count_lines(b"READ 0 40\n\xff\nREAD 1 40"), 3);
        }
    }

    #[cfg(test)]
    mod run_simulation_tests {

        use super::*;
        use clap::Parser;

        #[test]
        fn invalid_geometry_is_a_config_error() {
            let config = Config::parse_from([
                "coherence_sim",
                "/nonexistent/trace.txt",
                "--cache-lines",
                "0",
            ]);
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Zero("cache_lines"))
            ));
        }

        #[test]
        fn missing_file() {
            let config = Config::parse_from(["coherence_sim", "/nonexistent/trace.txt"]);
            let err = run_simulation(&config).unwrap_err();
            assert!(matches!(err, error::Error::Trace(TraceError::Io { .. })));
        }
    }
}
