use crate::address::DEFAULT_LINE_SHIFT;
use crate::cache::EvictionPolicy;
use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::protocol::{LatencyTable, ProtocolPolicy, ProtocolVariant};
use clap::{Parser, ValueEnum};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Replay a memory trace through a directory-based cache coherence model.
///
/// Every option falls back to a `SIM_*` environment variable before its built-in default.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Trace file of `READ|WRITE <core> <hex address>` lines [env: SIM_FILE_TRACE]
    pub trace_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = env_or_default_enum("SIM_PROTOCOL", ProtocolVariant::StrictMesi))]
    pub protocol: ProtocolVariant,

    /// Replay the trace once per protocol variant
    #[arg(long)]
    pub compare: bool,

    #[arg(long, default_value_t = env_or_default_num("SIM_DIM_X", 4))]
    pub dim_x: usize,

    #[arg(long, default_value_t = env_or_default_num("SIM_DIM_Y", 4))]
    pub dim_y: usize,

    /// Lines held by each private cache
    #[arg(long, default_value_t = env_or_default_num("SIM_CACHE_LINES", 64))]
    pub cache_lines: usize,

    /// log2 of the line size in bytes
    #[arg(long, default_value_t = env_or_default_num("SIM_LINE_SHIFT", DEFAULT_LINE_SHIFT))]
    pub line_shift: u32,

    #[arg(long, value_enum, default_value_t = env_or_default_enum("SIM_EVICTION", EvictionPolicy::Lru))]
    pub eviction: EvictionPolicy,

    #[arg(long, default_value_t = env_or_default_num("SIM_MEMORY_LATENCY", 100))]
    pub memory_latency: u64,

    /// Flat cache-to-cache transfer cost
    #[arg(long, default_value_t = env_or_default_num("SIM_TRANSFER_LATENCY", 30))]
    pub transfer_latency: u64,

    /// Per-hop transfer cost for distance aware variants
    #[arg(long, default_value_t = env_or_default_num("SIM_HOP_LATENCY", 3))]
    pub hop_latency: u64,

    /// Write cost; defaults to the selected variant's own value [env: SIM_WRITE_LATENCY]
    #[arg(long)]
    pub write_latency: Option<u64>,

    /// Do not draw a progress bar
    #[arg(long, short)]
    pub quiet: bool,
}

impl Config {
    /// Check the configured values before any simulation is attempted.
    ///
    /// # Errors
    ///
    /// A `ConfigError` naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_config(self.protocol).validate()?;
        self.trace_path().map(|_| ())
    }

    /// The trace to replay: the positional argument, else `SIM_FILE_TRACE`.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingTrace` when neither is set.
    pub fn trace_path(&self) -> Result<PathBuf, ConfigError> {
        self.trace_file
            .clone()
            .or_else(|| env::var_os("SIM_FILE_TRACE").map(PathBuf::from))
            .ok_or(ConfigError::MissingTrace)
    }

    /// Variants to run, in output order.
    pub fn variants(&self) -> Vec<ProtocolVariant> {
        match self.compare {
            true => ProtocolVariant::ALL.to_vec(),
            false => vec![self.protocol],
        }
    }

    /// Engine settings for `variant`, with the configured latency overrides applied.
    pub fn engine_config(&self, variant: ProtocolVariant) -> EngineConfig {
        let preset = ProtocolPolicy::preset(variant);
        let write = self
            .write_latency
            .or_else(|| env_num("SIM_WRITE_LATENCY"))
            .unwrap_or(preset.latency.write);
        EngineConfig {
            dim_x: self.dim_x,
            dim_y: self.dim_y,
            cache_lines: self.cache_lines,
            line_shift: self.line_shift,
            eviction: self.eviction,
            policy: ProtocolPolicy {
                latency: LatencyTable {
                    memory_fetch: self.memory_latency,
                    transfer: self.transfer_latency,
                    hop: self.hop_latency,
                    write,
                    ..preset.latency
                },
                ..preset
            },
        }
    }

    pub fn display(&self) {
        println!("simulation configuration values: ");
        println!("{:#?}", self);
    }
}

fn env_num<T: FromStr>(varname: &str) -> Option<T> {
    let value = env::var(varname).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!("ignoring env var '{}': expected an unsigned int", varname);
            None
        }
    }
}

fn env_or_default_num<T: FromStr>(varname: &str, default: T) -> T {
    env_num(varname).unwrap_or(default)
}

fn env_or_default_enum<T: ValueEnum>(varname: &str, default: T) -> T {
    match env::var(varname) {
        Ok(val) => <T as ValueEnum>::from_str(&val, true).unwrap_or_else(|_| {
            eprintln!("ignoring env var '{}': unknown value '{}'", varname, val);
            default
        }),
        _ => default,
    }
}
