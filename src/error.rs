use std::path::PathBuf;
use thiserror::Error;

/// Type Alias: the crate-wide `Result` carrying the top level `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-record failure raised by the protocol engine. The engine validates a record before it
/// touches any state, so receiving one of these means nothing changed.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AccessError {
    #[error("core {core} is out of range (grid has {cores} cores)")]
    CoreOutOfRange { core: usize, cores: usize },
}

/// A disagreement between the directory and the private caches.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("coherence invariant violated for line {tag:#x}: {reason}")]
pub struct InvariantViolation {
    pub tag: u64,
    pub reason: String,
}

/// Invalid configuration values, detected before a simulation is attempted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no trace file given (pass a path or set SIM_FILE_TRACE)")]
    MissingTrace,
    #[error("'{0}' must be a non-zero value")]
    Zero(&'static str),
    #[error("'line_shift' must be below 64, got {0}")]
    LineShift(u32),
}

/// The trace file could not be opened or read.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("cannot read trace file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Access(#[from] AccessError),
}
