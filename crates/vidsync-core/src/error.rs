use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not start '{command}': {source}")]
    ProbeSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Command '{command}' didn't complete successfully (exit status {exit_code}). Perhaps not a valid video file?"
    )]
    ProbeFailure { command: String, exit_code: i32 },

    #[error("Command '{command}' did not finish within {timeout:?}")]
    ProbeTimeout { command: String, timeout: Duration },

    #[error("Could not parse probe output: {0}")]
    ProbeParse(#[source] serde_json::Error),

    #[error("Checksum sidecar {} is missing or unreadable: {source}", path.display())]
    IntegrityMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry responded with HTTP {status}: {body}")]
    Registry { status: u16, body: String },

    #[error("Registry transport error: {0}")]
    RegistryTransport(String),

    #[error("Unexpected registry response: {0}")]
    RegistryDecode(String),

    #[error("{count} stub assets match checksum {checksum}; refusing to pick one")]
    AmbiguousStubMatch { checksum: String, count: u64 },

    #[error("Ledger error: {0}")]
    Ledger(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Naming(String),

    #[error("Invalid timecode: {0}")]
    Timecode(String),
}

impl Error {
    /// Server-side and network failures may clear up on their own; client errors will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Registry { status, .. } => (500..=599).contains(status),
            Error::RegistryTransport(_) => true,
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
