use crate::pipeline::pattern::InstrumentId;

/// Errors surfaced by the session and its components.
///
/// None of these are fatal: play-time failures are logged and the operation
/// becomes a no-op, load-time failures are collected into a report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("asset unresolved for {instrument}: {reason}")]
    AssetUnresolved { instrument: InstrumentId, reason: String },

    #[error("unknown pattern \"{0}\"")]
    UnknownPattern(String),

    #[error("invalid tempo {0} (bpm must be a positive number)")]
    InvalidTempo(f64),

    #[error("sample not found: {0}")]
    SampleNotFound(InstrumentId),

    #[error("recorder is busy ({0})")]
    RecorderBusy(&'static str),

    #[error("invalid pattern \"{name}\": {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Why a single asset could not be turned into a playable buffer.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] hound::Error),

    #[error("asset has zero playable duration")]
    Empty,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
