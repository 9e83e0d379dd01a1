use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Cannot open input file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line starting at byte {offset} does not fit in a {buffer_size} byte buffer")]
    ChunkBoundary { offset: u64, buffer_size: usize },

    #[error("Malformed record at byte {offset} ({reason}): '{line}'")]
    Parse {
        offset: u64,
        line: String,
        reason: &'static str,
    },

    #[error("More than {limit} distinct stations; increase the station limit")]
    Capacity { limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    #[error("No results available; the run has not completed")]
    NotRun,

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessingError {
    /// Build a parse error for `line`, which starts at absolute file `offset`.
    pub fn parse(offset: u64, line: &[u8], reason: &'static str) -> Self {
        ProcessingError::Parse {
            offset,
            line: String::from_utf8_lossy(line).into_owned(),
            reason,
        }
    }
}
