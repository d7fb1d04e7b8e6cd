use std::path::PathBuf;

/// Errors raised anywhere in the meshing workspace.
///
/// None of these are retried; the command line front end reports them and
/// exits with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Partitioning not defined: '{0}' (expected 'singleBlock' or 'auto')")]
    InvalidPartitioningMode(String),

    #[error(
        "Sizing search failed at resolution {resolution} \
         ({estimate} track candidates, budget {budget}): {reason}"
    )]
    SizingSearchFailure {
        resolution: u32,
        estimate: u64,
        budget: u64,
        reason: String,
    },

    #[error("Empty mesh: {0}")]
    EmptyMesh(String),

    #[error("Failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid binary file: {0}")]
    Format(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an I/O failure on `path` as a persistence error.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
