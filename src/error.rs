use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JoinError>;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("population table has no entry for region '{0}'")]
    KeyNotFound(String),

    #[error("region identifier '{0}' appears more than once in the boundary dataset")]
    DuplicateId(String),

    #[error("failed to serialize joined dataset: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl JoinError {
    /// Maps an I/O failure on `path`, singling out a missing file.
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            JoinError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            JoinError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn parse(path: &Path, message: impl Into<String>) -> Self {
        JoinError::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}
