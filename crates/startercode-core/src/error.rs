use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StarterError {
    #[error("failed to fetch catalogue from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("catalogue endpoint {url} responded with {status}")]
    FetchStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("identifier {identifier:?} has no numeric prefix")]
    MalformedIdentifier { identifier: String },
    #[error("notebook template has no {{{{ DISTRIBUTION }}}} cell (dataset {identifier})")]
    TemplateStructure { identifier: String },
    #[error(
        "dataset {identifier} has {blocks} distribution blocks but {links} distribution links"
    )]
    DistributionArityMismatch {
        identifier: String,
        blocks: usize,
        links: usize,
    },
    #[error("identifier {identifier:?} cannot be used as a file name")]
    UnsafeIdentifier { identifier: String },
    #[error("IO error at {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("configuration error: {0}")]
    Config(String),
}

impl StarterError {
    pub fn parse<T: Into<String>>(message: T) -> Self {
        StarterError::Parse(message.into())
    }

    pub fn file_io(path: &Path, source: io::Error) -> Self {
        StarterError::FileIo {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Errors that only affect a single dataset's output file.
    pub fn is_per_dataset(&self) -> bool {
        matches!(
            self,
            StarterError::TemplateStructure { .. }
                | StarterError::DistributionArityMismatch { .. }
                | StarterError::UnsafeIdentifier { .. }
        )
    }
}

pub type Result<T, E = StarterError> = std::result::Result<T, E>;
