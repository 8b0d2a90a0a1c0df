use thiserror::Error;

use crate::domain::ToolKind;

/// Local input check failure, raised before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{tool}: select a file first")]
    MissingFile { tool: ToolKind },
    #[error("enter text to encode")]
    MissingText,
    #[error("select at least {required} files to merge ({actual} selected)")]
    NotEnoughFiles { required: usize, actual: usize },
}

/// Failure of the dispatch call itself. Server and transport failures are
/// not errors at this level; they are reported inside the outcome value.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to save result artifact to {path}")]
    SaveArtifact {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
