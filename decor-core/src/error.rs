//! Error types for decor-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SourceId;

/// All errors that can arise from manifest, config and registry operations.
#[derive(Debug, Error)]
pub enum DecorError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.decor/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The source manifest did not exist at the expected path.
    #[error("source manifest not found at {path}")]
    ManifestNotFound { path: PathBuf },

    /// A source id that is not usable as a manifest file name.
    #[error("invalid source id '{0}': must be non-empty and contain no path separators")]
    InvalidSourceId(String),

    /// A source registry was asked to add a source that is already active.
    #[error("source '{0}' is already active")]
    DuplicateSource(SourceId),
}
