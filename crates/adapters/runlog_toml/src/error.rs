//! Run-log adapter error type.

use rexlab_domain::error::LabError;

/// Errors originating from reading or writing run-log files.
#[derive(Debug, thiserror::Error)]
pub enum RunLogError {
    /// The file or its directory could not be accessed.
    #[error("run log I/O error at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The run log could not be rendered as TOML.
    #[error("run log serialization error")]
    Serialize(#[from] toml::ser::Error),

    /// A stored artifact is not a valid run log.
    #[error("run log parse error")]
    Parse(#[from] toml::de::Error),
}

impl From<RunLogError> for LabError {
    fn from(err: RunLogError) -> Self {
        Self::Storage(Box::new(err))
    }
}
