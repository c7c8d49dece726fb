//! Error types shared by every graph-building operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{func}: clip has a variable format")]
    VariableFormat { func: &'static str },
    #[error("{func}: clip has a variable resolution")]
    VariableResolution { func: &'static str },
    #[error("{func}: invalid dimensions {width}x{height}")]
    InvalidDimensions {
        func: &'static str,
        width: i64,
        height: i64,
    },
    #[error("{func}: clips do not match ({detail})")]
    MismatchedClips { func: &'static str, detail: String },
    #[error("{func}: unsupported format {format}")]
    UnsupportedFormat { func: &'static str, format: String },
    #[error("{func}: {reason}")]
    InvalidArgument { func: &'static str, reason: String },
    #[error("{name} failed: {source}")]
    Collaborator {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Graph export failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_argument(func: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            func,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatched(func: &'static str, detail: impl Into<String>) -> Self {
        Error::MismatchedClips {
            func,
            detail: detail.into(),
        }
    }

    /// Wrap a failure reported by an external kernel, scaler or mask implementation.
    pub fn collaborator(
        name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Collaborator {
            name: name.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
