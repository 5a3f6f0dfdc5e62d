//! Error type shared by the loader, stages, and writer.

/// Errors that can abort a single file's pipeline run.
#[derive(Debug)]
pub enum PupilError {
    /// Tracker output is malformed or lacks a required bodypart/column.
    InvalidInput(String),
    /// Too few valid frames to fit the height model.
    InsufficientData {
        /// Required minimum number of valid frames.
        needed: usize,
        /// Number of valid frames available.
        got: usize,
    },
    /// The trace contains no valid frame at all.
    NoValidFrames,
    /// Interpolation has no good frame to anchor on.
    NoAnchors {
        /// Name of the series that could not be filled.
        series: &'static str,
    },
    /// A configuration value is out of range.
    InvalidConfig(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Npy(ndarray_npy::WriteNpyError),
}

impl std::fmt::Display for PupilError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid tracking input: {}", msg),
            Self::InsufficientData { needed, got } => {
                write!(f, "insufficient data: need {} valid frames, got {}", needed, got)
            }
            Self::NoValidFrames => write!(f, "no valid frames in trace"),
            Self::NoAnchors { series } => {
                write!(f, "cannot interpolate '{}': no good frame to anchor on", series)
            }
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Json(e) => write!(f, "json error: {}", e),
            Self::Csv(e) => write!(f, "csv error: {}", e),
            Self::Npy(e) => write!(f, "npy error: {}", e),
        }
    }
}

impl std::error::Error for PupilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Npy(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PupilError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PupilError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<csv::Error> for PupilError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<ndarray_npy::WriteNpyError> for PupilError {
    fn from(e: ndarray_npy::WriteNpyError) -> Self {
        Self::Npy(e)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PupilError>;
