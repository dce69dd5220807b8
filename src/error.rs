//! Error types for rangetrack

use thiserror::Error;

/// Result type alias for rangetrack operations
pub type Result<T> = std::result::Result<T, TrackError>;

/// Error types that can occur in rangetrack
#[derive(Debug, Error)]
pub enum TrackError {
    /// I/O error from the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A byte-range request extended past the end of the resource
    #[error("Byte range out of bounds: offset {offset}, requested {requested:?}, resource length {length:?}")]
    OutOfRange {
        /// Requested start offset
        offset: u64,
        /// Requested size, if bounded
        requested: Option<u64>,
        /// Resource length, when known
        length: Option<u64>,
    },

    /// A chromosome or sequence name is not present in the file's dictionary
    #[error("Not present in file: {name}")]
    DataMissing {
        /// The name that was looked up
        name: String,
    },

    /// Malformed file contents
    #[error("Invalid file format: {msg}")]
    Format {
        /// What was wrong, with the offending offset where meaningful
        msg: String,
    },

    /// HTTP error (network feature)
    #[cfg(feature = "network")]
    #[error("HTTP error {status}: {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// URL that failed
        url: String,
    },

    /// Network transport error (network feature)
    #[cfg(feature = "network")]
    #[error("Network error: {0}")]
    Network(String),
}

impl TrackError {
    /// Shorthand for a [`TrackError::Format`] error.
    pub fn format(msg: impl Into<String>) -> Self {
        TrackError::Format { msg: msg.into() }
    }

    /// True when this error is an out-of-range byte request. Used by the
    /// buffered loader to decide whether an unbounded retry is worthwhile.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, TrackError::OutOfRange { .. })
    }
}
