//! MogileFS Error Definitions
//!
//! This module defines all error types for the MogileFS client.
//! Errors fall into transport errors (which the tracker pool absorbs and
//! retries), protocol errors (fatal to the current request), tracker
//! rejections (legitimate answers surfaced verbatim), and client errors.

use thiserror::Error;

/// Result type alias for MogileFS operations
pub type Result<T> = std::result::Result<T, MogileError>;

/// Tracker error code returned when a listing or lookup matched nothing
pub const ERR_NONE_MATCH: &str = "none_match";

/// Tracker error code returned when a key does not exist
pub const ERR_UNKNOWN_KEY: &str = "unknown_key";

/// Base error type for all MogileFS errors
#[derive(Error, Debug)]
pub enum MogileError {
    /// Client has been closed
    #[error("Client is closed")]
    ClientClosed,

    /// TCP connect, send or receive failed
    #[error("Network error during {operation} to {addr}: {source}")]
    Connection {
        /// Step that failed: connect, read or write
        operation: String,
        /// Tracker address
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Connection timeout
    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    /// Network I/O timeout
    #[error("Network timeout during {0}")]
    NetworkTimeout(String),

    /// The liveness probe did not come back `OK`
    #[error("Tracker {addr} failed liveness probe: {reason}")]
    ProbeFailed {
        /// Tracker address
        addr: String,
        /// What came back instead of `OK`
        reason: String,
    },

    /// The response line does not follow the wire grammar
    #[error("Cannot parse response: {0}")]
    Parse(String),

    /// A command decoder found a missing or ill-formed key
    #[error("Malformed response at key '{key}': {reason}")]
    MalformedResponse {
        /// Response key that was missing or invalid
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// The tracker answered `ERR <code> <message>`
    #[error("Tracker error ({code}): {message}")]
    Tracker {
        /// Error code, e.g. `unknown_key`
        code: String,
        /// Decoded human-readable message
        message: String,
    },

    /// Every tracker failed within the forgiveness window
    #[error("Seems all trackers failed lately")]
    PoolExhausted,

    /// All dispatch attempts failed on transport
    #[error("No tracker usable after {attempts} attempts")]
    NoUsableTracker {
        /// Number of trackers tried
        attempts: usize,
    },

    /// Invalid argument was provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The tracker knows no location for the key
    #[error("File not found: {domain}/{key}")]
    FileNotFound {
        /// Domain that was searched
        domain: String,
        /// Missing key
        key: String,
    },

    /// Every storage URL returned by the tracker failed
    #[error("No usable location to {operation} file '{key}'")]
    NoUsableLocation {
        /// Key being read or written
        key: String,
        /// `get` or `put`
        operation: String,
    },

    /// HTTP transfer against a storage node failed
    #[error("HTTP error for {url}: {reason}")]
    Http {
        /// Storage URL
        url: String,
        /// Transport error or HTTP status
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MogileError {
    /// Builds a `MalformedResponse` naming the offending key
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        MogileError::MalformedResponse {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that say something about the tracker's health
    /// rather than about the request.
    ///
    /// The pool blacklists the tracker and moves on when this holds; anything
    /// else is surfaced to the caller as-is.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MogileError::Connection { .. }
                | MogileError::ConnectionTimeout(_)
                | MogileError::NetworkTimeout(_)
                | MogileError::ProbeFailed { .. }
        )
    }

    /// Returns the tracker error code if this is a tracker rejection
    pub fn tracker_code(&self) -> Option<&str> {
        match self {
            MogileError::Tracker { code, .. } => Some(code),
            _ => None,
        }
    }
}
