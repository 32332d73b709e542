//! Error types for the job queue and notify server.

use thiserror::Error;

/// Errors from job configuration and the subject listener.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid job pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot bind notify server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send subject to {addr}: {source}")]
    Send {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Task runner failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
