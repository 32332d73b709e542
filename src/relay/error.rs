//! Error types for the websocket relay.

use thiserror::Error;

/// Errors from relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Cannot bind relay listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
}
