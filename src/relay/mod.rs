//! Websocket relay for hot-reload notifications.
//!
//! Every message received from one client is forwarded verbatim to every
//! other open client. The relay does not parse payloads.
//!
//! # Architecture
//!
//! ```text
//! Relay (accept loop)
//!   - ConnectionSet (id -> outbound queue + state)
//!   - one reader task per client -> ConnectionSet::fan_out
//!   - one writer task per client draining its outbound queue
//! ```
//!
//! A slow client only backs up its own queue; fan-out never waits on a socket.

mod connection;
mod error;
mod server;

pub use connection::{ConnectionId, ConnectionSet, ConnectionState};
pub use error::RelayError;
pub use server::Relay;

pub use tokio_tungstenite::tungstenite::Message;

/// Port the relay listens on when none is configured.
pub const DEFAULT_PORT: u16 = 5888;
