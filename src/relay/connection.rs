//! Registry of live relay connections.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Handle identifying one client connection.
pub type ConnectionId = u64;

/// Lifecycle of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// Close frame received, connection is winding down.
    Closing,
    Closed,
}

#[derive(Debug)]
struct Peer {
    state: ConnectionState,
    outbound: mpsc::UnboundedSender<Message>,
}

/// Set of live connections, each appearing at most once.
///
/// Iteration follows connection order. The lock is never held across an
/// await point.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    peers: Mutex<IndexMap<ConnectionId, Peer>>,
    next_id: AtomicU64,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new open connection.
    ///
    /// Returns its id and the receiving end of its outbound queue.
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, rx) = mpsc::unbounded_channel();
        self.peers.lock().insert(
            id,
            Peer {
                state: ConnectionState::Open,
                outbound,
            },
        );
        (id, rx)
    }

    /// Remove a connection. Dropping its sender ends the writer task.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.peers.lock().shift_remove(&id).is_some()
    }

    pub fn set_state(&self, id: ConnectionId, state: ConnectionState) {
        if let Some(peer) = self.peers.lock().get_mut(&id) {
            peer.state = state;
        }
    }

    /// State of a connection; `Closed` once it has been removed.
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.peers
            .lock()
            .get(&id)
            .map_or(ConnectionState::Closed, |peer| peer.state)
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Forward `message` to every open connection except `origin`.
    ///
    /// Each send is independent: a peer whose queue is gone is skipped and
    /// the rest still receive the message. Returns the number of queued
    /// deliveries.
    pub fn fan_out(&self, origin: Option<ConnectionId>, message: &Message) -> usize {
        let targets: Vec<(ConnectionId, mpsc::UnboundedSender<Message>)> = self
            .peers
            .lock()
            .iter()
            .filter(|(id, peer)| Some(**id) != origin && peer.state == ConnectionState::Open)
            .map(|(id, peer)| (*id, peer.outbound.clone()))
            .collect();

        crate::log_event!("relay", "sending message", "to {} clients", targets.len());

        let mut delivered = 0;
        for (id, outbound) in targets {
            match outbound.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => crate::debug_event!("relay", "send skipped", "client {id} gone"),
            }
        }
        delivered
    }
}
