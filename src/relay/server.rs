//! Websocket listener and per-client tasks.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::connection::{ConnectionSet, ConnectionState};
use super::error::RelayError;

/// Handle to a running (or disabled) relay.
///
/// Cheap to clone; all clones share one connection set.
#[derive(Clone, Debug)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

#[derive(Debug)]
struct RelayInner {
    connections: Arc<ConnectionSet>,
    /// `None` when the listener could not be bound.
    local_addr: Option<SocketAddr>,
    shutdown: CancellationToken,
}

impl Relay {
    /// Start the relay, logging instead of failing when the port is taken.
    ///
    /// Check [`Relay::is_enabled`] before assuming a listener exists.
    pub async fn start(host: &str, port: u16) -> Self {
        match Self::bind((host, port)).await {
            Ok(relay) => relay,
            Err(e) => {
                tracing::error!("[relay] disabled: {e}");
                Self::disabled()
            }
        }
    }

    /// Bind the listener and spawn the accept loop.
    pub async fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self, RelayError> {
        let label = format!("{addr:?}");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: label.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| RelayError::Bind { addr: label, source })?;

        let relay = Self {
            inner: Arc::new(RelayInner {
                connections: Arc::new(ConnectionSet::new()),
                local_addr: Some(local_addr),
                shutdown: CancellationToken::new(),
            }),
        };

        crate::log_event!("relay", "listening", "ws://{local_addr}");
        tokio::spawn(accept_loop(
            listener,
            relay.inner.connections.clone(),
            relay.inner.shutdown.clone(),
        ));

        Ok(relay)
    }

    /// A relay without a listener. Injected messages go nowhere.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                connections: Arc::new(ConnectionSet::new()),
                local_addr: None,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.local_addr.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    pub fn connections(&self) -> &Arc<ConnectionSet> {
        &self.inner.connections
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Push a message to every open client, as if a peer had sent it.
    pub fn inject(&self, message: Message) -> usize {
        if !self.is_enabled() {
            crate::debug_event!("relay", "dropped", "relay disabled");
            return 0;
        }
        self.inner.connections.fan_out(None, &message)
    }

    /// Stop accepting and close every client task.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    connections: Arc<ConnectionSet>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        connections.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!("[relay] accept failed: {e}");
                }
            },
            _ = shutdown.cancelled() => {
                crate::log_event!("relay", "stopped");
                break;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    connections: Arc<ConnectionSet>,
    shutdown: CancellationToken,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            let e = RelayError::from(e);
            crate::debug_event!("relay", "rejected", "{peer}: {e}");
            return;
        }
    };

    let (id, mut outbound) = connections.register();
    crate::log_event!("relay", "client connected", "{peer} ({})", connections.len());

    let (mut sink, mut incoming) = ws.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(message)) if message.is_text() || message.is_binary() => {
                    connections.fan_out(Some(id), &message);
                }
                Some(Ok(Message::Close(_))) => {
                    connections.set_state(id, ConnectionState::Closing);
                    break;
                }
                // Ping/pong replies are handled by the protocol layer
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    crate::debug_event!("relay", "read error", "{peer}: {e}");
                    break;
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    connections.remove(id);
    let _ = writer.await;
    crate::log_event!("relay", "client disconnected", "{peer} ({})", connections.len());
    if connections.is_empty() {
        crate::debug_event!("relay", "idle", "no clients connected");
    }
}
