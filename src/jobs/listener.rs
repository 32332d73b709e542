//! UDP subject listener.
//!
//! One datagram carries one subject. There is no framing and no reply.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::JobError;
use super::queue::JobQueue;

/// Largest datagram accepted; longer subjects are truncated by the kernel.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Handle to the subject listener.
#[derive(Debug, Clone)]
pub struct NotifyServer {
    local_addr: Option<SocketAddr>,
    shutdown: CancellationToken,
}

impl NotifyServer {
    /// Start listening, logging instead of failing when the port is taken.
    pub async fn start(address: &str, port: u16, queue: JobQueue) -> Self {
        match Self::bind(address, port, queue).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!("[notify] disabled: {e}");
                Self {
                    local_addr: None,
                    shutdown: CancellationToken::new(),
                }
            }
        }
    }

    /// Bind the socket and spawn the receive loop.
    pub async fn bind(address: &str, port: u16, queue: JobQueue) -> Result<Self, JobError> {
        let addr = format!("{address}:{port}");
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| JobError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| JobError::Bind { addr, source })?;

        let shutdown = CancellationToken::new();
        crate::log_event!("notify", "listening", "udp://{local_addr}");
        tokio::spawn(receive_loop(socket, queue, shutdown.clone()));

        Ok(Self {
            local_addr: Some(local_addr),
            shutdown,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.local_addr.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Decode a datagram into a subject. Trailing whitespace is dropped.
fn parse_subject(datagram: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(datagram);
    let subject = text.trim_end();
    (!subject.is_empty()).then(|| subject.to_string())
}

async fn receive_loop(socket: UdpSocket, queue: JobQueue, shutdown: CancellationToken) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => {
                    let Some(subject) = parse_subject(&buf[..len]) else {
                        continue;
                    };
                    crate::debug_event!("notify", "subject", "{subject} from {from}");
                    queue.on_subject(&subject);
                }
                Err(e) => {
                    tracing::warn!("[notify] receive failed: {e}");
                }
            },
            _ = shutdown.cancelled() => {
                crate::log_event!("notify", "stopped");
                break;
            }
        }
    }
}

/// Send one subject datagram to a notify server.
pub async fn send_subject(target: &str, subject: &str) -> Result<(), JobError> {
    let send_err = |source| JobError::Send {
        addr: target.to_string(),
        source,
    };

    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(send_err)?;
    socket
        .send_to(subject.as_bytes(), target)
        .await
        .map_err(send_err)?;
    Ok(())
}
