//! End-to-end tests for the websocket relay using real clients.

use std::time::Duration;

use devrelay::relay::Message;
use devrelay::{ChangeNotifier, Notification, Relay};
use futures::{SinkExt, StreamExt};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> (Relay, String) {
    let relay = Relay::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", relay.local_addr().unwrap());
    (relay, url)
}

async fn connect(url: &str, count: usize) -> Vec<Client> {
    let mut clients = Vec::with_capacity(count);
    for _ in 0..count {
        let (ws, _) = connect_async(url).await.unwrap();
        clients.push(ws);
    }
    clients
}

/// Registration happens after the handshake, so poll until the relay sees everyone.
async fn wait_for_clients(relay: &Relay, expected: usize) {
    timeout(Duration::from_secs(2), async {
        while relay.connection_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {expected} clients, relay has {}",
            relay.connection_count()
        )
    });
}

async fn next_message(client: &mut Client) -> Message {
    timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for a message")
        .expect("stream ended")
        .expect("read error")
}

#[tokio::test]
async fn test_message_reaches_everyone_but_sender() {
    let (relay, url) = start_relay().await;
    let mut clients = connect(url.as_str(), 3).await;
    wait_for_clients(&relay, 3).await;

    clients[0].send(Message::text("reload")).await.unwrap();

    assert_eq!(next_message(&mut clients[1]).await, Message::text("reload"));
    assert_eq!(next_message(&mut clients[2]).await, Message::text("reload"));

    let echoed = timeout(Duration::from_millis(200), clients[0].next()).await;
    assert!(echoed.is_err(), "sender received its own message");

    relay.shutdown();
}

#[tokio::test]
async fn test_binary_frames_are_forwarded_unchanged() {
    let (relay, url) = start_relay().await;
    let mut clients = connect(url.as_str(), 2).await;
    wait_for_clients(&relay, 2).await;

    let payload: Vec<u8> = vec![0, 159, 146, 150, 255];
    clients[1]
        .send(Message::binary(payload.clone()))
        .await
        .unwrap();

    assert_eq!(next_message(&mut clients[0]).await, Message::binary(payload));

    relay.shutdown();
}

#[tokio::test]
async fn test_closed_client_leaves_the_fan_out() {
    let (relay, url) = start_relay().await;
    let mut clients = connect(url.as_str(), 3).await;
    wait_for_clients(&relay, 3).await;

    let mut leaving = clients.pop().unwrap();
    leaving.close(None).await.unwrap();
    wait_for_clients(&relay, 2).await;

    clients[0].send(Message::text("after close")).await.unwrap();
    assert_eq!(
        next_message(&mut clients[1]).await,
        Message::text("after close")
    );

    relay.shutdown();
}

#[tokio::test]
async fn test_injected_notification_reaches_all_clients() {
    let temp_dir = TempDir::new().unwrap();
    let static_dir = temp_dir.path().join("build").join("static");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("site.css"), "a { color: blue }").unwrap();

    let (relay, url) = start_relay().await;
    let mut clients = connect(url.as_str(), 2).await;
    wait_for_clients(&relay, 2).await;

    let notifier = ChangeNotifier::new(relay.clone(), temp_dir.path());
    let file = temp_dir
        .path()
        .canonicalize()
        .unwrap()
        .join("build/static/site.css");
    assert_eq!(notifier.notify_change(&file), 2);

    let expected = Notification::new("build/static/site.css", "a { color: blue }")
        .to_json()
        .unwrap();
    for client in clients.iter_mut() {
        assert_eq!(next_message(client).await, Message::text(expected.clone()));
    }

    relay.shutdown();
}

#[tokio::test]
async fn test_port_conflict_disables_relay() {
    let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();

    let relay = Relay::start("127.0.0.1", port).await;

    assert!(!relay.is_enabled());
    assert_eq!(relay.inject(Message::text("ignored")), 0);
}
