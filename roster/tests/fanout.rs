#![cfg(feature = "test-utils")]

use futures::StreamExt;
use roster::auth::TokenVerifier;
use roster::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use roster::fanout::{FanoutChannel, PushServer, PushServerHandle};
use roster::notification::NotificationService;
use roster::store::notification::memory::MemoryNotificationStore;
use roster::test_utils::auth::{admin_token, test_verifier};
use roster::test_utils::notify::wait_until;
use roster::types::{NotificationPayload, PushFrame};
use roster_config::shared::PushConfig;
use roster_telemetry::tracing::init_test_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestPushServer {
    addr: SocketAddr,
    channel: FanoutChannel,
    shutdown_tx: ShutdownTx,
    handle: PushServerHandle,
}

impl TestPushServer {
    async fn spawn() -> Self {
        let config = PushConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            path: PushConfig::DEFAULT_PATH.to_string(),
            subscriber_buffer: 16,
        };
        let channel = FanoutChannel::new(config.subscriber_buffer);
        let verifier: Arc<dyn TokenVerifier> = Arc::new(test_verifier());

        let server = PushServer::bind(&config, channel.clone(), verifier)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let handle = server.start(shutdown_rx);

        Self {
            addr,
            channel,
            shutdown_tx,
            handle,
        }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("ws://{}{path_and_query}", self.addr)
    }

    async fn connect(&self, path_and_query: &str) -> Client {
        let (client, _) = tokio_tungstenite::connect_async(self.url(path_and_query))
            .await
            .unwrap();
        client
    }

    async fn stop(self) {
        self.shutdown_tx.shutdown();
        self.handle.wait().await.unwrap();
    }
}

async fn next_frame(client: &mut Client) -> PushFrame {
    match client.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn expect_policy_close(client: &mut Client, reason: &str) {
    match client.next().await {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert_eq!(frame.reason.as_str(), reason);
        }
        other => panic!("expected a policy close frame, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_token_is_closed_before_any_frame() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;

    let mut client = server.connect("/ws/notifications").await;

    expect_policy_close(&mut client, "Unauthorized").await;
    assert_eq!(server.channel.subscriber_count(), 0);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_token_is_closed_with_policy_violation() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;

    let mut client = server.connect("/ws/notifications?token=forged").await;

    expect_policy_close(&mut client, "Invalid token").await;
    assert_eq!(server.channel.subscriber_count(), 0);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_path_is_rejected_during_the_upgrade() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;

    let result = tokio_tungstenite::connect_async(server.url("/elsewhere")).await;

    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
        other => panic!("expected an HTTP 404, got {other:?}"),
    }

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connected_frame_comes_first_then_notifications() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;
    let service = NotificationService::new(
        Arc::new(MemoryNotificationStore::new()),
        Some(server.channel.clone()),
    );

    let mut client = server
        .connect(&format!("/ws/notifications?token={}", admin_token()))
        .await;

    assert_eq!(next_frame(&mut client).await, PushFrame::Connected);
    assert_eq!(server.channel.subscriber_count(), 1);

    let payload = service
        .create("Staff queued", "3 staff records queued")
        .await
        .unwrap();

    assert_eq!(
        next_frame(&mut client).await,
        PushFrame::Notification { data: payload }
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn every_subscriber_receives_each_notification() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;
    let service = NotificationService::new(
        Arc::new(MemoryNotificationStore::new()),
        Some(server.channel.clone()),
    );
    let url = format!("/ws/notifications?token={}", admin_token());

    let mut first = server.connect(&url).await;
    let mut second = server.connect(&url).await;
    assert_eq!(next_frame(&mut first).await, PushFrame::Connected);
    assert_eq!(next_frame(&mut second).await, PushFrame::Connected);

    let payload = service.create("CSV import", "11 rows queued").await.unwrap();
    let expected = PushFrame::Notification { data: payload };

    assert_eq!(next_frame(&mut first).await, expected);
    assert_eq!(next_frame(&mut second).await, expected);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnected_subscribers_leave_the_registry() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;

    let mut client = server
        .connect(&format!("/ws/notifications?token={}", admin_token()))
        .await;
    assert_eq!(next_frame(&mut client).await, PushFrame::Connected);

    client.close(None).await.unwrap();
    let channel = server.channel.clone();
    wait_until(|| channel.subscriber_count() == 0).await;

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_open_subscribers() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;

    let mut client = server
        .connect(&format!("/ws/notifications?token={}", admin_token()))
        .await;
    assert_eq!(next_frame(&mut client).await, PushFrame::Connected);

    server.stop().await;

    match client.next().await {
        Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Away),
        other => panic!("expected a close frame, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn publishing_without_subscribers_is_a_noop() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;
    let service = NotificationService::new(
        Arc::new(MemoryNotificationStore::new()),
        Some(server.channel.clone()),
    );

    service.create("Staff delete", "1 staff record queued").await.unwrap();

    assert_eq!(server.channel.subscriber_count(), 0);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_completes_while_a_subscriber_stops_reading() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;

    let mut stalled = server
        .connect(&format!("/ws/notifications?token={}", admin_token()))
        .await;
    assert_eq!(next_frame(&mut stalled).await, PushFrame::Connected);

    // Large frames fill the socket buffers since the client never reads again.
    let payload = NotificationPayload {
        id: "0192f0c4-6c1b-7a3e-9a55-2c9f1d3e4b5a".to_string(),
        title: "Bulk import".to_string(),
        message: "x".repeat(256 * 1024),
        created_at: "2025-03-01T09:30:00.000Z".to_string(),
        read: false,
    };
    let mut backed_up = false;
    for _ in 0..2_000 {
        if server.channel.publish(&payload) == 0 {
            backed_up = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(backed_up, "subscriber buffer never filled up");

    tokio::time::timeout(Duration::from_secs(10), server.stop())
        .await
        .expect("push server did not stop with a stalled subscriber");

    drop(stalled);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_completes_while_a_peer_never_upgrades() {
    init_test_tracing();
    let server = TestPushServer::spawn().await;

    let _silent = TcpStream::connect(server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), server.stop())
        .await
        .expect("push server did not stop with a silent peer");
}
