//! End-to-end checks against a real WebSocket server on loopback.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use hostlink_connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, HostEvent, HostEvents,
};
use hostlink_protocol::{Message, Origin};

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for_state(events: &mut HostEvents, want: ConnectionState) {
    loop {
        let ev = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for state")
            .expect("event channel closed");
        if let HostEvent::StateChanged { state, .. } = ev
            && state == want
        {
            return;
        }
    }
}

#[tokio::test]
async fn heartbeat_dispatch_send_and_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (path_tx, path_rx) = oneshot::channel::<String>();
    let (got_tx, got_rx) = oneshot::channel::<Vec<String>>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let record_path = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = path_tx.send(req.uri().path().to_string());
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, record_path)
            .await
            .unwrap();

        let mut received = Vec::new();
        // Heartbeat first, then the client's message.
        while received.len() < 2 {
            match ws.next().await {
                Some(Ok(tungstenite::Message::Text(t))) => {
                    received.push(t.as_str().to_string());
                    if received.len() == 1 {
                        ws.send(tungstenite::Message::Text(
                            r#"{"type":"deploy_status","ok":true}"#.into(),
                        ))
                        .await
                        .unwrap();
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("unexpected server read: {other:?}"),
            }
        }
        let _ = got_tx.send(received);
        ws.close(None).await.unwrap();
        // Keep the listener alive but never accept again.
        listener
    });

    let mut config = ConnectionConfig::with_origin(Origin::new(false, addr.to_string()));
    config.base_delay_ms = 50;
    let mgr = ConnectionManager::new(config);

    let mut events = mgr.connect("host1", "secret-token").await;
    wait_for_state(&mut events, ConnectionState::Open).await;
    assert!(mgr.is_connected("host1").await);
    assert_eq!(path_rx.await.unwrap(), "/api/ws/agent/secret-token");

    // Server pushes an application frame after seeing the heartbeat.
    let message = loop {
        let ev = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        if let HostEvent::Message { host_id, message } = ev {
            assert_eq!(host_id, "host1");
            break message;
        }
    };
    assert_eq!(message.msg_type(), Some("deploy_status"));
    assert_eq!(message.get("ok"), Some(&serde_json::json!(true)));

    let outbound = Message::from(serde_json::json!({"type": "get_status"}));
    assert!(mgr.send("host1", &outbound).await);

    let received = tokio::time::timeout(WAIT, got_rx).await.unwrap().unwrap();
    let heartbeat = Message::decode(&received[0]).unwrap();
    assert!(heartbeat.is_heartbeat());
    assert!(heartbeat.get("timestamp").and_then(|t| t.as_i64()).is_some());
    assert_eq!(Message::decode(&received[1]).unwrap(), outbound);

    // Server closed the link: the session schedules a reconnect.
    wait_for_state(
        &mut events,
        ConnectionState::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(50),
        },
    )
    .await;
    assert!(!mgr.is_connected("host1").await);
    assert!(!mgr.send("host1", &outbound).await);

    tokio::time::timeout(WAIT, mgr.shutdown()).await.unwrap();
    assert!(mgr.hosts().await.is_empty());
    let _listener = server.await.unwrap();
}

#[tokio::test]
async fn unreachable_agent_gives_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = ConnectionConfig::with_origin(Origin::new(false, addr.to_string()));
    config.base_delay_ms = 10;
    config.max_attempts = 2;
    let mgr = ConnectionManager::new(config);

    let mut events = mgr.connect("host1", "tok").await;
    let mut errors = 0;
    let mut last = None;
    while let Some(ev) = tokio::time::timeout(WAIT, events.recv()).await.unwrap() {
        match ev {
            HostEvent::Error { .. } => errors += 1,
            HostEvent::StateChanged { state, .. } => last = Some(state),
            HostEvent::Message { .. } => panic!("no messages expected"),
        }
    }
    assert_eq!(errors, 3);
    assert_eq!(last, Some(ConnectionState::Disconnected));
    assert!(!mgr.is_connected("host1").await);
}
