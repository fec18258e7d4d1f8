//! Loopback tests for the native WebSocket transport.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use webchannel_client::{TransportError, TransportFactory, WsTransportFactory};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn dials_exchanges_frames_and_closes_gracefully() {
    init_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text("init".into())).await.unwrap();

        let frame = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => break text.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("server expected a text frame, got {other:?}"),
            }
        };
        assert_eq!(frame, "hello");

        // The client close should arrive as a normal-closure frame.
        let mut saw_close = false;
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                saw_close = true;
                break;
            }
        }
        saw_close
    });

    let dialed = WsTransportFactory::new()
        .dial(&format!("ws://{addr}"))
        .await
        .unwrap();
    assert!(dialed.handle.is_open());
    assert!(format!("{dialed:?}").contains("open: true"));

    let mut incoming = dialed.incoming;
    assert_eq!(incoming.next().await.as_deref(), Some("init"));

    dialed.handle.send("hello".to_string()).unwrap();
    dialed.handle.close().await.unwrap();
    assert!(!dialed.handle.is_open());

    assert!(server.await.unwrap(), "server never saw the close frame");

    // The frame stream ends once the transport is down.
    assert_eq!(incoming.next().await, None);
}

#[tokio::test]
async fn rejects_endpoints_that_are_not_websocket_urls() {
    let factory = WsTransportFactory::new();

    let err = factory.dial("not a url").await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidEndpoint(_)));

    let err = factory.dial("http://127.0.0.1:9000").await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidEndpoint(_)));
}

#[tokio::test]
async fn dial_failure_surfaces_as_connect_error() {
    // Nothing listens here; the dial itself must fail.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = WsTransportFactory::new()
        .dial(&format!("ws://{addr}"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)));
}

#[tokio::test]
async fn send_after_close_reports_a_send_error() {
    init_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let dialed = WsTransportFactory::new()
        .dial(&format!("ws://{addr}"))
        .await
        .unwrap();
    dialed.handle.close().await.unwrap();
    server.await.unwrap();

    let err = dialed.handle.send("too late".to_string()).unwrap_err();
    assert!(matches!(err, TransportError::Send(_)));
}
