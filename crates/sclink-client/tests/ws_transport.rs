#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod harness;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use sclink_client::transport::codec::{classify, decode, Decoded};
use sclink_client::transport::TransportError;
use sclink_client::{Connection, Hooks};
use sclink_core::error::{ErrorKind, ScError};
use sclink_core::protocol::{decode_request, RequestType, Response};

use harness::{eventually, settings};

/// One-client sc-server: answers every request with `[11, 22]`, optionally
/// closing the socket right after the first answer.
async fn serve_once(close_after_reply: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let req = decode_request(&text).unwrap();
            let reply = Response::ok(req.id, json!([11, 22])).to_frame();
            if ws.send(Message::Text(reply)).await.is_err() {
                break;
            }
            if close_after_reply {
                let _ = ws.close(None).await;
            }
        }
    });
    format!("ws://{addr}/ws_json")
}

struct Seen {
    closed: AtomicUsize,
    errors: Mutex<Vec<ErrorKind>>,
}

fn watch(conn: &Connection) -> Arc<Seen> {
    let seen = Arc::new(Seen {
        closed: AtomicUsize::new(0),
        errors: Mutex::new(Vec::new()),
    });
    let (a, b) = (seen.clone(), seen.clone());
    conn.set_hooks(
        Hooks::new()
            .on_close(move || {
                a.closed.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |err: &ScError| {
                b.errors.lock().unwrap().push(err.kind());
            }),
    );
    seen
}

#[tokio::test]
async fn round_trip_then_server_close_is_a_lost_link() {
    harness::init_tracing();
    let url = serve_once(true).await;
    let conn = Connection::new(settings(0, Duration::ZERO));
    let seen = watch(&conn);

    conn.connect(&url).await.unwrap();
    assert!(conn.is_connected());

    let resp = conn.send(RequestType::CheckElements, &json!([1, 2])).await.unwrap();
    assert_eq!(resp.id, 1);
    assert_eq!(resp.payload, json!([11, 22]));

    assert!(eventually(|| !conn.is_connected()).await);
    assert!(eventually(|| seen.errors.lock().unwrap().contains(&ErrorKind::ConnectionLost)).await);
    assert_eq!(seen.closed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn local_disconnect_is_quiet() {
    harness::init_tracing();
    let url = serve_once(false).await;
    let conn = Connection::new(settings(0, Duration::ZERO));
    let seen = watch(&conn);

    conn.connect(&url).await.unwrap();
    conn.send(RequestType::Keynodes, &json!([])).await.unwrap();
    conn.disconnect().await.unwrap();

    assert!(!conn.is_connected());
    assert_eq!(seen.closed.load(Ordering::SeqCst), 1);
    // Give the read half time to see the close reply.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seen.errors.lock().unwrap().is_empty());

    let err = conn.send(RequestType::Keynodes, &json!([])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyDisconnected);
}

#[tokio::test]
async fn secure_url_reaches_the_tls_handshake() {
    harness::init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let conn = Connection::new(settings(0, Duration::ZERO));
    let err = conn.connect(&format!("wss://{addr}/ws_json")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
    assert!(!err.to_string().contains("TLS support not compiled in"), "{err}");
}

#[test]
fn close_errors_are_clean_and_io_errors_are_lost() {
    assert!(matches!(classify(WsError::ConnectionClosed), TransportError::Closed));
    assert!(matches!(classify(WsError::AlreadyClosed), TransportError::Closed));

    let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
    match classify(WsError::Io(io)) {
        TransportError::Lost(msg) => assert!(msg.contains("reset by peer"), "{msg}"),
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn decode_keeps_text_and_skips_control_frames() {
    assert!(matches!(decode(Message::Text("{}".into())), Decoded::Text(s) if s == "{}"));
    assert!(matches!(decode(Message::Binary(b"[1]".to_vec())), Decoded::Text(s) if s == "[1]"));
    assert!(matches!(decode(Message::Binary(vec![0xff, 0xfe])), Decoded::Skip));
    assert!(matches!(decode(Message::Ping(Vec::new())), Decoded::Skip));
    assert!(matches!(decode(Message::Pong(Vec::new())), Decoded::Skip));
    assert!(matches!(decode(Message::Close(None)), Decoded::Close));
}
