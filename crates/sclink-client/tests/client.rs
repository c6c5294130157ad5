#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod harness;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use sclink_client::testing::MockServer;
use sclink_client::{Connection, EventCallback, KeynodeParams, ScClient, SubscriptionParams};
use sclink_core::error::ErrorKind;
use sclink_core::protocol::{EventTriple, Request, RequestType, Response, ScAddr, ScEventType};

use harness::{eventually, settings, URL};

/// Answers `events` requests like sc-server: sequential ids for creates, ok for deletes.
fn kb_server() -> MockServer {
    let server = MockServer::new();
    let next_sub = Arc::new(AtomicU64::new(19));
    server.respond_with(move |req: &Request| {
        let payload = match req.request_type {
            RequestType::Events => match req.payload.get("create").and_then(Value::as_array) {
                Some(create) => Value::Array(
                    create
                        .iter()
                        .map(|_| json!(next_sub.fetch_add(1, Ordering::SeqCst)))
                        .collect(),
                ),
                None => Value::Null,
            },
            RequestType::CheckElements => json!([11, 22]),
            RequestType::Keynodes => json!([100, 101]),
            _ => Value::Null,
        };
        Some(Response::ok(req.id, payload))
    });
    server
}

async fn client(server: &MockServer) -> ScClient {
    harness::init_tracing();
    let client = ScClient::from_connection(Connection::with_connector(
        settings(1, Duration::ZERO),
        server.connector(),
    ));
    client.connect(URL).await.unwrap();
    client
}

fn forwarding(tx: mpsc::UnboundedSender<EventTriple>) -> EventCallback {
    EventCallback::task(move |triple| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(triple);
        }
    })
}

#[tokio::test]
async fn check_elements_returns_types() {
    let server = kb_server();
    let client = client(&server).await;

    let types = client.check_elements(&[ScAddr(1), ScAddr(2)]).await.unwrap();
    assert_eq!(types, vec![11, 22]);

    let req = &server.received_requests()[0];
    assert_eq!(req.request_type, RequestType::CheckElements);
    assert_eq!(req.payload, json!([1, 2]));
}

#[tokio::test]
async fn check_elements_of_nothing_skips_the_server() {
    let server = kb_server();
    let client = client(&server).await;

    assert!(client.check_elements(&[]).await.unwrap().is_empty());
    assert_eq!(server.received_count(), 0);
}

#[tokio::test]
async fn delete_elements_returns_status() {
    let server = kb_server();
    let client = client(&server).await;

    assert!(client.delete_elements(&[ScAddr(8)]).await.unwrap());
    assert_eq!(server.received_requests()[0].payload, json!([8]));
}

#[tokio::test]
async fn resolve_keynodes_shapes_find_and_resolve() {
    let server = kb_server();
    let client = client(&server).await;

    let addrs = client
        .resolve_keynodes(&[KeynodeParams::find("nrel_main_idtf"), KeynodeParams::resolve("my_node", 33)])
        .await
        .unwrap();
    assert_eq!(addrs, vec![ScAddr(100), ScAddr(101)]);

    let req = &server.received_requests()[0];
    assert_eq!(
        req.payload,
        json!([
            {"command": "find", "idtf": "nrel_main_idtf"},
            {"command": "resolve", "idtf": "my_node", "elType": 33}
        ])
    );
}

#[tokio::test]
async fn scenario_b_event_reaches_callback() {
    let server = kb_server();
    let client = client(&server).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subs = client
        .create_event_subscriptions(vec![SubscriptionParams::new(
            ScAddr(1183238),
            ScEventType::AddOutgoingEdge,
            forwarding(tx),
        )])
        .await
        .unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].id, 19);
    assert!(client.is_subscription_valid(19));

    let req = &server.received_requests()[0];
    assert_eq!(req.payload, json!({"create": [{"type": "add_outgoing_edge", "addr": 1183238}]}));

    assert!(server.inject(r#"{"id":19,"status":true,"event":true,"payload":[1183238,0,0],"errors":null}"#));
    let triple = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(triple, EventTriple(ScAddr(1183238), ScAddr(0), ScAddr(0)));
}

#[tokio::test]
async fn subscription_lifecycle() {
    let server = kb_server();
    let client = client(&server).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subs = client
        .create_event_subscriptions(vec![
            SubscriptionParams::new(ScAddr(5), ScEventType::AddIngoingEdge, forwarding(tx.clone())),
            SubscriptionParams::new(ScAddr(6), ScEventType::RemoveElement, forwarding(tx)),
        ])
        .await
        .unwrap();
    let ids: Vec<u64> = subs.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![19, 20]);

    let triple = EventTriple(ScAddr(5), ScAddr(1), ScAddr(2));
    for _ in 0..3 {
        assert!(server.inject_event(19, triple));
    }
    for _ in 0..3 {
        assert_eq!(rx.recv().await.unwrap(), triple);
    }

    assert!(client.destroy_event_subscriptions(&[19]).await.unwrap());
    assert!(!client.is_subscription_valid(19));
    assert!(client.is_subscription_valid(20));
    assert_eq!(server.received_requests()[1].payload, json!({"delete": [19]}));

    assert!(server.inject_event(19, triple));
    let metrics = client.connection().metrics();
    assert!(eventually(|| metrics.events.get(&[("outcome", "orphaned")]) == 1).await);
    assert!(rx.try_recv().is_err());
    assert_eq!(metrics.events.get(&[("outcome", "dispatched")]), 3);
}

#[tokio::test]
async fn thread_callbacks_run_on_named_threads() {
    let server = kb_server();
    let client = client(&server).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    client
        .create_event_subscriptions(vec![SubscriptionParams::new(
            ScAddr(3),
            ScEventType::ChangeContent,
            EventCallback::thread(move |triple| {
                let name = std::thread::current().name().map(str::to_owned);
                let _ = tx.send((name, triple));
            }),
        )])
        .await
        .unwrap();

    let triple = EventTriple(ScAddr(3), ScAddr(0), ScAddr(0));
    assert!(server.inject_event(19, triple));
    let (name, got) = rx.recv().await.unwrap();
    assert_eq!(name.as_deref(), Some("sc-event-19"));
    assert_eq!(got, triple);
}

#[tokio::test]
async fn explicit_connect_clears_subscriptions() {
    let server = kb_server();
    let client = client(&server).await;
    let (tx, _rx) = mpsc::unbounded_channel();

    client
        .create_event_subscriptions(vec![SubscriptionParams::new(
            ScAddr(3),
            ScEventType::AddOutgoingEdge,
            forwarding(tx),
        )])
        .await
        .unwrap();
    assert!(client.is_subscription_valid(19));

    client.connect(URL).await.unwrap();
    assert!(!client.is_subscription_valid(19));
}

#[tokio::test]
async fn server_errors_become_errors() {
    let server = MockServer::new();
    server.respond_with(|req| {
        Some(Response {
            id: req.id,
            status: false,
            payload: Value::Null,
            errors: Some(json!("element not found")),
        })
    });
    let client = client(&server).await;

    let err = client.delete_elements(&[ScAddr(1)]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerReported);
    assert!(err.to_string().contains("element not found"));
}

#[tokio::test]
async fn unexpected_payload_shape_is_bad_frame() {
    let server = MockServer::new();
    server.respond_with(|req| Some(Response::ok(req.id, json!({"not": "a list"}))));
    let client = client(&server).await;

    let err = client.check_elements(&[ScAddr(1)]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFrame);
}

#[tokio::test]
async fn metrics_render_prometheus_text() {
    let server = kb_server();
    let client = client(&server).await;
    client.check_elements(&[ScAddr(1)]).await.unwrap();

    let text = client.connection().metrics().render();
    assert!(text.contains("sclink_requests_total{type=\"check_elements\"} 1"));
    assert!(text.contains("# TYPE sclink_round_trip_micros histogram"));
}
