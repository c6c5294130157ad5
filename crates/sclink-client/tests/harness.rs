//! Shared helpers for the client integration tests.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::time::Duration;

use sclink_client::config::ConnectionSettings;
use sclink_client::testing::MockServer;
use sclink_client::Connection;

pub const URL: &str = "ws://mock.sc-server/ws_json";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn settings(retries: u32, retry_delay: Duration) -> ConnectionSettings {
    ConnectionSettings {
        retries,
        retry_delay,
        ..ConnectionSettings::default()
    }
}

pub async fn connected(server: &MockServer, settings: ConnectionSettings) -> Connection {
    init_tracing();
    let conn = Connection::with_connector(settings, server.connector());
    conn.connect(URL).await.expect("connect");
    conn
}

/// Poll `cond` for up to one second.
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    cond()
}
