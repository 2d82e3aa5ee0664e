//! End-to-end tests over real QUIC.
//!
//! These tests start the production server on a loopback port and connect
//! actual QUIC clients to it.

use std::time::Duration;

use relay_client::{
    RelayClient,
    transport::{self, TransportConfig},
};
use relay_server::{DriverConfig, Server, ServerRuntimeConfig};
use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, time::timeout};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Move {
    player: String,
    x: i32,
    y: i32,
}

/// Start a real server, spawn its run loop, and return the address.
async fn start_server(driver: DriverConfig) -> String {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        driver,
        ..Default::default()
    };
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

/// Connect to server with retry. Avoids timing-dependent sleeps.
async fn connect_with_retry(addr: &str) -> RelayClient {
    let config =
        TransportConfig { connect_timeout: Duration::from_millis(500), ..TransportConfig::development() };

    for attempt in 0..20 {
        match RelayClient::connect_with_config(addr, config.clone()).await {
            Ok(client) => return client,
            Err(_) if attempt < 19 => {
                tokio::task::yield_now().await;
            },
            Err(e) => panic!("failed to connect after 20 attempts: {e}"),
        }
    }
    unreachable!()
}

/// Emit from `client` until it sees its own echo, proving its session is
/// registered.
async fn await_registered(client: &mut RelayClient) {
    client.emit("sync").await.unwrap();
    let echo: String =
        timeout(RECV_TIMEOUT, client.next_event()).await.expect("no echo").unwrap().unwrap();
    assert_eq!(echo, "sync");
}

async fn next<T: serde::de::DeserializeOwned>(client: &mut RelayClient) -> T {
    timeout(RECV_TIMEOUT, client.next_event())
        .await
        .expect("timed out waiting for event")
        .unwrap()
        .expect("connection closed")
}

#[tokio::test]
async fn client_connects_to_server() {
    let addr = start_server(DriverConfig::default()).await;
    let _client = connect_with_retry(&addr).await;
}

#[tokio::test]
async fn client_connect_fails_when_nothing_listens() {
    let config =
        TransportConfig { connect_timeout: Duration::from_millis(300), ..TransportConfig::development() };

    let result = transport::connect_with_config("127.0.0.1:9", config).await;

    assert!(result.is_err(), "should fail to connect to a closed port");
}

#[tokio::test]
async fn lone_client_receives_its_own_event() {
    let addr = start_server(DriverConfig::default()).await;
    let mut client = connect_with_retry(&addr).await;

    let sent = Move { player: "a".to_string(), x: 1, y: 2 };
    client.emit(&sent).await.unwrap();

    assert_eq!(next::<Move>(&mut client).await, sent);
}

#[tokio::test]
async fn event_reaches_every_client() {
    let addr = start_server(DriverConfig::default()).await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut client = connect_with_retry(&addr).await;
        await_registered(&mut client).await;
        clients.push(client);
    }

    // Drain sync echoes from clients that joined later.
    for (i, client) in clients.iter_mut().enumerate() {
        for _ in i + 1..3 {
            assert_eq!(next::<String>(client).await, "sync");
        }
    }

    clients[0].emit("hello").await.unwrap();

    for client in &mut clients {
        assert_eq!(next::<String>(client).await, "hello");
    }
}

#[tokio::test]
async fn closed_client_stops_receiving() {
    let addr = start_server(DriverConfig::default()).await;

    let mut a = connect_with_retry(&addr).await;
    await_registered(&mut a).await;
    let mut b = connect_with_retry(&addr).await;
    await_registered(&mut b).await;
    assert_eq!(next::<String>(&mut a).await, "sync");

    b.close();
    assert!(timeout(RECV_TIMEOUT, b.next_event::<String>()).await.unwrap().unwrap().is_none());

    a.emit("ping").await.unwrap();
    assert_eq!(next::<String>(&mut a).await, "ping");
}

#[tokio::test]
async fn exclude_sender_suppresses_echo() {
    let addr = start_server(DriverConfig { echo_to_sender: false }).await;

    let mut a = connect_with_retry(&addr).await;
    let mut b = connect_with_retry(&addr).await;

    // Without echo, registration is proven by b hearing a.
    loop {
        a.emit("probe").await.unwrap();
        if let Ok(Ok(Some(probe))) =
            timeout(Duration::from_millis(200), b.next_event::<String>()).await
        {
            assert_eq!(probe, "probe");
            break;
        }
    }

    b.emit("from b").await.unwrap();
    assert_eq!(next::<String>(&mut a).await, "from b");
}

#[tokio::test]
async fn raw_payload_is_relayed_unchanged() {
    let addr = start_server(DriverConfig::default()).await;
    let mut client = connect_with_retry(&addr).await;

    let payload = vec![0xde, 0xad, 0xbe, 0xef];
    client.emit_raw(payload.clone()).await.unwrap();

    let received = timeout(RECV_TIMEOUT, client.next_raw()).await.unwrap().unwrap().unwrap();
    assert_eq!(received.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn events_from_one_client_keep_their_order() {
    let addr = start_server(DriverConfig::default()).await;
    let mut client = connect_with_retry(&addr).await;

    for i in 0..100u32 {
        client.emit(&i).await.unwrap();
    }

    for i in 0..100u32 {
        assert_eq!(next::<u32>(&mut client).await, i);
    }
}

#[tokio::test]
async fn shutdown_disconnects_clients() {
    let config = ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() };
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap().to_string();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let mut client = connect_with_retry(&addr).await;
    await_registered(&mut client).await;

    stop_tx.send(()).unwrap();
    let stats = timeout(RECV_TIMEOUT, running).await.unwrap().unwrap().unwrap();

    assert_eq!(stats.broadcasts, 1);
    assert!(timeout(RECV_TIMEOUT, client.next_event::<String>()).await.unwrap().unwrap().is_none());
}

#[tokio::test]
async fn dropped_client_leaves_active_set() {
    let config = ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() };
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap().to_string();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let mut a = connect_with_retry(&addr).await;
    await_registered(&mut a).await;
    let mut b = connect_with_retry(&addr).await;
    await_registered(&mut b).await;
    assert_eq!(next::<String>(&mut a).await, "sync");

    // No close(): dropping the handle alone must end the session.
    drop(b);
    tokio::time::sleep(Duration::from_millis(500)).await;

    a.emit("ping").await.unwrap();
    assert_eq!(next::<String>(&mut a).await, "ping");

    stop_tx.send(()).unwrap();
    let stats = timeout(RECV_TIMEOUT, running).await.unwrap().unwrap().unwrap();

    // sync from a (to a), sync from b (to a and b), ping (to a only).
    assert_eq!(stats.broadcasts, 3);
    assert_eq!(stats.frames_sent, 4);
}
