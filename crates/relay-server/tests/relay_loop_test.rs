//! Event loop integration tests over in-memory streams.
//!
//! Each session is a `tokio::io::duplex` pipe driven by the same session
//! tasks the QUIC runtime uses.

use std::time::Duration;

use bytes::Bytes;
use relay_proto::{EVENT_FROM_CLIENT, EVENT_FROM_SERVER, Frame, Payload, io};
use relay_server::{DriverConfig, Inbound, LoopStats, RelayLoop, session};
use tokio::{
    io::{AsyncWriteExt, DuplexStream},
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

struct Relay {
    inbox: mpsc::Sender<Inbound>,
    task: JoinHandle<LoopStats>,
}

impl Relay {
    fn start(config: DriverConfig) -> Self {
        let (relay, inbox) = RelayLoop::new(config, 64);
        Self { inbox, task: tokio::spawn(relay.run()) }
    }

    /// Register a session and return the client end of its pipe.
    ///
    /// Returns only after the session is queued ahead of anything sent later.
    async fn join(&self, session_id: u64) -> DuplexStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);

        session::attach(session_id, writer, &self.inbox, 1024).await.unwrap();

        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let reason = match session::pump_frames(session_id, reader, &inbox).await {
                Ok(()) => "eof".to_string(),
                Err(e) => e.to_string(),
            };
            session::detach(session_id, reason, &inbox).await;
        });

        client
    }

    /// Stop accepting input and wait for the loop to finish.
    async fn stop(self) -> LoopStats {
        drop(self.inbox);
        self.task.await.unwrap()
    }
}

async fn emit(client: &mut DuplexStream, payload: impl Into<Bytes>) {
    let frame = Frame::new(EVENT_FROM_CLIENT, payload).unwrap();
    io::write_frame(client, &frame).await.unwrap();
}

async fn recv(client: &mut DuplexStream) -> Frame {
    timeout(RECV_TIMEOUT, io::read_frame(client))
        .await
        .expect("timed out waiting for frame")
        .unwrap()
        .expect("stream closed")
}

/// Wait until the server side of `client` has been torn down.
async fn closed(client: &mut DuplexStream) {
    let next = timeout(RECV_TIMEOUT, io::read_frame(client)).await.expect("not closed");
    assert!(matches!(next, Ok(None)), "expected end of stream, got {next:?}");
}

/// Disconnect and wait until the loop has processed it.
async fn leave(mut client: DuplexStream) {
    client.shutdown().await.unwrap();
    closed(&mut client).await;
}

#[tokio::test]
async fn three_clients_all_receive_hello() {
    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;
    let mut b = relay.join(2).await;
    let mut c = relay.join(3).await;

    emit(&mut a, Payload::from_value("hello").unwrap()).await;

    for client in [&mut a, &mut b, &mut c] {
        let frame = recv(client).await;
        assert_eq!(frame.name(), EVENT_FROM_SERVER);
        assert_eq!(Payload::from(frame.payload().clone()).to_value::<String>().unwrap(), "hello");
    }

    for client in [a, b, c] {
        leave(client).await;
    }
    assert_eq!(relay.stop().await, LoopStats { broadcasts: 1, frames_sent: 3, frames_dropped: 0 });
}

#[tokio::test]
async fn lone_client_receives_own_event() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Point {
        x: u32,
    }

    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;

    emit(&mut a, Payload::from_value(&Point { x: 1 }).unwrap()).await;

    let frame = recv(&mut a).await;
    assert_eq!(Payload::from(frame.payload().clone()).to_value::<Point>().unwrap(), Point { x: 1 });

    leave(a).await;
    assert_eq!(relay.stop().await.frames_sent, 1);
}

#[tokio::test]
async fn disconnected_client_is_skipped() {
    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;
    let b = relay.join(2).await;

    leave(b).await;
    emit(&mut a, Payload::from_value("ping").unwrap()).await;

    let frame = recv(&mut a).await;
    assert_eq!(Payload::from(frame.payload().clone()).to_value::<String>().unwrap(), "ping");

    leave(a).await;
    assert_eq!(relay.stop().await, LoopStats { broadcasts: 1, frames_sent: 1, frames_dropped: 0 });
}

#[tokio::test]
async fn idle_relay_sends_nothing() {
    let relay = Relay::start(DriverConfig::default());
    let a = relay.join(1).await;

    leave(a).await;
    assert_eq!(relay.stop().await, LoopStats::default());
}

#[tokio::test]
async fn exclude_sender_skips_echo() {
    let relay = Relay::start(DriverConfig { echo_to_sender: false });
    let mut a = relay.join(1).await;
    let mut b = relay.join(2).await;

    emit(&mut a, Bytes::from_static(b"x")).await;

    assert_eq!(recv(&mut b).await.payload().as_ref(), b"x");

    leave(a).await;
    leave(b).await;
    assert_eq!(relay.stop().await.frames_sent, 1);
}

#[tokio::test]
async fn opaque_payload_is_relayed_byte_for_byte() {
    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;
    let mut b = relay.join(2).await;

    // Not valid CBOR; the server must not care.
    let payload = Bytes::from_static(&[0xff, 0x00, 0xfe, 0x01]);
    emit(&mut a, payload.clone()).await;

    assert_eq!(recv(&mut b).await.payload(), &payload);
    assert_eq!(recv(&mut a).await.payload(), &payload);
}

#[tokio::test]
async fn empty_payload_is_relayed() {
    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;

    emit(&mut a, Bytes::new()).await;

    assert!(recv(&mut a).await.payload().is_empty());
}

#[tokio::test]
async fn unknown_event_name_is_ignored() {
    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;

    let frame = Frame::new("somethingElse", Bytes::from_static(b"x")).unwrap();
    io::write_frame(&mut a, &frame).await.unwrap();
    emit(&mut a, Bytes::from_static(b"after")).await;

    // Only the armed event comes back.
    assert_eq!(recv(&mut a).await.payload().as_ref(), b"after");

    leave(a).await;
    assert_eq!(relay.stop().await.broadcasts, 1);
}

#[tokio::test]
async fn malformed_frame_ends_only_that_session() {
    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;
    let mut bad = relay.join(2).await;

    bad.write_all(b"NOT A RELAY FRAME").await.unwrap();
    closed(&mut bad).await;

    emit(&mut a, Bytes::from_static(b"still here")).await;
    assert_eq!(recv(&mut a).await.payload().as_ref(), b"still here");

    leave(a).await;
    assert_eq!(relay.stop().await.frames_sent, 1);
}

#[tokio::test]
async fn every_client_observes_the_same_order() {
    const PER_SENDER: usize = 50;

    let relay = Relay::start(DriverConfig::default());
    let mut a = relay.join(1).await;
    let mut b = relay.join(2).await;
    let mut c = relay.join(3).await;

    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let send_a = async {
        for i in 0..PER_SENDER {
            let frame = Frame::new(EVENT_FROM_CLIENT, format!("a{i}").into_bytes()).unwrap();
            io::write_frame(&mut a_write, &frame).await.unwrap();
        }
    };
    let send_b = async {
        for i in 0..PER_SENDER {
            let frame = Frame::new(EVENT_FROM_CLIENT, format!("b{i}").into_bytes()).unwrap();
            io::write_frame(&mut b_write, &frame).await.unwrap();
        }
    };

    async fn collect<R: tokio::io::AsyncRead + Unpin>(reader: &mut R, n: usize) -> Vec<Bytes> {
        let mut seen = Vec::with_capacity(n);
        for _ in 0..n {
            let frame = timeout(RECV_TIMEOUT, io::read_frame(reader))
                .await
                .expect("timed out")
                .unwrap()
                .expect("stream closed");
            seen.push(frame.payload().clone());
        }
        seen
    }

    let total = 2 * PER_SENDER;
    let ((), (), seen_a, seen_b, seen_c) = tokio::join!(
        send_a,
        send_b,
        collect(&mut a_read, total),
        collect(&mut b_read, total),
        collect(&mut c, total),
    );

    assert_eq!(seen_a, seen_c);
    assert_eq!(seen_b, seen_c);

    // Per-sender order is preserved inside the global order.
    let from_a: Vec<_> = seen_c.iter().filter(|p| p.starts_with(b"a")).cloned().collect();
    let expected: Vec<Bytes> = (0..PER_SENDER).map(|i| Bytes::from(format!("a{i}"))).collect();
    assert_eq!(from_a, expected);

    a = a_read.unsplit(a_write);
    b = b_read.unsplit(b_write);
    for client in [a, b, c] {
        leave(client).await;
    }
    let stats = relay.stop().await;
    assert_eq!(stats.broadcasts, total as u64);
    assert_eq!(stats.frames_sent, 3 * total as u64);
}

#[tokio::test]
async fn serve_stream_detaches_on_eof() {
    let relay = Relay::start(DriverConfig::default());

    let (mut client, server) = tokio::io::duplex(1024);
    let (reader, writer) = tokio::io::split(server);
    let serve = tokio::spawn(session::serve_stream(7, reader, writer, relay.inbox.clone(), 8));

    emit(&mut client, Bytes::from_static(b"x")).await;
    assert_eq!(recv(&mut client).await.payload().as_ref(), b"x");

    client.shutdown().await.unwrap();
    serve.await.unwrap().unwrap();
    closed(&mut client).await;

    assert_eq!(relay.stop().await.frames_sent, 1);
}
