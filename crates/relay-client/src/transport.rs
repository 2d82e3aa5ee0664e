//! QUIC transport for the client.
//!
//! Provides [`ConnectedClient`] which handles QUIC I/O for frame transport.
//! Outgoing frames share one unidirectional stream, so the server sees them
//! in send order. Relayed frames arrive on the stream the server opens.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use quinn::{ClientConfig, Endpoint, RecvStream, SendStream};
use relay_proto::{ALPN_PROTOCOL, Frame, io};
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection task has stopped.
    #[error("connection closed")]
    Closed,
}

/// Client transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Give up on the handshake after this long.
    pub connect_timeout: Duration,
    /// Close the connection after this long without traffic.
    pub idle_timeout: Duration,
    /// Keep-alive interval; must be below `idle_timeout`.
    pub keep_alive_interval: Duration,
    /// Length of the frame channels in both directions.
    pub channel_capacity: usize,
}

impl TransportConfig {
    /// Settings for local development against a self-signed server.
    pub fn development() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            keep_alive_interval: Duration::from_secs(10),
            channel_capacity: 256,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Handle to a connected client with QUIC transport.
///
/// Frames are sent/received via the channels, and an internal task handles
/// the QUIC I/O. `from_server` yields `None` once the connection is gone.
/// Dropping the handle closes the connection.
pub struct ConnectedClient {
    /// Send frames to the server.
    pub to_server: mpsc::Sender<Frame>,
    /// Receive frames from the server.
    pub from_server: mpsc::Receiver<Frame>,
    connection: quinn::Connection,
    abort_handle: tokio::task::AbortHandle,
    _endpoint: Endpoint,
}

impl ConnectedClient {
    /// Close the connection. The server sees an ordinary disconnect.
    pub fn stop(&self) {
        self.connection.close(0u32.into(), b"client stopped");
        self.abort_handle.abort();
    }

    /// Address of the server.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }
}

impl Drop for ConnectedClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Connect to a relay server via QUIC with development settings.
pub async fn connect(server_addr: &str) -> Result<ConnectedClient, TransportError> {
    connect_with_config(server_addr, TransportConfig::development()).await
}

/// Connect to a relay server via QUIC.
///
/// Returns a [`ConnectedClient`] with channels for frame transport.
pub async fn connect_with_config(
    server_addr: &str,
    config: TransportConfig,
) -> Result<ConnectedClient, TransportError> {
    let addr: SocketAddr = server_addr
        .parse()
        .map_err(|e| TransportError::Connection(format!("invalid address: {e}")))?;

    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let mut endpoint = Endpoint::client(local)
        .map_err(|e| TransportError::Connection(format!("endpoint creation failed: {e}")))?;
    endpoint.set_default_client_config(insecure_client_config(&config)?);

    let connecting = endpoint
        .connect(addr, "localhost")
        .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?;

    let connection = tokio::time::timeout(config.connect_timeout, connecting)
        .await
        .map_err(|_| TransportError::Connection("handshake timed out".to_string()))?
        .map_err(|e| TransportError::Connection(format!("connection failed: {e}")))?;

    let outbound = connection
        .open_uni()
        .await
        .map_err(|e| TransportError::Stream(format!("open_uni failed: {e}")))?;

    let capacity = config.channel_capacity.max(1);
    let (to_server_tx, to_server_rx) = mpsc::channel::<Frame>(capacity);
    let (from_server_tx, from_server_rx) = mpsc::channel::<Frame>(capacity);

    let handle =
        tokio::spawn(run_connection(connection.clone(), outbound, to_server_rx, from_server_tx));

    Ok(ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        connection,
        abort_handle: handle.abort_handle(),
        _endpoint: endpoint,
    })
}

/// Run the connection, bridging between channels and QUIC.
async fn run_connection(
    connection: quinn::Connection,
    mut outbound: SendStream,
    mut to_server: mpsc::Receiver<Frame>,
    from_server: mpsc::Sender<Frame>,
) {
    let conn_recv = connection.clone();
    let recv_handle = tokio::spawn(async move {
        loop {
            match conn_recv.accept_uni().await {
                Ok(recv) => {
                    let tx = from_server.clone();
                    tokio::spawn(async move {
                        if let Err(e) = forward_stream(recv, tx).await {
                            tracing::debug!("Incoming stream error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::debug!("Connection closed: {}", e);
                    break;
                },
            }
        }
    });

    while let Some(frame) = to_server.recv().await {
        if let Err(e) = io::write_frame(&mut outbound, &frame).await {
            tracing::warn!("Send error: {}", e);
            break;
        }
    }

    if let Err(e) = outbound.finish() {
        tracing::debug!("Finish error: {}", e);
    }
    recv_handle.abort();
}

/// Forward every frame on a server stream (server -> client).
async fn forward_stream(
    mut recv: RecvStream,
    tx: mpsc::Sender<Frame>,
) -> Result<(), TransportError> {
    while let Some(frame) =
        io::read_frame(&mut recv).await.map_err(|e| TransportError::Protocol(e.to_string()))?
    {
        tx.send(frame).await.map_err(|_| TransportError::Closed)?;
    }

    Ok(())
}

/// Create an insecure client config that accepts any certificate.
///
/// WARNING: Development only. Production should verify certificates.
fn insecure_client_config(config: &TransportConfig) -> Result<ClientConfig, TransportError> {
    let mut crypto = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS13])
    .map_err(|e| TransportError::Connection(format!("invalid TLS config: {e}")))?
    .dangerous()
    .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
    .with_no_client_auth();

    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::Connection(format!("QUIC config error: {e}")))?;
    let mut client_config = ClientConfig::new(Arc::new(crypto));

    let idle_timeout = config
        .idle_timeout
        .try_into()
        .map_err(|e| TransportError::Connection(format!("invalid idle timeout: {e}")))?;

    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(idle_timeout));
    transport.keep_alive_interval(Some(config.keep_alive_interval));
    client_config.transport_config(Arc::new(transport));

    Ok(client_config)
}

/// Certificate verifier that accepts any certificate (insecure, for
/// development).
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
