//! Relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! relay-server --bind 0.0.0.0:3000
//!
//! # Start with TLS certificate (production)
//! relay-server --bind 0.0.0.0:3000 --cert cert.pem --key key.pem
//! ```

use clap::Parser;
use relay_server::{DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Fan-out relay server
#[derive(Parser, Debug)]
#[command(name = "relay-server")]
#[command(about = "Rebroadcasts every client event to all connected clients")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long, requires = "key")]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long, requires = "cert")]
    key: Option<String>,

    /// Per-session outbound queue length
    #[arg(long, default_value = "1024")]
    outbound_capacity: usize,

    /// Event loop inbox length
    #[arg(long, default_value = "4096")]
    inbox_capacity: usize,

    /// Do not echo broadcasts back to the sending client
    #[arg(long)]
    exclude_sender: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Relay server starting");

    if args.cert.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        inbox_capacity: args.inbox_capacity,
        outbound_capacity: args.outbound_capacity,
        driver: DriverConfig { echo_to_sender: !args.exclude_sender },
    };

    let server = Server::bind(config)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
