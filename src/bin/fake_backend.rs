use clap::Parser;
use inventory_client::fake_backend::{FakeBackend, FakeBackendConfig};
use inventory_client::logger::*;
use std::net::SocketAddr;
use tokio::signal;

/// Serves the in-memory inventory API until Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "fake-backend")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,
    /// Access token lifetime; short values make refreshes easy to watch.
    #[arg(long, default_value_t = 900)]
    access_ttl_secs: i64,
    #[arg(long, default_value_t = 0)]
    refresh_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logger = Logger::new_bootstrap();

    let config = FakeBackendConfig {
        access_ttl: chrono::Duration::seconds(args.access_ttl_secs),
        ..Default::default()
    };
    let backend = FakeBackend::start(args.addr, config)?;
    backend
        .state()
        .set_refresh_delay(std::time::Duration::from_millis(args.refresh_delay_ms));
    info!(base_url = %backend.base_url(), "seed accounts: admin/admin123, usuario/usuario123");

    signal::ctrl_c().await?;
    backend.shutdown().await;
    Ok(())
}
