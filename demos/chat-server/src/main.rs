//! Murmur chat relay server.
//!
//! ```text
//! murmur-server --config murmur.toml -a 0.0.0.0 -p 7777
//! ```
//!
//! Settings come from defaults, then the TOML file, then `MURMUR_*`
//! environment variables, then the flags below. Logging follows
//! `RUST_LOG` (default `info`).

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use murmur::prelude::*;
use tracing_subscriber::EnvFilter;

/// Murmur: a small real-time chat relay.
#[derive(Parser)]
#[command(name = "murmur-server", version, about)]
struct Cli {
    /// TOML configuration file (`[server]` table).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(short = 'a', long)]
    address: Option<IpAddr>,

    /// Port to listen on, overriding the configuration.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = murmur::config::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(address) = cli.address {
        config.listen.set_ip(address);
    }
    if let Some(port) = cli.port {
        config.listen.set_port(port);
    }
    config.validate().context("invalid command-line overrides")?;

    let server = MurmurServer::builder()
        .config(config)
        .build()
        .await
        .context("failed to start server")?;
    tracing::info!(addr = %server.local_addr(), "listening; press Ctrl-C to stop");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl-C received");
        })
        .await?;

    Ok(())
}
