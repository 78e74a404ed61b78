//! hako server binary
//!
//! HTTP file browser for a single directory tree.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the current directory on 127.0.0.1:8001
//! hako
//!
//! # Serve ~/share under /fancy-path/, following symlinks
//! hako ~/share --prefix /fancy-path/ --symlinks
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use hako_kernel::LocalBackend;
use hako_server::{Args, ServerConfig, router, serve};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ServerConfig::from_args(&args)?;
    let mount = config.mount_context();

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        root = %mount.root().display(),
        prefix = mount.url_prefix(),
        symlinks = ?mount.symlinks(),
        read_only = mount.read_only(),
        "hako listening"
    );

    serve(listener, router(LocalBackend::new(mount))).await?;

    tracing::info!("hako stopped");
    Ok(())
}
