//! zipstreamd — the zipstream daemon.
//!
//! Serves every subdirectory of the resource root as an on-demand zip
//! archive, streamed straight from a `zip` subprocess to the client.
//!
//! # Usage
//!
//! ```text
//! zipstreamd --folder-path /srv/photos --response-delay 1 --port 8080
//! ```

mod config;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zipstream_api::ApiState;
use zipstream_core::{ArchiveProxy, ZipArchiver};

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_filter())),
        )
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("zipstream daemon starting");

    if !cli.folder_path.is_dir() {
        warn!(path = %cli.folder_path.display(), "resource root does not exist, every archive will be not found");
    }

    let pacing = cli.pacing();
    info!(
        root = %cli.folder_path.display(),
        archiver = %cli.archiver.display(),
        delay = ?pacing.delay_between_chunks,
        "archive proxy configured"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let shutdown = CancellationToken::new();

    // ── Start server ───────────────────────────────────────────

    let state = ApiState {
        root: cli.folder_path.clone(),
        index_page: cli.index_page.clone(),
        proxy: Arc::new(ArchiveProxy::new(ZipArchiver::new(&cli.archiver), pacing)),
        shutdown: shutdown.clone(),
    };
    let router = zipstream_api::build_router(state);
    let addr = cli.listen_addr();

    info!(%addr, "HTTP server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C; in-flight archives are aborted.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        shutdown.cancel();
    });

    server.await?;

    info!("zipstream daemon stopped");
    Ok(())
}
