mod http;
mod settings;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ferry_core::EphemeralStore;
use ferry_core::app::SweepLoop;
use ferry_core::impls::LocalBlobStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::http::AppState;
use crate::settings::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_error = settings::load_dotenv();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(e) = dotenv_error {
        tracing::warn!(error = %e, "ignoring unreadable .env file");
    }

    let settings = cli.settings;
    let config = settings
        .store_config()
        .context("invalid store configuration")?;
    let links = settings
        .link_builder()
        .context("invalid PUBLIC_BASE_URL")?;

    // (A) Blob ストアとインデックス
    let blobs = LocalBlobStore::create(&settings.upload_directory, config.format.suffix())
        .await
        .with_context(|| {
            format!(
                "failed to prepare upload directory {}",
                settings.upload_directory.display()
            )
        })?;
    let store = Arc::new(EphemeralStore::new(config, Arc::new(blobs)));

    // (B) sweep を起動（プロセス全体で 1 本）
    let shutdown = CancellationToken::new();
    let sweeper = SweepLoop::from_config(Arc::clone(&store)).spawn(shutdown.clone());

    // (C) HTTP
    let listener = TcpListener::bind(settings.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_address))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        public_base_url = links.base(),
        ttl_secs = store.config().ttl.as_secs(),
        suffix = store.config().format.suffix(),
        "ferry listening"
    );

    let app = http::router(AppState { store, links });
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal(shutdown.clone()))
        .await
        .context("http server failed")?;

    // (D) sweep を止めて終了
    shutdown.cancel();
    sweeper.await.context("sweep loop panicked")?;
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }
    tracing::info!("shutting down");
    shutdown.cancel();
}
