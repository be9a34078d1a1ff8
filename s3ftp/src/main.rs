//! s3ftp - S3 protocol gateway in front of an FTP server

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use s3ftp::{create_router, Args, Config};
use s3ftp_s3::backend::FtpConnector;
use s3ftp_s3::S3Gateway;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    init_tracing(&config);

    info!("Starting s3ftp...");
    info!(
        "  FTP backend: {}:{} as {}",
        config.ftp_host, config.ftp_port, config.ftp_user
    );

    let credentials = config.credentials();
    if credentials.is_empty() {
        warn!("  Authentication: disabled, no access key configured");
    } else {
        info!("  Authentication: SigV4 ({} key)", credentials.len());
    }

    let gateway = S3Gateway::with_connector(Arc::new(FtpConnector::new(config.ftp_settings())));
    gateway
        .session()
        .connect()
        .await
        .context("failed to connect to FTP server")?;

    let app = create_router(&gateway, credentials);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    gateway.session().close().await;
    info!("Shut down");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
