use std::path::PathBuf;
use std::process::ExitCode;

use axum::routing::get;
use enlist::config::{self, Configuration};
use tokio::net::TcpListener;

const CONFIG_PATH: &str = "CONFIG_PATH";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server stopped");
            eprintln!("enlist: {err}");
            ExitCode::FAILURE
        },
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::var(CONFIG_PATH).map(PathBuf::from).unwrap_or_default();
    let config = Configuration::default().path(path).read()?;

    enlist::telemetry::init(&config.telemetry)?;
    match config.source() {
        Some(source) => tracing::info!(path = %source.display(), "configuration loaded"),
        None => tracing::warn!("configuration file not found, using defaults"),
    }

    let database_url = config::database_url()?;

    // The listener is only bound once the store answers.
    let state = enlist::initialize_state(config.clone(), &database_url).await?;

    let mut app = enlist::app(state);
    if config.telemetry.metrics {
        let handle = enlist::telemetry::setup_metrics_recorder()?;
        app = app.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    let listener = TcpListener::bind(config.socket_addr()).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        prefix = %config.prefix,
        version = config.version(),
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
