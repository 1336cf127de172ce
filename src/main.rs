use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tts_hub::backends::BackendRegistry;
use tts_hub::config_loader::Settings;
use tts_hub::engine::Engine;
use tts_hub::service::{self, AppState};

/// Text-to-speech web service
#[derive(Parser)]
#[command(name = "tts-hub")]
#[command(author = "StarTuz")]
#[command(version)]
#[command(about = "Serves several text-to-speech engines behind one REST API", long_about = None)]
struct Cli {
    /// Extra config file merged over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for generated audio
    #[arg(long)]
    output_dir: Option<String>,

    /// History database path
    #[arg(long)]
    db_path: Option<String>,

    /// Print the supported engines and exit
    #[arg(long)]
    list_engines: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tts_hub=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_engines {
        for engine in Engine::ALL {
            println!("{:<8} {}", engine.as_str(), engine.description());
        }
        return Ok(());
    }

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(host) = cli.host {
        settings.bind_host = host;
    }
    if let Some(port) = cli.port {
        settings.bind_port = port;
    }
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }
    if let Some(path) = cli.db_path {
        settings.history_db_path = path;
    }
    settings.validate().context("Invalid settings")?;

    let registry = Arc::new(
        BackendRegistry::from_settings(&settings).context("Failed to build HTTP client")?,
    );
    let state = AppState::from_settings(&settings, registry)
        .map_err(|e| anyhow::anyhow!("Failed to initialize service: {}", e))?;

    let addr = format!("{}:{}", settings.bind_host, settings.bind_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Could not bind {}", addr))?;

    info!("tts-hub listening on http://{}", addr);
    info!("Audio output directory: {}", settings.output_dir);
    info!("History database: {}", settings.history_db_path);

    axum::serve(listener, service::create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tts-hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
