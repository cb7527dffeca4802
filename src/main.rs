use anyhow::{Context, Result};
use clap::Parser;
use radio_recorder::session::spawn_idle_sweeper;
use radio_recorder::{create_router, purge_orphans, AppState, Config};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Live radio relay with per-user MP3 recording
#[derive(Debug, Parser)]
#[command(name = "radio-recorder", version)]
struct Args {
    /// Config file (any format the config crate reads; optional)
    #[arg(short, long, default_value = "config/radio-recorder")]
    config: String,

    /// Override service.http.bind
    #[arg(long)]
    bind: Option<String>,

    /// Override service.http.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(Some(&args.config))?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", cfg.service.environment.as_str());
    info!("Upstream stream: {}", cfg.stream.url);
    info!("Recordings directory: {}", cfg.recording.dir.display());
    info!("Allowed origins: {:?}", cfg.cors.allowed_origins);

    purge_orphans(&cfg.recording.dir).await?;

    let state = AppState::from_config(cfg.clone())?;

    let sweeper = cfg.session.idle_ttl().map(|max_idle| {
        spawn_idle_sweeper(
            state.sessions.clone(),
            state.recorder.clone(),
            max_idle,
            cfg.session.sweep_interval(),
        )
    });

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    state.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}
