use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gw_domain::config::{Config, ConfigSeverity};
use gw_gateway::cli::{self, Cli, Command};
use gw_gateway::state::AppState;
use gw_gateway::{doctor, http};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command() {
        Command::Serve => {
            init_tracing();
            let config_path = cli::config_path();
            let config = cli::load_config(&config_path)
                .with_context(|| format!("loading config from {}", config_path.display()))?;
            run_server(Arc::new(config)).await
        }
        Command::Doctor => {
            let config_path = cli::config_path();
            let config = cli::load_config(&config_path)
                .with_context(|| format!("loading config from {}", config_path.display()))?;
            let passed = doctor::run(&config, &config_path);
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Structured JSON tracing, only initialized for `serve` — `doctor` prints
/// plain human-readable lines to stdout instead.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,gw_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("agent-gateway starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s); run `agent-gateway doctor` for detail",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── App state ────────────────────────────────────────────────────
    let state = AppState::new(config.clone());
    tracing::info!(
        workspace_root = %config.workspace.repo_root.display(),
        agents = config.agents.len(),
        "app state ready"
    );

    let shutdown = CancellationToken::new();

    // ── Session sweeper ──────────────────────────────────────────────
    // Concrete platform adapters (Discord/Misskey clients) are outside
    // this crate's scope; only the contract they implement lives here.
    // A deployment that embeds a real adapter drives the event router
    // and orchestrator directly against this same `AppState` — the
    // sweeper and the skill gateway below are the pieces that run
    // unconditionally, whether or not an adapter is currently connected.
    if config.sessions.sweep_interval_ms > 0 {
        let sessions = state.sessions.clone();
        let interval_ms = config.sessions.sweep_interval_ms;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let expired = sessions.sweep_expired();
                        if expired > 0 {
                            tracing::debug!(count = expired, "swept expired sessions");
                        }
                    }
                }
            }
        });
        tracing::info!(interval_ms, "session sweeper started");
    } else {
        tracing::warn!("session sweeper disabled (sessions.sweep_interval_ms = 0)");
    }

    // ── Router + bind ────────────────────────────────────────────────
    let app = http::router(state.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "agent-gateway listening");

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            tracing::info!("shutdown signal received, draining in-flight requests");
            shutdown_signal.cancel();
        })
        .await
        .context("axum server error")?;

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
