//! page-sentinel binary entrypoint.
//! Loads config, wires collaborators, and runs once, on an interval, or behind HTTP.

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use page_sentinel::api::{self, AppState};
use page_sentinel::bootstrap::SentinelRuntime;
use page_sentinel::cli::{Cli, Command};
use page_sentinel::config::SentinelConfig;
use page_sentinel::metrics::Metrics;
use page_sentinel::scheduler;

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("page_sentinel=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => SentinelConfig::load_from(Path::new(path)),
        None => SentinelConfig::load_default(),
    }
    .context("loading configuration")?;

    match cli.command {
        Command::Run => {
            let rt = SentinelRuntime::from_config(cfg)?;
            let report = rt.runner.run_now().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Watch { interval_secs } => {
            let secs = interval_secs.unwrap_or(cfg.schedule.interval_secs).max(1);
            let rt = SentinelRuntime::from_config(cfg)?;
            let handle = scheduler::spawn_interval(rt.runner.clone(), Duration::from_secs(secs));
            tokio::select! {
                res = handle => res.context("scheduler task")?,
                _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
            }
        }
        Command::Serve { bind, no_schedule } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            let metrics = if cfg.server.metrics {
                Some(Metrics::init()?)
            } else {
                None
            };
            let interval = Duration::from_secs(cfg.schedule.interval_secs);
            let rt = SentinelRuntime::from_config(cfg)?;
            if !no_schedule {
                scheduler::spawn_interval(rt.runner.clone(), interval);
            }

            let app = api::router_with_metrics(
                AppState {
                    runner: rt.runner.clone(),
                },
                metrics.as_ref(),
            );
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            tracing::info!(%bind, "http server listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
                .context("http server")?;
        }
        Command::Probe => {
            let rt = SentinelRuntime::from_config(cfg)?;
            rt.quick_probe().await;
        }
    }
    Ok(())
}
