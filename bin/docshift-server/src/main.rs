//! docshift-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Build the job runtime (dispatcher, workspaces, registry).
//! 4. Start the retention sweeper when a task TTL is configured.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use docshift_core::{Dispatcher, JobRuntime, WorkspaceManager};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: DOCSHIFT_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "docshift-server starting");

    // ── 3. Job runtime ─────────────────────────────────────────────────────────
    let jobs = JobRuntime::new(Dispatcher::with_programs(&cfg.programs))
        .with_workspaces(WorkspaceManager::new(&cfg.workspace_root))
        .with_cleanup_delay(cfg.cleanup_delay);
    info!(
        workspace_root = %cfg.workspace_root.display(),
        cleanup_delay_secs = cfg.cleanup_delay.as_secs(),
        tools = jobs.tools().len(),
        "job runtime ready"
    );

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        jobs: jobs.clone(),
    });

    // ── 4. Retention sweeper ───────────────────────────────────────────────────
    if let Some(ttl) = cfg.task_ttl {
        info!(ttl_secs = ttl.as_secs(), "task retention sweeper enabled");
        tokio::spawn(run_sweeper(jobs.clone(), ttl, cfg.sweep_interval));
    }

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let in_flight = jobs.tracker().in_flight();
    if in_flight > 0 {
        warn!(in_flight, "shutting down with conversions still running");
    }

    info!("docshift-server stopped");
    Ok(())
}

/// Periodically retire terminal tasks nobody downloaded.
async fn run_sweeper(jobs: JobRuntime, ttl: Duration, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let retired = jobs.sweep_expired(ttl).await;
        if retired > 0 {
            info!(retired, "expired tasks retired");
        }
    }
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
