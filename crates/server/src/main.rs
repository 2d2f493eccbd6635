use clap::Parser;
use searchsim_core::config;
use searchsim_core::storage::{load_all, Catalog};
use searchsim_server::api::create_router;
use searchsim_server::api::handlers::AppState;
use searchsim_server::api::metrics;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "searchsim", about = "Local document-search service simulator")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Data directory for index snapshots
    #[arg(short, long, default_value = config::DEFAULT_DATA_DIR)]
    data_dir: String,

    /// Snapshot interval in seconds (0 = disabled)
    #[arg(long, default_value_t = config::DEFAULT_SNAPSHOT_INTERVAL_SECS)]
    snapshot_interval: u64,

    /// How often to look for stale or tombstone-heavy graphs, in seconds (0 = disabled)
    #[arg(long, default_value_t = config::DEFAULT_REBUILD_CHECK_INTERVAL_SECS)]
    rebuild_check_interval: u64,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("searchsim_server=info".parse()?)
                .add_directive("searchsim_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    let data_dir = PathBuf::from(&args.data_dir);
    if data_dir.exists() && !data_dir.is_dir() {
        eprintln!(
            "Error: data_dir '{}' exists but is not a directory",
            args.data_dir
        );
        std::process::exit(1);
    }

    // Every index is loaded (or rebuilt) before the listener opens.
    let load_dir = data_dir.clone();
    let catalog = tokio::task::spawn_blocking(move || load_all(&load_dir)).await??;

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        catalog: catalog.clone(),
        data_dir: data_dir.clone(),
        prometheus_handle,
        start_time: Instant::now(),
    };
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", args.port);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        data_dir = %args.data_dir,
        snapshot_interval_secs = args.snapshot_interval,
        rebuild_check_interval_secs = args.rebuild_check_interval,
        indexes = catalog.list().len(),
        "searchsim ready"
    );

    // Spawn index metrics background task
    let metrics_catalog = catalog.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        loop {
            interval.tick().await;
            metrics::update_index_metrics(&metrics_catalog);
        }
    });

    if args.rebuild_check_interval > 0 {
        let rebuild_catalog = catalog.clone();
        let every = Duration::from_secs(args.rebuild_check_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let catalog = rebuild_catalog.clone();
                let rebuilt = tokio::task::spawn_blocking(move || {
                    catalog
                        .list()
                        .iter()
                        .map(|index| (index.name().to_string(), index.rebuild(false)))
                        .filter(|(_, fields)| !fields.is_empty())
                        .collect::<Vec<_>>()
                })
                .await;
                match rebuilt {
                    Ok(rebuilt) => {
                        for (index, fields) in rebuilt {
                            tracing::info!(index = %index, ?fields, "Background rebuild complete");
                        }
                    }
                    Err(e) => tracing::error!("Background rebuild task failed: {}", e),
                }
            }
        });
    }

    if args.snapshot_interval > 0 {
        let snap_catalog = catalog.clone();
        let snap_dir = data_dir.clone();
        let snap_interval = args.snapshot_interval;
        tracing::info!("Auto-snapshots enabled every {}s", snap_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(snap_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                let catalog = snap_catalog.clone();
                let dir = snap_dir.clone();
                let saved =
                    tokio::task::spawn_blocking(move || save_every(&catalog, &dir, None)).await;
                match saved {
                    Ok(true) => tracing::info!("Periodic snapshot complete"),
                    Ok(false) => tracing::warn!("Periodic snapshot incomplete"),
                    Err(e) => tracing::error!("Snapshot task failed: {}", e),
                }
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("requests drained, flushing indexes");
    let deadline = Duration::from_secs(args.shutdown_timeout);
    let saved =
        tokio::task::spawn_blocking(move || save_every(&catalog, &data_dir, Some(deadline)))
            .await?;
    if !saved {
        tracing::warn!("Some indexes were not saved on shutdown");
    }

    Ok(())
}

/// Save every index, giving up after `deadline` when one is set.
/// Returns `true` when all indexes were written.
fn save_every(catalog: &Catalog, data_dir: &Path, deadline: Option<Duration>) -> bool {
    let start = Instant::now();
    let mut all_saved = true;
    for index in catalog.list() {
        if deadline.is_some_and(|d| start.elapsed() > d) {
            tracing::error!(
                "Shutdown flush timeout ({}s) exceeded, aborting remaining saves",
                deadline.map_or(0, |d| d.as_secs())
            );
            return false;
        }
        match catalog.save_registered(&index, data_dir) {
            Ok(true) => tracing::debug!(index = %index.name(), "Index saved"),
            Ok(false) => tracing::debug!(index = %index.name(), "Index deleted before save"),
            Err(e) => {
                tracing::error!("Failed to save index '{}': {}", index.name(), e);
                all_saved = false;
            }
        }
    }
    all_saved
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                None
            }
        };

    #[cfg(unix)]
    let terminate = async {
        match sigterm.as_mut() {
            Some(sig) => {
                sig.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => tracing::info!(signal = "SIGINT", "shutdown requested"),
                Err(e) => tracing::error!(error = %e, "Ctrl+C handler unavailable"),
            }
        }
        _ = terminate => tracing::info!(signal = "SIGTERM", "shutdown requested"),
    }
    tracing::info!("draining in-flight requests");
}
