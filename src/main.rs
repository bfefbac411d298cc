//! herakles-compute-meter
//!
//! Polls the instances on this host once per interval, turns their raw
//! hypervisor counters into usage samples and serves the latest cycle over
//! HTTP.

mod cli;
mod commands;
mod handlers;
mod metrics;
mod state;

use axum::{routing::get, Router};
use chrono::Utc;
use clap::Parser;
use herakles_compute_meter::config::{DEFAULT_BIND_ADDR, DEFAULT_PORT};
use herakles_compute_meter::{
    load_config, validate_effective_config, Collector, Config, CycleReport, FanoutPublisher,
    FilePublisher, FileInventory, HealthStats, Publisher, SnapshotPublisher,
};
use prometheus::{Gauge, Registry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, instrument, warn};

use cli::{Args, Commands, ConfigFormat, LogLevel};
use commands::{command_check, command_config, command_generate_testdata, command_test};
use handlers::{config_handler, doc_handler, health_handler, metrics_handler, samples_handler};
use metrics::MeterMetrics;
use state::{AppState, CycleStatus, SharedState};

/// Merges the config file with CLI overrides (CLI wins).
fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if args.interval.is_some() {
        config.interval_secs = args.interval;
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }

    // Parse comma-separated meter patterns
    if let Some(meters) = &args.meters {
        config.meters = Some(
            meters
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }

    if let Some(path) = &args.inventory {
        config.inventory_file = Some(path.clone());
    }
    if let Some(path) = &args.publish_file {
        config.publish_file = Some(path.clone());
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }

    Ok(config)
}

/// Shows configuration in requested format
fn show_config(config: &Config, format: ConfigFormat) -> anyhow::Result<()> {
    let output = commands::config::render_config(config, format, false)?;
    println!("{output}");
    Ok(())
}

fn setup_logging(config: &Config, args: &Args) {
    // An explicit CLI level wins over the config file.
    let level = match (&args.log_level, config.log_level.as_deref()) {
        (LogLevel::Info, Some(from_config)) => from_config.parse().unwrap_or(LevelFilter::INFO),
        (LogLevel::Off, _) => LevelFilter::OFF,
        (LogLevel::Error, _) => LevelFilter::ERROR,
        (LogLevel::Warn, _) => LevelFilter::WARN,
        (LogLevel::Info, None) => LevelFilter::INFO,
        (LogLevel::Debug, _) => LevelFilter::DEBUG,
        (LogLevel::Trace, _) => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return;
    }

    info!("Logging initialized with level: {}", level);
}

/// Runs one polling cycle on a blocking thread and records its outcome.
#[instrument(skip(state))]
async fn refresh(state: &SharedState) -> anyhow::Result<CycleReport> {
    state.status.write().await.is_updating = true;

    let worker = state.clone();
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<CycleReport> {
        let instances = worker.source.instances()?;
        Ok(worker
            .collector
            .run_cycle(&instances, worker.publisher.as_ref()))
    })
    .await
    .map_err(anyhow::Error::from)
    .and_then(|r| r);

    let mut status = state.status.write().await;
    status.is_updating = false;
    match &result {
        Ok(report) => {
            state.health_stats.record_cycle(report);
            status.update_success = true;
            status.last_updated = Some(Utc::now());
            status.last_report = Some(report.clone());
        }
        Err(_) => status.update_success = false,
    }
    result
}

fn build_publisher(
    config: &Config,
    snapshot: &Arc<SnapshotPublisher>,
) -> anyhow::Result<Arc<dyn Publisher>> {
    match &config.publish_file {
        Some(path) => {
            let file = FilePublisher::open(path)?;
            info!("Publishing samples to {}", file.path().display());
            Ok(Arc::new(FanoutPublisher::new(vec![
                snapshot.clone(),
                Arc::new(file),
            ])))
        }
        None => Ok(snapshot.clone()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {:#}", e);
        std::process::exit(1);
    }

    if args.check_config {
        println!("✅ Configuration is valid");
        return Ok(());
    }
    if args.show_config {
        return show_config(&config, args.config_format);
    }

    setup_logging(&config, &args);

    // Handle subcommands
    if let Some(command) = args.command {
        return match command {
            Commands::Check { collect } => command_check(collect, &config),
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output, format, commented),
            Commands::Test {
                iterations,
                verbose,
                pause,
            } => command_test(iterations, verbose, pause, &config),
            Commands::GenerateTestdata {
                output,
                instances,
                failing,
            } => command_generate_testdata(output, instances, failing),
        };
    }

    info!("Starting herakles-compute-meter");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let inventory = Arc::new(FileInventory::new(config.inventory_file()));
    info!("Using inventory {}", inventory.path().display());
    let collector = Collector::from_config(inventory.clone(), &config)?;
    info!("Active producers: {}", collector.producer_names().join(", "));

    let snapshot = Arc::new(SnapshotPublisher::new());
    let publisher = build_publisher(&config, &snapshot)?;

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = MeterMetrics::new(&registry)?;
    let scrape_duration = Gauge::new(
        "herakles_compute_meter_scrape_duration_seconds",
        "Time spent serving /metrics request",
    )?;
    registry.register(Box::new(scrape_duration.clone()))?;
    debug!("All metrics registered successfully");

    let state = Arc::new(AppState {
        registry,
        metrics,
        scrape_duration,
        scrape_lock: Mutex::new(()),
        collector,
        source: inventory,
        snapshot,
        publisher,
        status: RwLock::new(CycleStatus::default()),
        config: Arc::new(config.clone()),
        health_stats: Arc::new(HealthStats::new()),
    });

    // Background polling task; the first tick fires immediately
    let bg_state = state.clone();
    let period = Duration::from_secs(config.interval_secs());
    let background_task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Polling task started with {}s interval", period.as_secs());

        loop {
            ticker.tick().await;
            if let Err(e) = refresh(&bg_state).await {
                warn!("Polling cycle skipped: {:#}", e);
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/samples", get(samples_handler))
        .route("/config", get(config_handler))
        .route("/doc", get(doc_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(
        "herakles-compute-meter listening on http://{}:{}",
        bind_ip_str, port
    );

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                background_task.abort();
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
    }

    background_task.abort();
    let _ = background_task.await;

    // Flush anything a cycle left buffered
    if let Err(e) = state.publisher.flush() {
        error!("Failed to flush publisher on shutdown: {:#}", e);
    }

    info!("herakles-compute-meter stopped gracefully");
    Ok(())
}
