//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(interval_ms) = args.interval_ms {
        anyhow::ensure!(interval_ms > 0, "--interval-ms must be > 0");
        info!(interval_ms, "Overriding worker interval from CLI");
        blueprint.worker.interval_ms = interval_ms;
    }
    if let Some(ref data_dir) = args.data_dir {
        info!(data_dir = %data_dir.display(), "Overriding data directory from CLI");
        blueprint.storage.data_dir = data_dir.clone();
    }

    info!(
        app_scope = %blueprint.worker.app_scope,
        interval_ms = blueprint.worker.interval_ms,
        backend = ?blueprint.storage.backend,
        drivers = blueprint.drivers.len(),
        sensors = blueprint.sensors.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    info!("Starting ingestion...");
    let stats = pipeline.run(shutdown).await.context("Ingestion failed")?;

    info!(
        rows_written = stats.worker_metrics.rows_written,
        failures = stats.worker_metrics.failures,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Ingestion completed"
    );
    stats.print_summary();

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::IngestBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Worker:");
    println!("  App scope: {}", blueprint.worker.app_scope);
    println!("  Interval: {} ms", blueprint.worker.interval_ms);
    println!("\nStorage:");
    println!("  Backend: {:?}", blueprint.storage.backend);
    println!("  Data dir: {}", blueprint.storage.data_dir.display());

    println!("\nDrivers ({}):", blueprint.drivers.len());
    for driver in &blueprint.drivers {
        match contracts::TableDefinition::from_document(&driver.table_definition) {
            Ok(def) => println!(
                "  - {} -> table '{}' ({} columns)",
                driver.name,
                def.table_name,
                def.columns.len()
            ),
            Err(e) => println!("  - {} (invalid: {})", driver.name, e),
        }
    }

    println!("\nSensors ({}):", blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        println!(
            "  - {} [{}] {} Hz, scope '{}'",
            sensor.id,
            sensor.driver,
            sensor.frequency_hz,
            blueprint.sensor_scope(sensor)
        );
    }

    println!();
}
