//! `validate` command implementation.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use contracts::{IngestBlueprint, StorageBackend, TableDefinition};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    app_scope: String,
    interval_ms: u64,
    backend: String,
    driver_count: usize,
    sensor_count: usize,
    scopes: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let scopes: BTreeSet<String> = std::iter::once(blueprint.worker.app_scope.clone())
                .chain(
                    blueprint
                        .sensors
                        .iter()
                        .map(|s| blueprint.sensor_scope(s).to_string()),
                )
                .collect();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    app_scope: blueprint.worker.app_scope.clone(),
                    interval_ms: blueprint.worker.interval_ms,
                    backend: format!("{:?}", blueprint.storage.backend),
                    driver_count: blueprint.drivers.len(),
                    sensor_count: blueprint.sensors.len(),
                    scopes: scopes.into_iter().collect(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &IngestBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sensors.is_empty() {
        warnings.push("No sensors configured - the worker will idle".to_string());
    }

    if blueprint.storage.backend == StorageBackend::Memory {
        warnings.push("Memory storage selected - rows are discarded on exit".to_string());
    }

    for driver in &blueprint.drivers {
        if !blueprint.sensors.iter().any(|s| s.driver == driver.name) {
            warnings.push(format!("Driver '{}' is not used by any sensor", driver.name));
        }

        // Loader validation already guarantees the document parses
        let Ok(definition) = TableDefinition::from_document(&driver.table_definition) else {
            continue;
        };
        for column in definition.unknown_columns() {
            warnings.push(format!(
                "Driver '{}': column '{}' has unrecognized type '{}' and will never be written",
                driver.name, column.name, column.column_type
            ));
        }
        if !definition.columns.iter().any(|c| c.is_sensor_id()) {
            warnings.push(format!(
                "Driver '{}': table '{}' has no text-typed sensor_id column",
                driver.name, definition.table_name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  App scope: {}", summary.app_scope);
            println!("  Interval: {} ms", summary.interval_ms);
            println!("  Backend: {}", summary.backend);
            println!("  Drivers: {}", summary.driver_count);
            println!("  Sensors: {}", summary.sensor_count);
            println!("  Scopes: {}", summary.scopes.join(", "));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
