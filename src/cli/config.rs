//! Config command handlers

use crate::cli::{ConfigInitArgs, ConfigValidateArgs};
use crate::config::FulcrumConfig;
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../fulcrum.example.toml");

/// Handle `fulcrum config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    println!("✓ Configuration file created: {}", args.output.display());
    println!("  Edit this file to list your backends.");

    Ok(())
}

/// Handle `fulcrum config validate` command
///
/// Returns a one-line summary of the validated configuration.
pub fn handle_config_validate(
    args: &ConfigValidateArgs,
) -> Result<String, Box<dyn std::error::Error>> {
    let config = FulcrumConfig::load(Some(&args.config))?.apply_defaults();
    config.validate()?;

    let strategy = config.strategy_kind()?;
    Ok(format!(
        "✓ {} is valid: {} backend(s), strategy {} ({}), health checks {}",
        args.config.display(),
        config.backends.len(),
        strategy,
        strategy.label(),
        if config.health_check.enabled {
            "enabled"
        } else {
            "disabled"
        }
    ))
}
