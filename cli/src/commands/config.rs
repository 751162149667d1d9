// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use rooms_core::domain::service_config::{RoomsConfigManifest, StorageBackendKind};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./rooms-config.yaml)
        #[arg(short, long, default_value = "./rooms-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(&output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = RoomsConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. LOUNGE_ROOMS_CONFIG_PATH: {}",
            std::env::var("LOUNGE_ROOMS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./rooms-config.yaml");
        println!("  4. ~/.lounge/rooms-config.yaml");
        println!("  5. /etc/lounge/rooms-config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Service:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Branch: {}", config.spec.branch_id);
    println!();

    let reservations = &config.spec.reservations;
    println!("{}", "Reservations:".bold());
    println!("  Buffer: {} min", reservations.buffer_minutes);
    println!("  No-show grace: {} min", reservations.expiration_minutes);
    println!("  Max notes length: {}", reservations.max_notes_length);
    println!();

    println!("{}", "Expiration Sweeper:".bold());
    if config.spec.sweeper.enabled {
        println!("  Enabled: {}", "yes".green());
    } else {
        println!("  Enabled: {}", "no".yellow());
    }
    println!("  Interval: {}s", config.spec.sweeper.interval_seconds);
    println!();

    println!("{}", "Storage:".bold());
    match config.spec.storage.backend {
        StorageBackendKind::InMemory => {
            println!("  Backend: in_memory {}", "(data is lost on exit)".dimmed());
        }
        StorageBackendKind::Postgres => {
            println!("  Backend: postgres");
            let url = config
                .spec
                .storage
                .database_url
                .as_deref()
                .map(redact_url)
                .unwrap_or_else(|| "(not set)".to_string());
            println!("  Database: {}", url);
            println!("  Max connections: {}", config.spec.storage.max_connections);
        }
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = RoomsConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    RoomsConfigManifest::default()
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

/// Hide the password component of a connection string
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:****@{host}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rooms-config.yaml");

        generate(&output, false).await.unwrap();

        let config = RoomsConfigManifest::from_yaml_file(&output).unwrap();
        config.validate().unwrap();
        assert_eq!(config.spec.reservations.buffer_minutes, 15);
    }

    #[tokio::test]
    async fn test_generate_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rooms-config.yaml");
        std::fs::write(&output, "keep me").unwrap();

        assert!(generate(&output, false).await.is_err());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "keep me");

        generate(&output, true).await.unwrap();
        assert!(RoomsConfigManifest::from_yaml_file(&output).is_ok());
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://lounge:secret@db:5432/rooms"),
            "postgres://lounge:****@db:5432/rooms"
        );
        assert_eq!(redact_url("postgres://db/rooms"), "postgres://db/rooms");
    }
}
