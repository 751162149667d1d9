// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Lounge Rooms
//!
//! The `lounge-rooms` binary hosts the Rooms service core: it runs the
//! no-show expiration sweeper, relays integration events, and exposes admin
//! commands against the configured storage.
//!
//! ## Commands
//!
//! - `lounge-rooms daemon` - run the sweeper and event relay until Ctrl-C
//! - `lounge-rooms sweep` - run one expiration sweep and exit
//! - `lounge-rooms room add|list|maintenance` - room administration
//! - `lounge-rooms reservation create|start|end|cancel|join|show|today|active` - bookings
//! - `lounge-rooms config show|validate|generate` - configuration management
//! - `lounge-rooms migrate` - apply PostgreSQL migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lounge_rooms::commands::{
    self, ConfigCommand, MigrateCommand, ReservationCommand, RoomCommand,
};

/// Lounge Rooms - room reservations and session billing
#[derive(Parser)]
#[command(name = "lounge-rooms")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOUNGE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the expiration sweeper and event relay until interrupted
    #[command(name = "daemon")]
    Daemon,

    /// Run a single expiration sweep
    #[command(name = "sweep")]
    Sweep,

    /// Room administration
    #[command(name = "room")]
    Room {
        #[command(subcommand)]
        command: RoomCommand,
    },

    /// Reservation and session operations
    #[command(name = "reservation")]
    Reservation {
        #[command(subcommand)]
        command: ReservationCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Apply database migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Daemon) => commands::daemon::run(cli.config).await,
        Some(Commands::Sweep) => commands::sweep::run(cli.config).await,
        Some(Commands::Room { command }) => {
            commands::room::handle_command(command, cli.config).await
        }
        Some(Commands::Reservation { command }) => {
            commands::reservation::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Migrate { command }) => {
            commands::migrate::execute(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["lounge-rooms", "sweep", "--config", "rooms.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("rooms.yaml")));
        assert!(matches!(cli.command, Some(Commands::Sweep)));
    }
}
