// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Migrate Command
//!
//! Applies the embedded schema migrations to the configured PostgreSQL
//! database.
//!
//! ```bash
//! # Apply all pending migrations
//! lounge-rooms migrate
//!
//! # Preview migrations without applying
//! lounge-rooms migrate --dry-run
//! ```
//!
//! The connection string comes from `--database-url`, then
//! `LOUNGE_DATABASE_URL`, then `spec.storage.database_url` in the manifest.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use rooms_core::domain::service_config::RoomsConfigManifest;
use rooms_core::infrastructure::db::{Database, MIGRATOR};

#[derive(Args)]
pub struct MigrateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,

    /// PostgreSQL connection string (overrides configuration)
    #[arg(long, value_name = "URL")]
    database_url: Option<String>,
}

pub async fn execute(cmd: MigrateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Lounge Rooms Migrate".bold().green());

    let database_url = match cmd.database_url {
        Some(url) => url,
        None => RoomsConfigManifest::load_or_default(config_path)
            .context("Failed to load configuration")?
            .spec
            .storage
            .database_url
            .context("No database URL configured. Set LOUNGE_DATABASE_URL or pass --database-url.")?,
    };

    println!("Connecting to database...");
    let db = Database::new(&database_url, 1)
        .await
        .context("Failed to connect to database")?;

    let applied_count = db.applied_migrations().await;
    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count >= total_migrations {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in MIGRATOR.iter().skip(applied_count) {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    db.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
