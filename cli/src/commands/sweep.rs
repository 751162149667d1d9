// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One-shot expiration sweep, for cron-style deployments that do not run
//! the daemon

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::bootstrap::RoomsRuntime;
use rooms_core::application::ExpirationSweeper;

pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let runtime = RoomsRuntime::init(config_path).await?;
    runtime.warn_if_ephemeral();

    let sweeper = ExpirationSweeper::new(runtime.service.clone(), runtime.sweeper_config());
    let expired = sweeper
        .sweep_once()
        .await
        .context("Expiration sweep failed")?;

    if expired == 0 {
        println!("{}", "No expired reservations".dimmed());
    } else {
        println!(
            "{}",
            format!("✓ Auto-cancelled {} expired reservation(s)", expired).green()
        );
    }

    Ok(())
}
