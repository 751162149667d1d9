// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Long-running host: expiration sweeper plus integration event relay
//!
//! Committed domain events are serialized and written to the log under the
//! `lounge_rooms::events` target, where a log shipper forwards them to the
//! notification and analytics consumers.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bootstrap::RoomsRuntime;
use rooms_core::application::ExpirationSweeper;
use rooms_core::infrastructure::event_bus::{EventBusError, EventReceiver};

pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let runtime = RoomsRuntime::init(config_path).await?;

    println!(
        "{}",
        format!(
            "Lounge Rooms daemon started for branch {}",
            runtime.config.spec.branch_id
        )
        .green()
    );

    let relay_token = CancellationToken::new();
    let relay = tokio::spawn(relay_events(
        runtime.event_bus.subscribe(),
        relay_token.clone(),
    ));

    let sweeper = Arc::new(ExpirationSweeper::new(
        runtime.service.clone(),
        runtime.sweeper_config(),
    ));
    let sweeper_token = sweeper.shutdown_token();
    let sweeper_handle = sweeper.start();

    shutdown_signal().await;
    info!("Daemon shutting down");

    sweeper_token.cancel();
    sweeper_handle
        .await
        .context("Expiration sweeper task panicked")?;

    relay_token.cancel();
    relay.await.context("Event relay task panicked")?;

    println!("{}", "✓ Daemon stopped".green());
    Ok(())
}

async fn relay_events(mut receiver: EventReceiver, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(payload) => info!(
                        target: "lounge_rooms::events",
                        event_type = event.event_type(),
                        room_id = %event.room_id(),
                        "{}",
                        payload
                    ),
                    Err(e) => error!("Failed to serialize {} event: {}", event.event_type(), e),
                },
                Err(EventBusError::Lagged(n)) => {
                    warn!("Event relay dropped {} events", n);
                }
                Err(_) => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
