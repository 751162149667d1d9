// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service wiring shared by every command that touches reservations

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use rooms_core::application::{
    create_repositories, ExpirationSweeperConfig, StandardReservationService,
};
use rooms_core::domain::clock::SystemClock;
use rooms_core::domain::service_config::{RoomsConfigManifest, StorageBackendKind};
use rooms_core::infrastructure::event_bus::EventBus;

pub struct RoomsRuntime {
    pub config: RoomsConfigManifest,
    pub service: Arc<StandardReservationService>,
    pub event_bus: EventBus,
}

impl RoomsRuntime {
    /// Load and validate configuration, then build repositories and the service
    pub async fn init(config_path: Option<PathBuf>) -> Result<Self> {
        let config = RoomsConfigManifest::load_or_default(config_path)
            .context("Failed to load configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;

        info!(
            name = %config.metadata.name,
            branch_id = %config.spec.branch_id,
            "Configuration loaded"
        );

        let repositories = create_repositories(&config.storage_backend())
            .await
            .context("Failed to initialize storage")?;
        let event_bus = EventBus::with_default_capacity();

        let service = Arc::new(StandardReservationService::new(
            repositories.rooms,
            repositories.reservations,
            repositories.unit_of_work,
            Arc::new(event_bus.clone()),
            Arc::new(SystemClock),
            config.reservation_policy(),
            config.spec.branch_id.clone(),
        ));

        Ok(Self {
            config,
            service,
            event_bus,
        })
    }

    pub fn sweeper_config(&self) -> ExpirationSweeperConfig {
        ExpirationSweeperConfig {
            interval_seconds: self.config.spec.sweeper.interval_seconds,
            enabled: self.config.spec.sweeper.enabled,
        }
    }

    /// One-shot commands against the in-memory backend see an empty store
    pub fn warn_if_ephemeral(&self) {
        if self.config.spec.storage.backend == StorageBackendKind::InMemory {
            warn!("Using in-memory storage; state does not outlive this process");
        }
    }
}
