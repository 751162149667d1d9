// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Builds the concrete repositories and unit of work for the configured
//! storage backend. The three handles always share one store (in-memory) or
//! one pool (PostgreSQL), so a transaction sees the same data the queries do.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::domain::repository::{
    ReservationRepository, RoomRepository, StorageBackend, UnitOfWork,
};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::postgres_reservation::PostgresReservationRepository;
use crate::infrastructure::repositories::postgres_room::PostgresRoomRepository;
use crate::infrastructure::repositories::postgres_unit_of_work::PostgresUnitOfWork;
use crate::infrastructure::repositories::InMemoryRoomStore;

#[derive(Clone)]
pub struct RoomsRepositories {
    pub rooms: Arc<dyn RoomRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
}

impl RoomsRepositories {
    pub fn in_memory() -> Self {
        Self::from_store(InMemoryRoomStore::new())
    }

    pub fn from_store(store: InMemoryRoomStore) -> Self {
        let store = Arc::new(store);
        Self {
            rooms: store.clone(),
            reservations: store.clone(),
            unit_of_work: store,
        }
    }

    pub fn postgres(db: &Database) -> Self {
        let pool = db.get_pool().clone();
        Self {
            rooms: Arc::new(PostgresRoomRepository::new(pool.clone())),
            reservations: Arc::new(PostgresReservationRepository::new(pool.clone())),
            unit_of_work: Arc::new(PostgresUnitOfWork::new(pool)),
        }
    }
}

/// Creates repositories for the configured backend, connecting and migrating
/// the database when PostgreSQL is selected
pub async fn create_repositories(backend: &StorageBackend) -> Result<RoomsRepositories> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory storage; data is lost on restart");
            Ok(RoomsRepositories::in_memory())
        }
        StorageBackend::PostgreSQL(config) => {
            let db = Database::new(&config.connection_string, config.max_connections).await?;
            db.migrate().await?;
            info!(max_connections = config.max_connections, "Connected to PostgreSQL");
            Ok(RoomsRepositories::postgres(&db))
        }
    }
}
