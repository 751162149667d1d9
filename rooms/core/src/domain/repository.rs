// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the Rooms aggregates, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `RoomRepository` | `Room` | `InMemoryRoomStore`, `PostgresRoomRepository` |
//! | `ReservationRepository` | `Reservation` | `InMemoryRoomStore`, `PostgresReservationRepository` |
//! | `UnitOfWork` | both | `InMemoryRoomStore`, `PostgresUnitOfWork` |
//!
//! ## Transactions
//!
//! Every command that changes state runs inside a [`TransactionScope`]
//! obtained from [`UnitOfWork::begin`]. The scope is a value the caller owns
//! and must finish with `commit` or `rollback`; dropping it without either
//! discards the staged writes. Locking a room or reservation through the
//! scope serialises writers touching the same rows until the scope ends.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::reservation::{CustomerId, Reservation, ReservationId};
use crate::domain::room::{Room, RoomId};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Repository interface for Room entities
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Insert a new room (or overwrite an existing one)
    async fn save(&self, room: &Room) -> Result<(), RepositoryError>;

    /// Update an existing room; `NotFound` if it was never saved
    async fn update(&self, room: &Room) -> Result<(), RepositoryError>;

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError>;

    async fn list_rooms(&self) -> Result<Vec<Room>, RepositoryError>;
}

/// Repository interface for Reservation aggregates (read side plus plain writes)
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn add(&self, reservation: &Reservation) -> Result<(), RepositoryError>;

    async fn update(&self, reservation: &Reservation) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError>;

    /// Reserved or Active reservations the customer booked or joined
    async fn get_active_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Reservation>, RepositoryError>;

    /// Reservations of any status scheduled on `date` (UTC), ordered by scheduled start
    async fn get_today_for_room(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, RepositoryError>;

    /// Every reservation currently in session
    async fn get_active_sessions(&self) -> Result<Vec<Reservation>, RepositoryError>;

    /// True iff a Reserved/Active reservation for the room is scheduled within
    /// `[scheduled_start - buffer, scheduled_start + buffer]`
    async fn has_conflicting_reservation(
        &self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<bool, RepositoryError>;

    /// Open (Reserved or Active) reservation carrying this access code
    async fn get_by_access_code(&self, code: &str) -> Result<Option<Reservation>, RepositoryError>;

    /// Reserved reservations created at or before `threshold` (no-show candidates)
    async fn get_expired(&self, threshold: DateTime<Utc>)
        -> Result<Vec<Reservation>, RepositoryError>;
}

/// Factory for transaction scopes
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, RepositoryError>;
}

/// One open transaction.
///
/// Reads through `lock_*` take a row lock held until `commit`/`rollback`.
#[async_trait]
pub trait TransactionScope: Send {
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>, RepositoryError>;

    async fn lock_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// Conflict check that sees this transaction's own staged inserts
    async fn has_conflicting_reservation(
        &mut self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<bool, RepositoryError>;

    async fn insert_reservation(&mut self, reservation: &Reservation)
        -> Result<(), RepositoryError>;

    async fn update_reservation(&mut self, reservation: &Reservation)
        -> Result<(), RepositoryError>;

    async fn update_room(&mut self, room: &Room) -> Result<(), RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A uniqueness or exclusion constraint rejected the write
    #[error("Constraint conflict: {0}")]
    Conflict(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// SQLSTATE unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE exclusion_violation
const PG_EXCLUSION_VIOLATION: &str = "23P01";

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db)
                if matches!(
                    db.code().as_deref(),
                    Some(PG_UNIQUE_VIOLATION) | Some(PG_EXCLUSION_VIOLATION)
                ) =>
            {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: RepositoryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn test_other_sqlx_errors_map_to_database() {
        let err: RepositoryError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
