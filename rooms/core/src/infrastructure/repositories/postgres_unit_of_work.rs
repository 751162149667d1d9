// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Unit of Work
//!
//! Each scope wraps one `sqlx` transaction. `lock_room` and
//! `lock_reservation` issue `SELECT ... FOR UPDATE`, so two bookings for the
//! same room queue behind each other and the loser's conflict check sees the
//! winner's committed row. Dropping a scope without committing rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;

use super::postgres_reservation::{
    conflict_exists, insert_reservation_row, lock_reservation_row, update_reservation_row,
};
use super::postgres_room::{lock_room_row, update_room_row};
use crate::domain::repository::{RepositoryError, TransactionScope, UnitOfWork};
use crate::domain::reservation::{Reservation, ReservationId};
use crate::domain::room::{Room, RoomId};

pub struct PostgresUnitOfWork {
    pool: PgPool,
}

impl PostgresUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransactionScope { tx }))
    }
}

pub struct PostgresTransactionScope {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionScope for PostgresTransactionScope {
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        lock_room_row(&mut self.tx, id).await
    }

    async fn lock_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        lock_reservation_row(&mut self.tx, id).await
    }

    async fn has_conflicting_reservation(
        &mut self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<bool, RepositoryError> {
        conflict_exists(&mut self.tx, room_id, scheduled_start, buffer).await
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        insert_reservation_row(&mut self.tx, reservation).await
    }

    async fn update_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        update_reservation_row(&mut self.tx, reservation).await
    }

    async fn update_room(&mut self, room: &Room) -> Result<(), RepositoryError> {
        update_room_row(&mut self.tx, room).await
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
