// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the persistence contracts defined in
//! `crate::domain::repository`.
//!
//! # Available Implementations
//!
//! ## PostgreSQL
//!
//! - **PostgresRoomRepository** - room rows
//! - **PostgresReservationRepository** - reservations and their members
//! - **PostgresUnitOfWork** - `sqlx` transactions with `SELECT ... FOR UPDATE` row locks
//!
//! ## In-Memory
//!
//! - **InMemoryRoomStore** - one shared store implementing all three
//!   contracts; a transaction holds a process-wide writer lock until it
//!   commits or rolls back
//!
//! # Usage
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use rooms_core::infrastructure::db::Database;
//! use rooms_core::infrastructure::repositories::postgres_reservation::PostgresReservationRepository;
//!
//! let db = Database::new("postgres://localhost/rooms", 5).await?;
//! let repo = PostgresReservationRepository::new(db.get_pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod postgres_reservation;
pub mod postgres_room;
pub mod postgres_unit_of_work;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::repository::{
    RepositoryError, ReservationRepository, RoomRepository, TransactionScope, UnitOfWork,
};
use crate::domain::reservation::{CustomerId, Reservation, ReservationId, ReservationStatus};
use crate::domain::room::{Room, RoomId};

#[derive(Debug, Default)]
struct StoreState {
    rooms: HashMap<RoomId, Room>,
    reservations: HashMap<ReservationId, Reservation>,
}

/// In-process store for development, tests and single-node demos
#[derive(Clone, Default)]
pub struct InMemoryRoomStore {
    state: Arc<RwLock<StoreState>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_reservations<F>(&self, filter: F) -> Vec<Reservation>
    where
        F: Fn(&Reservation) -> bool,
    {
        let state = self.state.read();
        let mut found: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.scheduled_start, r.created_at));
        found
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomStore {
    async fn save(&self, room: &Room) -> Result<(), RepositoryError> {
        let _writer = self.writer.lock().await;
        self.state.write().rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn update(&self, room: &Room) -> Result<(), RepositoryError> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write();
        match state.rooms.get_mut(&room.id) {
            Some(existing) => {
                *existing = room.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("Room {}", room.id))),
        }
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        Ok(self.state.read().rooms.get(&id).cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, RepositoryError> {
        let mut rooms: Vec<Room> = self.state.read().rooms.values().cloned().collect();
        rooms.sort_by_key(|r| r.created_at);
        Ok(rooms)
    }
}

#[async_trait]
impl ReservationRepository for InMemoryRoomStore {
    async fn add(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write();
        if !state.rooms.contains_key(&reservation.room_id) {
            return Err(RepositoryError::NotFound(format!("Room {}", reservation.room_id)));
        }
        if state.reservations.contains_key(&reservation.id) {
            return Err(RepositoryError::Conflict(format!(
                "Reservation {} already exists",
                reservation.id
            )));
        }
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn update(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write();
        match state.reservations.get_mut(&reservation.id) {
            Some(existing) => {
                *existing = reservation.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("Reservation {}", reservation.id))),
        }
    }

    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        Ok(self.state.read().reservations.get(&id).cloned())
    }

    async fn get_active_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        Ok(self.collect_reservations(|r| {
            r.status().blocks_room() && r.involves_customer(customer_id)
        }))
    }

    async fn get_today_for_room(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        Ok(self.collect_reservations(|r| r.room_id == room_id && r.is_scheduled_on(date)))
    }

    async fn get_active_sessions(&self) -> Result<Vec<Reservation>, RepositoryError> {
        Ok(self.collect_reservations(|r| r.status() == ReservationStatus::Active))
    }

    async fn has_conflicting_reservation(
        &self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .reservations
            .values()
            .any(|r| r.room_id == room_id && r.conflicts_with(scheduled_start, buffer)))
    }

    async fn get_by_access_code(&self, code: &str) -> Result<Option<Reservation>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .reservations
            .values()
            .find(|r| {
                r.status().blocks_room()
                    && r.access_code()
                        .is_some_and(|c| c.eq_ignore_ascii_case(code))
            })
            .cloned())
    }

    async fn get_expired(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let mut expired = self.collect_reservations(|r| {
            r.status() == ReservationStatus::Reserved && r.created_at <= threshold
        });
        expired.sort_by_key(|r| r.created_at);
        Ok(expired)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryRoomStore {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, RepositoryError> {
        let guard = self.writer.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            _writer: guard,
            rooms: HashMap::new(),
            reservations: HashMap::new(),
        }))
    }
}

/// Writes staged against [`InMemoryRoomStore`] until commit
pub struct InMemoryTransaction {
    state: Arc<RwLock<StoreState>>,
    _writer: OwnedMutexGuard<()>,
    rooms: HashMap<RoomId, Room>,
    reservations: HashMap<ReservationId, Reservation>,
}

#[async_trait]
impl TransactionScope for InMemoryTransaction {
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        if let Some(room) = self.rooms.get(&id) {
            return Ok(Some(room.clone()));
        }
        Ok(self.state.read().rooms.get(&id).cloned())
    }

    async fn lock_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        if let Some(reservation) = self.reservations.get(&id) {
            return Ok(Some(reservation.clone()));
        }
        Ok(self.state.read().reservations.get(&id).cloned())
    }

    async fn has_conflicting_reservation(
        &mut self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<bool, RepositoryError> {
        let hit =
            |r: &Reservation| r.room_id == room_id && r.conflicts_with(scheduled_start, buffer);

        if self.reservations.values().any(hit) {
            return Ok(true);
        }
        let state = self.state.read();
        Ok(state
            .reservations
            .values()
            .filter(|r| !self.reservations.contains_key(&r.id))
            .any(hit))
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        let exists = self.reservations.contains_key(&reservation.id)
            || self.state.read().reservations.contains_key(&reservation.id);
        if exists {
            return Err(RepositoryError::Conflict(format!(
                "Reservation {} already exists",
                reservation.id
            )));
        }
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn update_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        let known = self.reservations.contains_key(&reservation.id)
            || self.state.read().reservations.contains_key(&reservation.id);
        if !known {
            return Err(RepositoryError::NotFound(format!("Reservation {}", reservation.id)));
        }
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn update_room(&mut self, room: &Room) -> Result<(), RepositoryError> {
        let known =
            self.rooms.contains_key(&room.id) || self.state.read().rooms.contains_key(&room.id);
        if !known {
            return Err(RepositoryError::NotFound(format!("Room {}", room.id)));
        }
        self.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let this = *self;
        let mut state = this.state.write();
        state.rooms.extend(this.rooms);
        state.reservations.extend(this.reservations);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventBuffer;
    use crate::domain::reservation::{ReservationPolicy, ReservationRequest};
    use crate::domain::room::{BranchId, LocalizedText};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 2, 18, 0, 0).unwrap()
    }

    fn room_named(name: &str, rate: rust_decimal::Decimal) -> Room {
        Room::new(name.into(), LocalizedText::default(), rate, BranchId::default(), t0()).unwrap()
    }

    async fn seeded() -> (InMemoryRoomStore, Room) {
        let store = InMemoryRoomStore::new();
        let room = room_named("VR Pod", dec!(40));
        RoomRepository::save(&store, &room).await.unwrap();
        (store, room)
    }

    fn booking(room: &Room, at: DateTime<Utc>) -> Reservation {
        let request = ReservationRequest::new(room.id, CustomerId::new(), at);
        let policy = ReservationPolicy::default();
        Reservation::create(room, request, t0(), &policy, &mut EventBuffer::new()).unwrap()
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let (store, room) = seeded().await;
        let reservation = booking(&room, t0());

        let mut tx = store.begin().await.unwrap();
        tx.insert_reservation(&reservation).await.unwrap();
        assert!(store.get_by_id(reservation.id).await.unwrap().is_none());
        tx.commit().await.unwrap();

        assert!(store.get_by_id(reservation.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let (store, room) = seeded().await;
        let reservation = booking(&room, t0());

        let mut tx = store.begin().await.unwrap();
        tx.insert_reservation(&reservation).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.get_by_id(reservation.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transaction_sees_its_own_inserts_in_conflict_check() {
        let (store, room) = seeded().await;
        let buffer = Duration::minutes(15);

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.has_conflicting_reservation(room.id, t0(), buffer).await.unwrap());
        tx.insert_reservation(&booking(&room, t0())).await.unwrap();
        assert!(tx
            .has_conflicting_reservation(room.id, t0() + Duration::minutes(10), buffer)
            .await
            .unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_transaction_waits_for_first() {
        let (store, _room) = seeded().await;

        let tx = store.begin().await.unwrap();
        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let tx = contender.begin().await.unwrap();
            tx.rollback().await.unwrap();
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        tx.commit().await.unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_queries_filter_by_status_and_window() {
        let (store, room) = seeded().await;
        let near = booking(&room, t0());
        let far = booking(&room, t0() + Duration::hours(3));
        store.add(&near).await.unwrap();
        store.add(&far).await.unwrap();

        let buffer = Duration::minutes(15);
        assert!(store
            .has_conflicting_reservation(room.id, t0() + Duration::minutes(15), buffer)
            .await
            .unwrap());
        assert!(!store
            .has_conflicting_reservation(room.id, t0() + Duration::minutes(90), buffer)
            .await
            .unwrap());

        let today = store.get_today_for_room(room.id, t0().date_naive()).await.unwrap();
        assert_eq!(today.len(), 2);
        assert_eq!(today[0].id, near.id);

        let expired = store.get_expired(t0()).await.unwrap();
        assert_eq!(expired.len(), 2);
        assert!(store.get_active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_room_and_duplicates() {
        let (store, room) = seeded().await;
        let reservation = booking(&room, t0());
        store.add(&reservation).await.unwrap();
        assert!(matches!(store.add(&reservation).await, Err(RepositoryError::Conflict(_))));

        let stranger = room_named("Ghost", dec!(10));
        let orphan = booking(&stranger, t0());
        assert!(matches!(store.add(&orphan).await, Err(RepositoryError::NotFound(_))));
    }
}
