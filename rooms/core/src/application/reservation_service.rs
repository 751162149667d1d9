// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reservation Application Service
//!
//! Command handlers and queries for rooms, reservations and sessions.
//!
//! Every state-changing command follows the same shape:
//! 1. open a [`TransactionScope`]
//! 2. lock the rows it touches (room first, then reservation)
//! 3. run the aggregate method against an [`EventBuffer`]
//! 4. stage the writes and commit
//! 5. publish the buffered events
//!
//! A failure at any step rolls back and drops the buffer, so consumers never
//! see an event for state that was not persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::clock::Clock;
use crate::domain::events::{EventBuffer, EventPublisher};
use crate::domain::repository::{
    RepositoryError, ReservationRepository, RoomRepository, TransactionScope, UnitOfWork,
};
use crate::domain::reservation::{
    CustomerId, MemberRole, Reservation, ReservationError, ReservationId, ReservationPolicy,
    ReservationRequest,
};
use crate::domain::room::{BranchId, LocalizedText, Room, RoomId};

pub type ServiceResult<T> = Result<T, ReservationError>;

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait ReservationService: Send + Sync {
    /// Add a bookable room to this branch
    async fn register_room(
        &self,
        name: LocalizedText,
        description: LocalizedText,
        hourly_rate: Decimal,
    ) -> ServiceResult<Room>;

    /// Change the rate for future bookings; existing reservations keep their snapshot
    async fn change_room_rate(&self, room_id: RoomId, hourly_rate: Decimal) -> ServiceResult<Room>;

    async fn set_room_maintenance(&self, room_id: RoomId, under_maintenance: bool)
        -> ServiceResult<Room>;

    async fn list_rooms(&self) -> ServiceResult<Vec<Room>>;

    async fn create_reservation(&self, request: ReservationRequest) -> ServiceResult<Reservation>;

    async fn start_session(&self, reservation_id: ReservationId) -> ServiceResult<Reservation>;

    async fn end_session(&self, reservation_id: ReservationId) -> ServiceResult<Reservation>;

    async fn cancel_reservation(&self, reservation_id: ReservationId) -> ServiceResult<Reservation>;

    /// Add a guest to an open reservation
    async fn add_member(
        &self,
        reservation_id: ReservationId,
        customer_id: CustomerId,
        customer_name: String,
    ) -> ServiceResult<Reservation>;

    /// Resolve an access code and add the customer as a guest
    async fn join_by_access_code(
        &self,
        code: &str,
        customer_id: CustomerId,
        customer_name: String,
    ) -> ServiceResult<Reservation>;

    async fn get_reservation(&self, reservation_id: ReservationId) -> ServiceResult<Reservation>;

    async fn get_active_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> ServiceResult<Vec<Reservation>>;

    /// Reservations scheduled on the current UTC date
    async fn get_today_for_room(&self, room_id: RoomId) -> ServiceResult<Vec<Reservation>>;

    async fn get_active_sessions(&self) -> ServiceResult<Vec<Reservation>>;

    async fn get_by_access_code(&self, code: &str) -> ServiceResult<Reservation>;

    /// True when a booking at `scheduled_start` would not conflict.
    ///
    /// Advisory only; `create_reservation` re-checks under lock.
    async fn check_availability(
        &self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
    ) -> ServiceResult<bool>;

    /// Cancel every Reserved booking past the no-show grace period.
    /// Returns the number cancelled by this call.
    async fn expire_stale_reservations(&self) -> ServiceResult<usize>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardReservationService {
    rooms: Arc<dyn RoomRepository>,
    reservations: Arc<dyn ReservationRepository>,
    unit_of_work: Arc<dyn UnitOfWork>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    policy: ReservationPolicy,
    branch_id: BranchId,
}

impl StandardReservationService {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        reservations: Arc<dyn ReservationRepository>,
        unit_of_work: Arc<dyn UnitOfWork>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        policy: ReservationPolicy,
        branch_id: BranchId,
    ) -> Self {
        Self {
            rooms,
            reservations,
            unit_of_work,
            publisher,
            clock,
            policy,
            branch_id,
        }
    }

    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    /// Commit on success and publish, roll back on failure
    async fn finish<T: Send>(
        &self,
        tx: Box<dyn TransactionScope>,
        outcome: ServiceResult<T>,
        mut events: EventBuffer,
    ) -> ServiceResult<T> {
        match outcome {
            Ok(value) => {
                tx.commit().await?;
                for event in events.drain() {
                    self.publisher.publish(event);
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback failed after '{}': {}", err, rollback_err);
                }
                Err(err)
            }
        }
    }

    async fn locked_room(tx: &mut dyn TransactionScope, room_id: RoomId) -> ServiceResult<Room> {
        tx.lock_room(room_id)
            .await?
            .ok_or(ReservationError::RoomNotFound(room_id))
    }

    async fn locked_reservation(
        tx: &mut dyn TransactionScope,
        reservation_id: ReservationId,
    ) -> ServiceResult<Reservation> {
        tx.lock_reservation(reservation_id)
            .await?
            .ok_or(ReservationError::ReservationNotFound(reservation_id))
    }

    /// Room first, then reservation, so every writer takes locks in one order
    async fn lock_pair(
        &self,
        tx: &mut dyn TransactionScope,
        reservation_id: ReservationId,
    ) -> ServiceResult<(Room, Reservation)> {
        let snapshot = self
            .reservations
            .get_by_id(reservation_id)
            .await?
            .ok_or(ReservationError::ReservationNotFound(reservation_id))?;
        let room = Self::locked_room(tx, snapshot.room_id).await?;
        let reservation = Self::locked_reservation(tx, reservation_id).await?;
        Ok((room, reservation))
    }

    async fn create_in(
        &self,
        tx: &mut dyn TransactionScope,
        request: ReservationRequest,
        events: &mut EventBuffer,
    ) -> ServiceResult<Reservation> {
        let room = Self::locked_room(tx, request.room_id).await?;

        let conflict = tx
            .has_conflicting_reservation(room.id, request.scheduled_start, self.policy.buffer())
            .await?;
        if conflict {
            return Err(ReservationError::Conflict {
                room_id: room.id,
                scheduled_start: request.scheduled_start,
            });
        }

        let now = self.clock.now();
        let reservation = Reservation::create(&room, request, now, &self.policy, events)?;
        tx.insert_reservation(&reservation).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => ReservationError::Conflict {
                room_id: reservation.room_id,
                scheduled_start: reservation.scheduled_start,
            },
            other => other.into(),
        })?;
        Ok(reservation)
    }

    async fn start_in(
        &self,
        tx: &mut dyn TransactionScope,
        reservation_id: ReservationId,
        events: &mut EventBuffer,
    ) -> ServiceResult<Reservation> {
        let (mut room, mut reservation) = self.lock_pair(tx, reservation_id).await?;
        reservation.start_session(&mut room, self.clock.now(), events)?;
        tx.update_reservation(&reservation).await?;
        tx.update_room(&room).await?;
        Ok(reservation)
    }

    async fn end_in(
        &self,
        tx: &mut dyn TransactionScope,
        reservation_id: ReservationId,
        events: &mut EventBuffer,
    ) -> ServiceResult<Reservation> {
        let (mut room, mut reservation) = self.lock_pair(tx, reservation_id).await?;
        reservation.end_session(&mut room, self.clock.now(), events)?;
        tx.update_reservation(&reservation).await?;
        tx.update_room(&room).await?;
        Ok(reservation)
    }

    async fn cancel_in(
        &self,
        tx: &mut dyn TransactionScope,
        reservation_id: ReservationId,
        events: &mut EventBuffer,
    ) -> ServiceResult<Reservation> {
        let (room, mut reservation) = self.lock_pair(tx, reservation_id).await?;
        reservation.cancel(&room, self.clock.now(), events)?;
        tx.update_reservation(&reservation).await?;
        Ok(reservation)
    }

    async fn add_member_in(
        &self,
        tx: &mut dyn TransactionScope,
        reservation_id: ReservationId,
        customer_id: CustomerId,
        customer_name: String,
    ) -> ServiceResult<Reservation> {
        let mut reservation = Self::locked_reservation(tx, reservation_id).await?;
        reservation.add_member(customer_id, customer_name, MemberRole::Guest, self.clock.now())?;
        tx.update_reservation(&reservation).await?;
        Ok(reservation)
    }

    /// Returns `None` when another writer already moved the reservation on
    async fn expire_in(
        &self,
        tx: &mut dyn TransactionScope,
        reservation_id: ReservationId,
        events: &mut EventBuffer,
    ) -> ServiceResult<Option<Reservation>> {
        let (room, mut reservation) = self.lock_pair(tx, reservation_id).await?;
        let now = self.clock.now();
        if !reservation.is_expired(now, &self.policy) {
            return Ok(None);
        }
        reservation.cancel_due_to_expiration(&room, now, events)?;
        tx.update_reservation(&reservation).await?;
        Ok(Some(reservation))
    }

    async fn expire_one(&self, reservation_id: ReservationId) -> ServiceResult<bool> {
        let mut tx = self.unit_of_work.begin().await?;
        let mut events = EventBuffer::new();
        let outcome = self.expire_in(&mut *tx, reservation_id, &mut events).await;
        Ok(self.finish(tx, outcome, events).await?.is_some())
    }

    async fn maintenance_in(
        tx: &mut dyn TransactionScope,
        room_id: RoomId,
        under_maintenance: bool,
    ) -> ServiceResult<Room> {
        let mut room = Self::locked_room(tx, room_id).await?;
        if under_maintenance {
            room.start_maintenance()?;
        } else {
            room.finish_maintenance();
        }
        tx.update_room(&room).await?;
        Ok(room)
    }

    fn validate_access_code(code: &str) -> ServiceResult<&str> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ReservationError::Validation("Access code cannot be empty".to_string()));
        }
        Ok(code)
    }
}

#[async_trait]
impl ReservationService for StandardReservationService {
    async fn register_room(
        &self,
        name: LocalizedText,
        description: LocalizedText,
        hourly_rate: Decimal,
    ) -> ServiceResult<Room> {
        let now = self.clock.now();
        let room = Room::new(name, description, hourly_rate, self.branch_id.clone(), now)?;
        self.rooms.save(&room).await?;
        info!(room_id = %room.id, name = room.display_name(), %hourly_rate, "Registered room");
        Ok(room)
    }

    async fn change_room_rate(&self, room_id: RoomId, hourly_rate: Decimal) -> ServiceResult<Room> {
        let mut room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or(ReservationError::RoomNotFound(room_id))?;
        room.change_hourly_rate(hourly_rate)?;
        self.rooms.update(&room).await?;
        info!(%room_id, %hourly_rate, "Room rate changed");
        Ok(room)
    }

    async fn set_room_maintenance(
        &self,
        room_id: RoomId,
        under_maintenance: bool,
    ) -> ServiceResult<Room> {
        let mut tx = self.unit_of_work.begin().await?;
        let outcome = Self::maintenance_in(&mut *tx, room_id, under_maintenance).await;
        let room = self.finish(tx, outcome, EventBuffer::new()).await?;
        info!(%room_id, status = %room.status(), "Room maintenance status changed");
        Ok(room)
    }

    async fn list_rooms(&self) -> ServiceResult<Vec<Room>> {
        Ok(self.rooms.list_rooms().await?)
    }

    async fn create_reservation(&self, request: ReservationRequest) -> ServiceResult<Reservation> {
        let room_id = request.room_id;
        let scheduled_start = request.scheduled_start;

        let mut tx = self.unit_of_work.begin().await?;
        let mut events = EventBuffer::new();
        let outcome = self.create_in(&mut *tx, request, &mut events).await;
        match self.finish(tx, outcome, events).await {
            Ok(reservation) => {
                info!(
                    reservation_id = %reservation.id,
                    %room_id,
                    %scheduled_start,
                    shared = reservation.access_code().is_some(),
                    "Reservation created"
                );
                Ok(reservation)
            }
            Err(err) => {
                debug!(%room_id, %scheduled_start, "Reservation rejected: {}", err);
                Err(err)
            }
        }
    }

    async fn start_session(&self, reservation_id: ReservationId) -> ServiceResult<Reservation> {
        let mut tx = self.unit_of_work.begin().await?;
        let mut events = EventBuffer::new();
        let outcome = self.start_in(&mut *tx, reservation_id, &mut events).await;
        let reservation = self.finish(tx, outcome, events).await?;
        info!(%reservation_id, room_id = %reservation.room_id, "Session started");
        Ok(reservation)
    }

    async fn end_session(&self, reservation_id: ReservationId) -> ServiceResult<Reservation> {
        let mut tx = self.unit_of_work.begin().await?;
        let mut events = EventBuffer::new();
        let outcome = self.end_in(&mut *tx, reservation_id, &mut events).await;
        let reservation = self.finish(tx, outcome, events).await?;
        info!(
            %reservation_id,
            room_id = %reservation.room_id,
            total_cost = %reservation.total_cost().unwrap_or_default(),
            duration_minutes = reservation.duration_minutes().unwrap_or_default(),
            "Session completed"
        );
        Ok(reservation)
    }

    async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> ServiceResult<Reservation> {
        let mut tx = self.unit_of_work.begin().await?;
        let mut events = EventBuffer::new();
        let outcome = self.cancel_in(&mut *tx, reservation_id, &mut events).await;
        let reservation = self.finish(tx, outcome, events).await?;
        info!(%reservation_id, "Reservation cancelled by customer");
        Ok(reservation)
    }

    async fn add_member(
        &self,
        reservation_id: ReservationId,
        customer_id: CustomerId,
        customer_name: String,
    ) -> ServiceResult<Reservation> {
        let mut tx = self.unit_of_work.begin().await?;
        let outcome = self
            .add_member_in(&mut *tx, reservation_id, customer_id, customer_name)
            .await;
        let reservation = self.finish(tx, outcome, EventBuffer::new()).await?;
        info!(%reservation_id, %customer_id, "Member joined reservation");
        Ok(reservation)
    }

    async fn join_by_access_code(
        &self,
        code: &str,
        customer_id: CustomerId,
        customer_name: String,
    ) -> ServiceResult<Reservation> {
        let reservation = self.get_by_access_code(code).await?;
        self.add_member(reservation.id, customer_id, customer_name).await
    }

    async fn get_reservation(&self, reservation_id: ReservationId) -> ServiceResult<Reservation> {
        self.reservations
            .get_by_id(reservation_id)
            .await?
            .ok_or(ReservationError::ReservationNotFound(reservation_id))
    }

    async fn get_active_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> ServiceResult<Vec<Reservation>> {
        Ok(self.reservations.get_active_for_customer(customer_id).await?)
    }

    async fn get_today_for_room(&self, room_id: RoomId) -> ServiceResult<Vec<Reservation>> {
        let today = self.clock.now().date_naive();
        Ok(self.reservations.get_today_for_room(room_id, today).await?)
    }

    async fn get_active_sessions(&self) -> ServiceResult<Vec<Reservation>> {
        Ok(self.reservations.get_active_sessions().await?)
    }

    async fn get_by_access_code(&self, code: &str) -> ServiceResult<Reservation> {
        let code = Self::validate_access_code(code)?;
        self.reservations
            .get_by_access_code(code)
            .await?
            .ok_or_else(|| ReservationError::AccessCodeNotFound(code.to_string()))
    }

    async fn check_availability(
        &self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        if self.rooms.get_room(room_id).await?.is_none() {
            return Err(ReservationError::RoomNotFound(room_id));
        }
        let conflict = self
            .reservations
            .has_conflicting_reservation(room_id, scheduled_start, self.policy.buffer())
            .await?;
        Ok(!conflict)
    }

    async fn expire_stale_reservations(&self) -> ServiceResult<usize> {
        let threshold = self.clock.now() - self.policy.expiration();
        let candidates = self.reservations.get_expired(threshold).await?;
        if candidates.is_empty() {
            debug!(%threshold, "No stale reservations");
            return Ok(0);
        }

        let mut expired = 0;
        for candidate in candidates {
            match self.expire_one(candidate.id).await {
                Ok(true) => {
                    expired += 1;
                    info!(
                        reservation_id = %candidate.id,
                        room_id = %candidate.room_id,
                        created_at = %candidate.created_at,
                        "Reservation expired (no-show)"
                    );
                }
                Ok(false) => {
                    debug!(
                        reservation_id = %candidate.id,
                        "Reservation no longer eligible for expiration"
                    );
                }
                Err(e) => {
                    warn!(reservation_id = %candidate.id, "Failed to expire reservation: {}", e);
                }
            }
        }

        Ok(expired)
    }
}
