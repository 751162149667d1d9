// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reservation aggregate root
//!
//! A reservation books a room for a customer and carries the session that
//! follows it. The lifecycle only moves forward:
//!
//! ```text
//! Reserved ──start──▶ Active ──end──▶ Completed
//!    │
//!    └──cancel / expire──▶ Cancelled
//! ```
//!
//! Aggregate methods never reach into persistence. They take the current time
//! and an [`EventBuffer`] from the caller, mutate in memory, and record the
//! integration events the caller publishes once the transaction commits.
//! Conflict detection against other reservations needs the repository and
//! lives in the application service.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::billing;
use crate::domain::events::{
    EventBuffer, ReservationCancelled, RoomBecameAvailable, RoomEvent, RoomReserved,
    SessionCompleted, SessionStarted,
};
use crate::domain::repository::RepositoryError;
use crate::domain::room::{Room, RoomError, RoomId};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub Uuid);

impl CustomerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Active,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    /// Statuses that hold the room and take part in conflict detection
    pub fn blocks_room(&self) -> bool {
        matches!(self, Self::Reserved | Self::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(Self::Reserved),
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a reservation ended up `Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationReason {
    /// Customer or staff cancelled explicitly
    Customer,
    /// No-show: the sweeper cancelled it after the grace period
    Expired,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Guest,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Guest => "guest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }
}

/// A customer sharing the room for a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMember {
    pub reservation_id: ReservationId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub joined_at: DateTime<Utc>,
    pub role: MemberRole,
}

/// Booking rules that come from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// Two bookings for the same room conflict when their scheduled starts are this close
    pub buffer_minutes: i64,
    /// Grace period between booking and session start before the sweeper cancels
    pub expiration_minutes: i64,
    pub max_notes_length: usize,
}

/// Upper bound for the buffer and expiration windows (one day)
pub const MAX_POLICY_MINUTES: i64 = 24 * 60;

impl ReservationPolicy {
    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.buffer_minutes.clamp(0, MAX_POLICY_MINUTES))
    }

    pub fn expiration(&self) -> Duration {
        Duration::minutes(self.expiration_minutes.clamp(0, MAX_POLICY_MINUTES))
    }
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            buffer_minutes: 15,
            expiration_minutes: 15,
            max_notes_length: 500,
        }
    }
}

/// Input for booking a room
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub room_id: RoomId,
    pub customer_id: CustomerId,
    pub customer_name: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub notes: Option<String>,
    /// Issue a code other customers can use to join the session
    pub shared: bool,
}

impl ReservationRequest {
    pub fn new(room_id: RoomId, customer_id: CustomerId, scheduled_start: DateTime<Utc>) -> Self {
        Self {
            room_id,
            customer_id,
            customer_name: None,
            scheduled_start,
            notes: None,
            shared: false,
        }
    }

    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Caller-facing classification of [`ReservationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Conflict,
    InvalidState,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Room {room_id} already has a booking within the buffer window of {scheduled_start}")]
    Conflict {
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
    },

    #[error("Customer {customer_id} is already a member of reservation {reservation_id}")]
    DuplicateMember {
        reservation_id: ReservationId,
        customer_id: CustomerId,
    },

    #[error("Cannot {operation} a reservation that is {status}")]
    InvalidState {
        operation: &'static str,
        status: ReservationStatus,
    },

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    #[error("No open reservation for access code {0}")]
    AccessCodeNotFound(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ReservationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Conflict { .. } | Self::DuplicateMember { .. } => ErrorCategory::Conflict,
            Self::InvalidState { .. } => ErrorCategory::InvalidState,
            Self::Room(RoomError::InvalidName(_) | RoomError::InvalidRate(_)) => {
                ErrorCategory::Validation
            }
            Self::Room(
                RoomError::Occupied(_)
                | RoomError::UnderMaintenance(_)
                | RoomError::AlreadyOccupied(_),
            ) => ErrorCategory::InvalidState,
            Self::RoomNotFound(_) | Self::ReservationNotFound(_) | Self::AccessCodeNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::Repository(RepositoryError::Conflict(_)) => ErrorCategory::Conflict,
            Self::Repository(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }

    pub fn is_invalid_state(&self) -> bool {
        self.category() == ErrorCategory::InvalidState
    }
}

// ============================================================================
// Aggregate Root: Reservation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub customer_id: CustomerId,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_start: DateTime<Utc>,
    pub notes: String,
    pub(crate) actual_start_time: Option<DateTime<Utc>>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) hourly_rate: Decimal,
    pub(crate) total_cost: Option<Decimal>,
    pub(crate) status: ReservationStatus,
    pub(crate) access_code: Option<String>,
    pub(crate) members: Vec<SessionMember>,
    pub(crate) cancellation_reason: Option<CancellationReason>,
    pub(crate) cancelled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Book `room` for the requesting customer.
    ///
    /// Snapshots the room's current hourly rate and records the booking
    /// customer as the owning member.
    pub fn create(
        room: &Room,
        request: ReservationRequest,
        now: DateTime<Utc>,
        policy: &ReservationPolicy,
        events: &mut EventBuffer,
    ) -> Result<Self, ReservationError> {
        if request.room_id != room.id {
            return Err(ReservationError::Validation(format!(
                "Request targets room {} but room {} was supplied",
                request.room_id, room.id
            )));
        }

        let notes = request.notes.map(|n| n.trim().to_string()).unwrap_or_default();
        if notes.chars().count() > policy.max_notes_length {
            return Err(ReservationError::Validation(format!(
                "Notes exceed {} characters",
                policy.max_notes_length
            )));
        }

        let customer_name = request
            .customer_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let id = ReservationId::new();
        let owner = SessionMember {
            reservation_id: id,
            customer_id: request.customer_id,
            customer_name: customer_name.clone().unwrap_or_default(),
            joined_at: now,
            role: MemberRole::Owner,
        };

        let reservation = Self {
            id,
            room_id: room.id,
            customer_id: request.customer_id,
            customer_name,
            created_at: now,
            scheduled_start: request.scheduled_start,
            notes,
            actual_start_time: None,
            end_time: None,
            hourly_rate: room.hourly_rate(),
            total_cost: None,
            status: ReservationStatus::Reserved,
            access_code: request.shared.then(generate_access_code),
            members: vec![owner],
            cancellation_reason: None,
            cancelled_at: None,
        };

        events.record(RoomEvent::RoomReserved(RoomReserved {
            reservation_id: reservation.id,
            room_id: room.id,
            room_name: room.display_name().to_string(),
            customer_id: Some(reservation.customer_id),
            customer_name: reservation.customer_name.clone(),
            expires_at: reservation.expires_at(policy),
        }));

        Ok(reservation)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn hourly_rate(&self) -> Decimal {
        self.hourly_rate
    }

    pub fn total_cost(&self) -> Option<Decimal> {
        self.total_cost
    }

    pub fn actual_start_time(&self) -> Option<DateTime<Utc>> {
        self.actual_start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn access_code(&self) -> Option<&str> {
        self.access_code.as_deref()
    }

    pub fn members(&self) -> &[SessionMember] {
        &self.members
    }

    pub fn cancellation_reason(&self) -> Option<CancellationReason> {
        self.cancellation_reason
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// Latest moment the session may start before the sweeper cancels it
    pub fn expires_at(&self, policy: &ReservationPolicy) -> DateTime<Utc> {
        self.created_at + policy.expiration()
    }

    pub fn is_expired(&self, now: DateTime<Utc>, policy: &ReservationPolicy) -> bool {
        self.status == ReservationStatus::Reserved && self.created_at <= now - policy.expiration()
    }

    /// True when this booking holds the room within `buffer` of `scheduled_start`
    pub fn conflicts_with(&self, scheduled_start: DateTime<Utc>, buffer: Duration) -> bool {
        self.status.blocks_room()
            && self.scheduled_start >= scheduled_start - buffer
            && self.scheduled_start <= scheduled_start + buffer
    }

    pub fn involves_customer(&self, customer_id: CustomerId) -> bool {
        self.customer_id == customer_id || self.members.iter().any(|m| m.customer_id == customer_id)
    }

    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.scheduled_start.date_naive() == date
    }

    /// Elapsed session minutes, once the session has ended
    pub fn duration_minutes(&self) -> Option<i64> {
        match (self.actual_start_time, self.end_time) {
            (Some(start), Some(end)) => Some(billing::elapsed_minutes(start, end)),
            _ => None,
        }
    }

    // ========================================================================
    // Aggregate Commands (State Mutations)
    // ========================================================================

    /// Reserved → Active. Marks the room occupied.
    pub fn start_session(
        &mut self,
        room: &mut Room,
        now: DateTime<Utc>,
        events: &mut EventBuffer,
    ) -> Result<(), ReservationError> {
        self.ensure_status(ReservationStatus::Reserved, "start")?;
        self.ensure_room(room)?;
        room.mark_occupied()?;

        self.actual_start_time = Some(now);
        self.status = ReservationStatus::Active;

        events.record(RoomEvent::SessionStarted(SessionStarted {
            reservation_id: self.id,
            room_id: room.id,
            room_name: room.display_name().to_string(),
            customer_id: Some(self.customer_id),
            customer_name: self.customer_name.clone(),
        }));
        Ok(())
    }

    /// Active → Completed. Bills the session and frees the room.
    pub fn end_session(
        &mut self,
        room: &mut Room,
        now: DateTime<Utc>,
        events: &mut EventBuffer,
    ) -> Result<Decimal, ReservationError> {
        self.ensure_status(ReservationStatus::Active, "end")?;
        self.ensure_room(room)?;
        let start = self.actual_start_time.ok_or(ReservationError::InvalidState {
            operation: "end",
            status: self.status,
        })?;
        if self.total_cost.is_some() {
            return Err(ReservationError::InvalidState {
                operation: "bill",
                status: self.status,
            });
        }

        let cost = billing::session_cost(start, now, self.hourly_rate);
        self.end_time = Some(now);
        self.total_cost = Some(cost);
        self.status = ReservationStatus::Completed;
        room.mark_available();

        events.record(RoomEvent::SessionCompleted(SessionCompleted {
            reservation_id: self.id,
            customer_id: self.customer_id,
            room_id: room.id,
            room_name: room.display_name().to_string(),
            total_cost: cost,
            start_time: start,
            end_time: now,
            duration: billing::elapsed_minutes(start, now),
        }));
        events.record(RoomEvent::RoomBecameAvailable(RoomBecameAvailable {
            room_id: room.id,
            room_name: room.display_name().to_string(),
            branch_id: room.branch_id.clone(),
        }));
        Ok(cost)
    }

    /// Reserved → Cancelled on request. A started session has to be ended instead.
    pub fn cancel(
        &mut self,
        room: &Room,
        now: DateTime<Utc>,
        events: &mut EventBuffer,
    ) -> Result<(), ReservationError> {
        self.cancel_with(CancellationReason::Customer, "cancel", room, now, events)
    }

    /// Reserved → Cancelled for a no-show. Only the expiration sweeper calls this.
    pub fn cancel_due_to_expiration(
        &mut self,
        room: &Room,
        now: DateTime<Utc>,
        events: &mut EventBuffer,
    ) -> Result<(), ReservationError> {
        self.cancel_with(CancellationReason::Expired, "expire", room, now, events)
    }

    pub fn add_member(
        &mut self,
        customer_id: CustomerId,
        customer_name: impl Into<String>,
        role: MemberRole,
        now: DateTime<Utc>,
    ) -> Result<&SessionMember, ReservationError> {
        if !self.status.blocks_room() {
            return Err(ReservationError::InvalidState {
                operation: "add a member to",
                status: self.status,
            });
        }
        if self.members.iter().any(|m| m.customer_id == customer_id) {
            return Err(ReservationError::DuplicateMember {
                reservation_id: self.id,
                customer_id,
            });
        }

        self.members.push(SessionMember {
            reservation_id: self.id,
            customer_id,
            customer_name: customer_name.into(),
            joined_at: now,
            role,
        });
        Ok(&self.members[self.members.len() - 1])
    }

    fn cancel_with(
        &mut self,
        reason: CancellationReason,
        operation: &'static str,
        room: &Room,
        now: DateTime<Utc>,
        events: &mut EventBuffer,
    ) -> Result<(), ReservationError> {
        self.ensure_status(ReservationStatus::Reserved, operation)?;
        self.ensure_room(room)?;

        self.status = ReservationStatus::Cancelled;
        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(now);

        events.record(RoomEvent::ReservationCancelled {
            payload: ReservationCancelled {
                reservation_id: self.id,
                room_id: room.id,
                room_name: room.display_name().to_string(),
                customer_id: Some(self.customer_id),
                customer_name: self.customer_name.clone(),
            },
            reason,
        });
        Ok(())
    }

    fn ensure_status(
        &self,
        expected: ReservationStatus,
        operation: &'static str,
    ) -> Result<(), ReservationError> {
        if self.status != expected {
            return Err(ReservationError::InvalidState {
                operation,
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_room(&self, room: &Room) -> Result<(), ReservationError> {
        if room.id != self.room_id {
            return Err(ReservationError::Validation(format!(
                "Reservation {} belongs to room {}, not {}",
                self.id, self.room_id, room.id
            )));
        }
        Ok(())
    }
}

fn generate_access_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
