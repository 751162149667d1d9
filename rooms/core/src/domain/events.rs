// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration events produced by the Rooms service
//!
//! Aggregates append these to an [`EventBuffer`] while handling a command.
//! The application service drains the buffer only after the surrounding
//! transaction commits, then hands each event to an [`EventPublisher`].
//!
//! The payload records are consumed by the notification service; their JSON
//! field names (camelCase) and types are part of that contract.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::reservation::{CancellationReason, CustomerId, ReservationId};
use crate::domain::room::{BranchId, RoomId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReserved {
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
    pub room_name: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
    pub room_name: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompleted {
    pub reservation_id: ReservationId,
    pub customer_id: CustomerId,
    pub room_id: RoomId,
    pub room_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Whole minutes between start and end
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCancelled {
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
    pub room_name: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBecameAvailable {
    pub room_id: RoomId,
    pub room_name: String,
    pub branch_id: BranchId,
}

/// Envelope for everything the Rooms service publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    RoomReserved(RoomReserved),
    SessionStarted(SessionStarted),
    SessionCompleted(SessionCompleted),
    ReservationCancelled {
        #[serde(flatten)]
        payload: ReservationCancelled,
        /// Lets the notification copy tell a no-show apart from a customer cancellation
        reason: CancellationReason,
    },
    RoomBecameAvailable(RoomBecameAvailable),
}

impl RoomEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::RoomReserved(_) => "room_reserved",
            RoomEvent::SessionStarted(_) => "session_started",
            RoomEvent::SessionCompleted(_) => "session_completed",
            RoomEvent::ReservationCancelled { .. } => "reservation_cancelled",
            RoomEvent::RoomBecameAvailable(_) => "room_became_available",
        }
    }

    pub fn room_id(&self) -> RoomId {
        match self {
            RoomEvent::RoomReserved(e) => e.room_id,
            RoomEvent::SessionStarted(e) => e.room_id,
            RoomEvent::SessionCompleted(e) => e.room_id,
            RoomEvent::ReservationCancelled { payload, .. } => payload.room_id,
            RoomEvent::RoomBecameAvailable(e) => e.room_id,
        }
    }

    /// `None` for room-level events
    pub fn reservation_id(&self) -> Option<ReservationId> {
        match self {
            RoomEvent::RoomReserved(e) => Some(e.reservation_id),
            RoomEvent::SessionStarted(e) => Some(e.reservation_id),
            RoomEvent::SessionCompleted(e) => Some(e.reservation_id),
            RoomEvent::ReservationCancelled { payload, .. } => Some(payload.reservation_id),
            RoomEvent::RoomBecameAvailable(_) => None,
        }
    }
}

/// Events recorded while a command runs, waiting for the commit.
///
/// Passed explicitly into aggregate methods instead of living on the entity.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<RoomEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: RoomEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[RoomEvent] {
        &self.events
    }

    /// Take every buffered event in recording order
    pub fn drain(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Outbound side of the integration event channel
pub trait EventPublisher: Send + Sync {
    /// Fire-and-forget; delivery failures are the transport's concern
    fn publish(&self, event: RoomEvent);
}
