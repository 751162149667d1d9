// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Rooms integration events
//
// In-process fan-out over a tokio broadcast channel. Downstream consumers
// (notification relay, CLI event log) subscribe; nothing is persisted, so a
// subscriber that connects late or lags past the capacity misses events.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::{EventPublisher, RoomEvent};
use crate::domain::room::RoomId;

/// Event bus for publishing and subscribing to room events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RoomEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events are buffered before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Subscribe to every room event
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single room
    pub fn subscribe_room(&self, room_id: RoomId) -> RoomEventReceiver {
        RoomEventReceiver {
            receiver: self.sender.subscribe(),
            room_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: RoomEvent) {
        debug!(
            event_type = event.event_type(),
            room_id = %event.room_id(),
            "Publishing room event"
        );

        // send() only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all room events
pub struct EventReceiver {
    receiver: broadcast::Receiver<RoomEvent>,
}

impl EventReceiver {
    /// Wait for the next event
    pub async fn recv(&mut self) -> Result<RoomEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<RoomEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one room
pub struct RoomEventReceiver {
    receiver: broadcast::Receiver<RoomEvent>,
    room_id: RoomId,
}

impl RoomEventReceiver {
    /// Wait for the next event about this receiver's room, skipping the rest
    pub async fn recv(&mut self) -> Result<RoomEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.room_id() == self.room_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
