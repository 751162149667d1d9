// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Value Objects
// ============================================================================

/// Unique identifier for a bookable room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub Uuid);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Branch tag carried by rooms and echoed in availability notifications.
///
/// No routing is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub String);

impl BranchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchId {
    fn default() -> Self {
        Self("main".to_string())
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text with per-locale translations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    pub const DEFAULT_LOCALE: &'static str = "en";

    /// Text with a single value under the default locale
    pub fn new(text: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(Self::DEFAULT_LOCALE.to_string(), text.into());
        Self(values)
    }

    pub fn with_translation(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(locale.into(), text.into());
        self
    }

    /// Requested locale, then the default locale, then whatever exists.
    pub fn resolve(&self, locale: &str) -> &str {
        self.0
            .get(locale)
            .or_else(|| self.0.get(Self::DEFAULT_LOCALE))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Default-locale rendering used in notifications
    pub fn default_text(&self) -> &str {
        self.resolve(Self::DEFAULT_LOCALE)
    }

    /// True when the default locale has no usable text
    pub fn is_blank(&self) -> bool {
        self.0
            .get(Self::DEFAULT_LOCALE)
            .map_or(true, |v| v.trim().is_empty())
    }

    pub fn translations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<&str> for LocalizedText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Physical occupancy flag of a room.
///
/// Only reflects whether a session is running right now; future availability
/// is decided by reservation rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "occupied" => Some(Self::Occupied),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Invalid room name: {0}")]
    InvalidName(String),

    #[error("Invalid hourly rate {0}: must be greater than zero")]
    InvalidRate(Decimal),

    #[error("Room {0} is occupied and cannot enter maintenance")]
    Occupied(RoomId),

    #[error("Room {0} is under maintenance and cannot be occupied")]
    UnderMaintenance(RoomId),

    #[error("Room {0} already has a session in progress")]
    AlreadyOccupied(RoomId),
}

// ============================================================================
// Entity: Room
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub branch_id: BranchId,
    pub name: LocalizedText,
    pub description: LocalizedText,
    hourly_rate: Decimal,
    status: RoomStatus,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(
        name: LocalizedText,
        description: LocalizedText,
        hourly_rate: Decimal,
        branch_id: BranchId,
        now: DateTime<Utc>,
    ) -> Result<Self, RoomError> {
        if name.is_blank() {
            return Err(RoomError::InvalidName("Room name cannot be empty".to_string()));
        }
        validate_rate(hourly_rate)?;

        Ok(Self {
            id: RoomId::new(),
            branch_id,
            name,
            description,
            hourly_rate,
            status: RoomStatus::Available,
            created_at: now,
        })
    }

    /// Rebuild a room from persisted state without re-running creation checks
    pub fn restore(
        id: RoomId,
        branch_id: BranchId,
        name: LocalizedText,
        description: LocalizedText,
        hourly_rate: Decimal,
        status: RoomStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            branch_id,
            name,
            description,
            hourly_rate,
            status,
            created_at,
        }
    }

    pub fn hourly_rate(&self) -> Decimal {
        self.hourly_rate
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn display_name(&self) -> &str {
        self.name.default_text()
    }

    /// Affects only reservations created afterwards; existing ones keep their snapshot.
    pub fn change_hourly_rate(&mut self, rate: Decimal) -> Result<(), RoomError> {
        validate_rate(rate)?;
        self.hourly_rate = rate;
        Ok(())
    }

    /// One session at a time; a second start must wait for the first to end
    pub fn mark_occupied(&mut self) -> Result<(), RoomError> {
        match self.status {
            RoomStatus::Maintenance => return Err(RoomError::UnderMaintenance(self.id)),
            RoomStatus::Occupied => return Err(RoomError::AlreadyOccupied(self.id)),
            RoomStatus::Available => {}
        }
        self.status = RoomStatus::Occupied;
        Ok(())
    }

    pub fn mark_available(&mut self) {
        self.status = RoomStatus::Available;
    }

    pub fn start_maintenance(&mut self) -> Result<(), RoomError> {
        if self.status == RoomStatus::Occupied {
            return Err(RoomError::Occupied(self.id));
        }
        self.status = RoomStatus::Maintenance;
        Ok(())
    }

    pub fn finish_maintenance(&mut self) {
        if self.status == RoomStatus::Maintenance {
            self.status = RoomStatus::Available;
        }
    }
}

fn validate_rate(rate: Decimal) -> Result<(), RoomError> {
    if rate <= Decimal::ZERO {
        return Err(RoomError::InvalidRate(rate));
    }
    Ok(())
}
