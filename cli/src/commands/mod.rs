// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the lounge-rooms CLI

pub mod config;
pub mod daemon;
pub mod migrate;
pub mod reservation;
pub mod room;
pub mod sweep;

pub use self::config::ConfigCommand;
pub use self::migrate::MigrateCommand;
pub use self::reservation::ReservationCommand;
pub use self::room::RoomCommand;
