// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: rooms, reservations, billing, integration events and the
//! persistence contracts the application layer depends on.

pub mod billing;
pub mod clock;
pub mod events;
pub mod repository;
pub mod reservation;
pub mod room;
pub mod service_config;
