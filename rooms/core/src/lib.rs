// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rooms service core
//!
//! Room reservations, session billing and no-show expiration for the lounge
//! platform.
//!
//! # Architecture
//!
//! - **domain:** entities, aggregate state machine, billing, events, persistence contracts
//! - **application:** reservation service and the expiration sweeper
//! - **infrastructure:** event bus, in-memory and PostgreSQL repositories

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
