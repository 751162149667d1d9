// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod expiration_sweeper;
pub mod repository_factory;
pub mod reservation_service;

pub use expiration_sweeper::{ExpirationSweeper, ExpirationSweeperConfig};
pub use repository_factory::{create_repositories, RoomsRepositories};
pub use reservation_service::{ReservationService, ServiceResult, StandardReservationService};
