// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reservation Expiration Sweeper - Background task that cancels no-shows
//!
//! Every tick asks the reservation service to cancel Reserved bookings whose
//! grace period has passed. A failed tick is logged and the next one retries,
//! since anything left unprocessed is still Reserved and still past the
//! threshold.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::reservation_service::{ReservationService, ServiceResult};

/// Configuration for the expiration sweeper
#[derive(Debug, Clone)]
pub struct ExpirationSweeperConfig {
    /// How often to sweep (in seconds)
    pub interval_seconds: u64,

    /// Whether sweeping is enabled
    pub enabled: bool,
}

impl Default for ExpirationSweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            enabled: true,
        }
    }
}

pub struct ExpirationSweeper {
    service: Arc<dyn ReservationService>,
    config: ExpirationSweeperConfig,
    shutdown_token: CancellationToken,
}

impl ExpirationSweeper {
    pub fn new(service: Arc<dyn ReservationService>, config: ExpirationSweeperConfig) -> Self {
        Self {
            service,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the sweeper background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the sweep loop until the shutdown token fires
    async fn run(&self) {
        if !self.config.enabled {
            info!("Expiration sweeper is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            "Starting reservation expiration sweeper"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running expiration sweep");

                    match self.sweep_once().await {
                        Ok(0) => debug!("Expiration sweep found nothing to cancel"),
                        Ok(expired_count) => {
                            info!(expired_count, "Expiration sweep auto-cancelled reservations");
                        }
                        Err(e) => {
                            warn!("Expiration sweep failed: {}", e);
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping expiration sweeper");
                    break;
                }
            }
        }

        info!("Expiration sweeper stopped");
    }

    /// Execute a single sweep
    pub async fn sweep_once(&self) -> ServiceResult<usize> {
        self.service.expire_stale_reservations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::RepositoryError;
    use crate::domain::reservation::{
        CustomerId, Reservation, ReservationError, ReservationId, ReservationRequest,
    };
    use crate::domain::room::{LocalizedText, Room, RoomId};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts sweeps; fails every other call when `flaky`
    struct MockReservationService {
        sweeps: AtomicUsize,
        flaky: bool,
    }

    impl MockReservationService {
        fn new(flaky: bool) -> Self {
            Self {
                sweeps: AtomicUsize::new(0),
                flaky,
            }
        }
    }

    fn unused<T>() -> ServiceResult<T> {
        Err(ReservationError::Validation("not used by the sweeper".to_string()))
    }

    #[async_trait]
    impl ReservationService for MockReservationService {
        async fn register_room(
            &self,
            _: LocalizedText,
            _: LocalizedText,
            _: Decimal,
        ) -> ServiceResult<Room> {
            unused()
        }
        async fn change_room_rate(&self, _: RoomId, _: Decimal) -> ServiceResult<Room> {
            unused()
        }
        async fn set_room_maintenance(&self, _: RoomId, _: bool) -> ServiceResult<Room> {
            unused()
        }
        async fn list_rooms(&self) -> ServiceResult<Vec<Room>> {
            unused()
        }
        async fn create_reservation(&self, _: ReservationRequest) -> ServiceResult<Reservation> {
            unused()
        }
        async fn start_session(&self, _: ReservationId) -> ServiceResult<Reservation> {
            unused()
        }
        async fn end_session(&self, _: ReservationId) -> ServiceResult<Reservation> {
            unused()
        }
        async fn cancel_reservation(&self, _: ReservationId) -> ServiceResult<Reservation> {
            unused()
        }
        async fn add_member(
            &self,
            _: ReservationId,
            _: CustomerId,
            _: String,
        ) -> ServiceResult<Reservation> {
            unused()
        }
        async fn join_by_access_code(
            &self,
            _: &str,
            _: CustomerId,
            _: String,
        ) -> ServiceResult<Reservation> {
            unused()
        }
        async fn get_reservation(&self, _: ReservationId) -> ServiceResult<Reservation> {
            unused()
        }
        async fn get_active_for_customer(&self, _: CustomerId) -> ServiceResult<Vec<Reservation>> {
            unused()
        }
        async fn get_today_for_room(&self, _: RoomId) -> ServiceResult<Vec<Reservation>> {
            unused()
        }
        async fn get_active_sessions(&self) -> ServiceResult<Vec<Reservation>> {
            unused()
        }
        async fn get_by_access_code(&self, _: &str) -> ServiceResult<Reservation> {
            unused()
        }
        async fn check_availability(&self, _: RoomId, _: DateTime<Utc>) -> ServiceResult<bool> {
            unused()
        }

        async fn expire_stale_reservations(&self) -> ServiceResult<usize> {
            let n = self.sweeps.fetch_add(1, Ordering::SeqCst);
            if self.flaky && n % 2 == 0 {
                return Err(RepositoryError::Database("connection reset".to_string()).into());
            }
            Ok(3)
        }
    }

    #[test]
    fn test_sweeper_configuration() {
        let config = ExpirationSweeperConfig::default();
        assert_eq!(config.interval_seconds, 60);
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_sweep_once_reports_count() {
        let service = Arc::new(MockReservationService::new(false));
        let sweeper = ExpirationSweeper::new(service, ExpirationSweeperConfig::default());
        assert_eq!(sweeper.sweep_once().await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_failed_ticks_and_stops_on_cancel() {
        let service = Arc::new(MockReservationService::new(true));
        let config = ExpirationSweeperConfig {
            interval_seconds: 60,
            enabled: true,
        };
        let sweeper = Arc::new(ExpirationSweeper::new(service.clone(), config));
        let token = sweeper.shutdown_token();
        let handle = sweeper.start();

        // First tick fires immediately, then one per minute
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(service.sweeps.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(service.sweeps.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sweeper_disabled_returns_immediately() {
        let service = Arc::new(MockReservationService::new(false));
        let config = ExpirationSweeperConfig {
            interval_seconds: 60,
            enabled: false,
        };
        let sweeper = Arc::new(ExpirationSweeper::new(service.clone(), config));

        sweeper.start().await.unwrap();
        assert_eq!(service.sweeps.load(Ordering::SeqCst), 0);
    }
}
