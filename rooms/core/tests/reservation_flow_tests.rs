// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use rooms_core::application::{
    ExpirationSweeper, ExpirationSweeperConfig, ReservationService, RoomsRepositories,
    StandardReservationService,
};
use rooms_core::domain::clock::ManualClock;
use rooms_core::domain::events::RoomEvent;
use rooms_core::domain::repository::{RepositoryError, ReservationRepository};
use rooms_core::domain::reservation::{
    CancellationReason, CustomerId, MemberRole, Reservation, ReservationError, ReservationId,
    ReservationPolicy, ReservationRequest, ReservationStatus,
};
use rooms_core::domain::room::{BranchId, LocalizedText, Room, RoomError, RoomId, RoomStatus};
use rooms_core::infrastructure::event_bus::{EventBus, EventBusError, EventReceiver};
use rooms_core::infrastructure::repositories::InMemoryRoomStore;

struct Harness {
    service: Arc<StandardReservationService>,
    clock: Arc<ManualClock>,
    events: EventReceiver,
}

fn opening_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap()
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(opening_time()));
    let bus = EventBus::new(64);
    let events = bus.subscribe();
    let repositories = RoomsRepositories::from_store(InMemoryRoomStore::new());

    let service = Arc::new(StandardReservationService::new(
        repositories.rooms,
        repositories.reservations,
        repositories.unit_of_work,
        Arc::new(bus),
        clock.clone(),
        ReservationPolicy::default(),
        BranchId::new("downtown"),
    ));

    Harness {
        service,
        clock,
        events,
    }
}

async fn blue_room(service: &StandardReservationService) -> Room {
    service
        .register_room(
            LocalizedText::new("Blue Room").with_translation("es", "Sala Azul"),
            LocalizedText::new("Console lounge"),
            dec!(50.00),
        )
        .await
        .unwrap()
}

fn drain(events: &mut EventReceiver) -> Vec<RoomEvent> {
    let mut received = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => received.push(event),
            Err(EventBusError::Empty) => return received,
            Err(e) => panic!("unexpected event bus error: {}", e),
        }
    }
}

fn event_types(events: &[RoomEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}

#[tokio::test]
async fn test_forty_five_minute_session_bills_one_hour() {
    let mut h = harness();
    let room = blue_room(&h.service).await;
    let customer = CustomerId::new();

    let reservation = h
        .service
        .create_reservation(
            ReservationRequest::new(room.id, customer, opening_time()).with_customer_name("Ana"),
        )
        .await
        .unwrap();
    assert_eq!(reservation.status(), ReservationStatus::Reserved);

    h.service.start_session(reservation.id).await.unwrap();
    let occupied = h.service.list_rooms().await.unwrap();
    assert_eq!(occupied[0].status(), RoomStatus::Occupied);

    h.clock.advance(Duration::minutes(45));
    let completed = h.service.end_session(reservation.id).await.unwrap();

    assert_eq!(completed.status(), ReservationStatus::Completed);
    assert_eq!(completed.total_cost(), Some(dec!(50.00)));
    assert_eq!(completed.duration_minutes(), Some(45));

    let rooms = h.service.list_rooms().await.unwrap();
    assert_eq!(rooms[0].status(), RoomStatus::Available);

    let events = drain(&mut h.events);
    assert_eq!(
        event_types(&events),
        vec![
            "room_reserved",
            "session_started",
            "session_completed",
            "room_became_available"
        ]
    );
    match &events[2] {
        RoomEvent::SessionCompleted(completed) => {
            assert_eq!(completed.total_cost, dec!(50.00));
            assert_eq!(completed.duration, 45);
            assert_eq!(completed.customer_id, customer);
        }
        other => panic!("expected SessionCompleted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_show_is_cancelled_once_by_sweeper() {
    let mut h = harness();
    let room = blue_room(&h.service).await;
    let reservation = h
        .service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), opening_time()))
        .await
        .unwrap();
    drain(&mut h.events);

    let sweeper = ExpirationSweeper::new(h.service.clone(), ExpirationSweeperConfig::default());

    h.clock.advance(Duration::minutes(14));
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);

    h.clock.advance(Duration::minutes(2));
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);

    let expired = h.service.get_reservation(reservation.id).await.unwrap();
    assert_eq!(expired.status(), ReservationStatus::Cancelled);
    assert_eq!(expired.cancellation_reason(), Some(CancellationReason::Expired));

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 1);
    match &events[0] {
        RoomEvent::ReservationCancelled { payload, reason } => {
            assert_eq!(payload.reservation_id, reservation.id);
            assert_eq!(*reason, CancellationReason::Expired);
        }
        other => panic!("expected ReservationCancelled, got {:?}", other),
    }
}

#[tokio::test]
async fn test_started_session_is_not_expired() {
    let h = harness();
    let room = blue_room(&h.service).await;
    let reservation = h
        .service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), opening_time()))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(10));
    h.service.start_session(reservation.id).await.unwrap();
    h.clock.advance(Duration::minutes(60));

    assert_eq!(h.service.expire_stale_reservations().await.unwrap(), 0);
    let active = h.service.get_active_sessions().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, reservation.id);
}

#[tokio::test]
async fn test_booking_inside_buffer_conflicts() {
    let mut h = harness();
    let room = blue_room(&h.service).await;
    let start = opening_time() + Duration::hours(2);

    h.service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), start))
        .await
        .unwrap();
    drain(&mut h.events);

    let err = h
        .service
        .create_reservation(ReservationRequest::new(
            room.id,
            CustomerId::new(),
            start + Duration::minutes(15),
        ))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(drain(&mut h.events).is_empty());

    assert!(!h
        .service
        .check_availability(room.id, start - Duration::minutes(10))
        .await
        .unwrap());
    assert!(h
        .service
        .check_availability(room.id, start + Duration::minutes(16))
        .await
        .unwrap());

    h.service
        .create_reservation(ReservationRequest::new(
            room.id,
            CustomerId::new(),
            start + Duration::minutes(16),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancelled_booking_frees_the_slot() {
    let h = harness();
    let room = blue_room(&h.service).await;
    let start = opening_time() + Duration::hours(1);

    let first = h
        .service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), start))
        .await
        .unwrap();
    h.service.cancel_reservation(first.id).await.unwrap();

    let second = assert_ok!(
        h.service
            .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), start))
            .await
    );
    assert_eq!(second.status(), ReservationStatus::Reserved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_same_slot_admit_exactly_one() {
    let h = harness();
    let room = blue_room(&h.service).await;
    let start = opening_time() + Duration::hours(3);

    let attempts = (0..8).map(|_| {
        let service = h.service.clone();
        let room_id = room.id;
        tokio::spawn(async move {
            service
                .create_reservation(ReservationRequest::new(room_id, CustomerId::new(), start))
                .await
        })
    });

    let mut created = 0;
    let mut conflicts = 0;
    for outcome in join_all(attempts).await {
        match outcome.unwrap() {
            Ok(_) => created += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_rate_change_does_not_touch_existing_bookings() {
    let h = harness();
    let room = blue_room(&h.service).await;

    let before = h
        .service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), opening_time()))
        .await
        .unwrap();
    h.service.change_room_rate(room.id, dec!(80.00)).await.unwrap();
    let after = h
        .service
        .create_reservation(ReservationRequest::new(
            room.id,
            CustomerId::new(),
            opening_time() + Duration::hours(2),
        ))
        .await
        .unwrap();

    assert_eq!(before.hourly_rate(), dec!(50.00));
    assert_eq!(after.hourly_rate(), dec!(80.00));

    h.service.start_session(before.id).await.unwrap();
    h.clock.advance(Duration::minutes(20));
    let completed = h.service.end_session(before.id).await.unwrap();
    assert_eq!(completed.total_cost(), Some(dec!(25.00)));
}

#[tokio::test]
async fn test_guest_joins_shared_session_by_access_code() {
    let h = harness();
    let room = blue_room(&h.service).await;
    let owner = CustomerId::new();
    let guest = CustomerId::new();

    let reservation = h
        .service
        .create_reservation(
            ReservationRequest::new(room.id, owner, opening_time())
                .with_customer_name("Ana")
                .shared(),
        )
        .await
        .unwrap();
    let code = reservation.access_code().unwrap().to_string();

    let unknown = h
        .service
        .join_by_access_code("ZZZZZZZZ", guest, "Luis".to_string())
        .await;
    assert!(matches!(unknown, Err(ReservationError::AccessCodeNotFound(_))));

    let joined = h
        .service
        .join_by_access_code(&code.to_lowercase(), guest, "Luis".to_string())
        .await
        .unwrap();
    assert_eq!(joined.members().len(), 2);
    assert_eq!(joined.members()[1].role, MemberRole::Guest);

    let again = h
        .service
        .join_by_access_code(&code, guest, "Luis".to_string())
        .await
        .unwrap_err();
    assert!(matches!(again, ReservationError::DuplicateMember { .. }));

    let for_guest = h.service.get_active_for_customer(guest).await.unwrap();
    assert_eq!(for_guest.len(), 1);
    assert_eq!(for_guest[0].id, reservation.id);
}

#[tokio::test]
async fn test_start_on_cancelled_reservation_is_rejected_without_events() {
    let mut h = harness();
    let room = blue_room(&h.service).await;
    let reservation = h
        .service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), opening_time()))
        .await
        .unwrap();
    h.service.cancel_reservation(reservation.id).await.unwrap();
    drain(&mut h.events);

    let err = assert_err!(h.service.start_session(reservation.id).await);
    assert!(err.is_invalid_state());
    assert!(drain(&mut h.events).is_empty());

    let rooms = h.service.list_rooms().await.unwrap();
    assert_eq!(rooms[0].status(), RoomStatus::Available);
}

#[tokio::test]
async fn test_room_under_maintenance_cannot_start_sessions() {
    let h = harness();
    let room = blue_room(&h.service).await;
    let reservation = h
        .service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), opening_time()))
        .await
        .unwrap();

    h.service.set_room_maintenance(room.id, true).await.unwrap();
    let err = h.service.start_session(reservation.id).await.unwrap_err();
    assert!(matches!(err, ReservationError::Room(_)));

    let unchanged = h.service.get_reservation(reservation.id).await.unwrap();
    assert_eq!(unchanged.status(), ReservationStatus::Reserved);

    h.service.set_room_maintenance(room.id, false).await.unwrap();
    h.service.start_session(reservation.id).await.unwrap();
}

#[tokio::test]
async fn test_today_lists_only_current_date() {
    let h = harness();
    let room = blue_room(&h.service).await;

    h.service
        .create_reservation(ReservationRequest::new(
            room.id,
            CustomerId::new(),
            opening_time() + Duration::hours(4),
        ))
        .await
        .unwrap();
    h.service
        .create_reservation(ReservationRequest::new(
            room.id,
            CustomerId::new(),
            opening_time() + Duration::days(1),
        ))
        .await
        .unwrap();

    let today = h.service.get_today_for_room(room.id).await.unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].scheduled_start, opening_time() + Duration::hours(4));
}

#[tokio::test]
async fn test_registered_room_takes_creation_time_from_clock() {
    let h = harness();
    h.clock.advance(Duration::minutes(7));
    let room = blue_room(&h.service).await;
    assert_eq!(room.created_at, opening_time() + Duration::minutes(7));

    let listed = h.service.list_rooms().await.unwrap();
    assert_eq!(listed[0].created_at, opening_time() + Duration::minutes(7));
}

#[tokio::test]
async fn test_second_session_cannot_start_while_room_is_occupied() {
    let mut h = harness();
    let room = blue_room(&h.service).await;
    let first = h
        .service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), opening_time()))
        .await
        .unwrap();
    let second = h
        .service
        .create_reservation(ReservationRequest::new(
            room.id,
            CustomerId::new(),
            opening_time() + Duration::minutes(30),
        ))
        .await
        .unwrap();

    h.service.start_session(first.id).await.unwrap();
    drain(&mut h.events);

    let err = h.service.start_session(second.id).await.unwrap_err();
    assert!(err.is_invalid_state());
    assert!(matches!(
        err,
        ReservationError::Room(RoomError::AlreadyOccupied(id)) if id == room.id
    ));
    assert!(drain(&mut h.events).is_empty());

    let waiting = h.service.get_reservation(second.id).await.unwrap();
    assert_eq!(waiting.status(), ReservationStatus::Reserved);
    let active = h.service.get_active_sessions().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, first.id);

    h.clock.advance(Duration::minutes(30));
    h.service.end_session(first.id).await.unwrap();
    let rooms = h.service.list_rooms().await.unwrap();
    assert_eq!(rooms[0].status(), RoomStatus::Available);

    let started = h.service.start_session(second.id).await.unwrap();
    assert_eq!(started.status(), ReservationStatus::Active);
}

/// Serves `get_expired` from a list captured earlier, as a sweeper would see it
/// when its candidate query raced with a session start
struct FrozenExpiredReservations {
    store: Arc<InMemoryRoomStore>,
    frozen: Mutex<Option<Vec<Reservation>>>,
}

impl FrozenExpiredReservations {
    fn freeze(&self, candidates: Vec<Reservation>) {
        *self.frozen.lock() = Some(candidates);
    }
}

#[async_trait]
impl ReservationRepository for FrozenExpiredReservations {
    async fn add(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        ReservationRepository::add(self.store.as_ref(), reservation).await
    }

    async fn update(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        ReservationRepository::update(self.store.as_ref(), reservation).await
    }

    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        ReservationRepository::get_by_id(self.store.as_ref(), id).await
    }

    async fn get_active_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        self.store.get_active_for_customer(customer_id).await
    }

    async fn get_today_for_room(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        self.store.get_today_for_room(room_id, date).await
    }

    async fn get_active_sessions(&self) -> Result<Vec<Reservation>, RepositoryError> {
        self.store.get_active_sessions().await
    }

    async fn has_conflicting_reservation(
        &self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<bool, RepositoryError> {
        self.store
            .has_conflicting_reservation(room_id, scheduled_start, buffer)
            .await
    }

    async fn get_by_access_code(&self, code: &str) -> Result<Option<Reservation>, RepositoryError> {
        self.store.get_by_access_code(code).await
    }

    async fn get_expired(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        if let Some(candidates) = self.frozen.lock().clone() {
            return Ok(candidates);
        }
        self.store.get_expired(threshold).await
    }
}

#[tokio::test]
async fn test_sweep_skips_candidate_started_after_it_was_listed() {
    let store = Arc::new(InMemoryRoomStore::new());
    let reservations = Arc::new(FrozenExpiredReservations {
        store: store.clone(),
        frozen: Mutex::new(None),
    });
    let clock = Arc::new(ManualClock::new(opening_time()));
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let service = StandardReservationService::new(
        store.clone(),
        reservations.clone(),
        store.clone(),
        Arc::new(bus),
        clock.clone(),
        ReservationPolicy::default(),
        BranchId::new("downtown"),
    );

    let room = blue_room(&service).await;
    let reservation = service
        .create_reservation(ReservationRequest::new(room.id, CustomerId::new(), opening_time()))
        .await
        .unwrap();

    clock.advance(Duration::minutes(16));
    let threshold = opening_time() + Duration::minutes(1);
    let stale = store.get_expired(threshold).await.unwrap();
    assert_eq!(stale.len(), 1);
    reservations.freeze(stale);

    service.start_session(reservation.id).await.unwrap();
    drain(&mut events);

    assert_eq!(service.expire_stale_reservations().await.unwrap(), 0);

    let current = service.get_reservation(reservation.id).await.unwrap();
    assert_eq!(current.status(), ReservationStatus::Active);
    let rooms = service.list_rooms().await.unwrap();
    assert_eq!(rooms[0].status(), RoomStatus::Occupied);
    assert!(drain(&mut events).is_empty());
}
