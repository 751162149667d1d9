// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Reservation
//!
//! `reservations` and `reservation_members` table access. Members are loaded
//! with their reservation and written with insert-if-absent, since a member
//! is never removed once joined.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::repository::{RepositoryError, ReservationRepository};
use crate::domain::reservation::{
    CancellationReason, CustomerId, MemberRole, Reservation, ReservationId, ReservationStatus,
    SessionMember,
};
use crate::domain::room::RoomId;

const RESERVATION_COLUMNS: &str = "id, room_id, customer_id, customer_name, created_at, \
     scheduled_start, actual_start_time, end_time, hourly_rate, total_cost, status, notes, \
     access_code, cancellation_reason, cancelled_at";

pub struct PostgresReservationRepository {
    pool: PgPool,
}

impl PostgresReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(
        &self,
        clause: &str,
        bind: impl FnOnce(
            sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        ) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE {clause}");
        let mut conn = self.pool.acquire().await?;
        let rows = bind(sqlx::query(&sql)).fetch_all(&mut *conn).await?;
        load_with_members(&mut conn, rows).await
    }
}

#[async_trait]
impl ReservationRepository for PostgresReservationRepository {
    async fn add(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_reservation_row(&mut tx, reservation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        update_reservation_row(&mut tx, reservation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        let found = self.fetch_where("id = $1", |q| q.bind(id.0)).await?;
        Ok(found.into_iter().next())
    }

    async fn get_active_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        self.fetch_where(
            "status IN ('reserved', 'active') AND (customer_id = $1 OR id IN \
             (SELECT reservation_id FROM reservation_members WHERE customer_id = $1)) \
             ORDER BY scheduled_start ASC",
            |q| q.bind(customer_id.0),
        )
        .await
    }

    async fn get_today_for_room(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);
        self.fetch_where(
            "room_id = $1 AND scheduled_start >= $2 AND scheduled_start < $3 \
             ORDER BY scheduled_start ASC",
            |q| q.bind(room_id.0).bind(day_start).bind(day_end),
        )
        .await
    }

    async fn get_active_sessions(&self) -> Result<Vec<Reservation>, RepositoryError> {
        self.fetch_where("status = 'active' ORDER BY actual_start_time ASC", |q| q)
            .await
    }

    async fn has_conflicting_reservation(
        &self,
        room_id: RoomId,
        scheduled_start: DateTime<Utc>,
        buffer: Duration,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        conflict_exists(&mut conn, room_id, scheduled_start, buffer).await
    }

    async fn get_by_access_code(&self, code: &str) -> Result<Option<Reservation>, RepositoryError> {
        let code = code.to_uppercase();
        let found = self
            .fetch_where(
                "access_code = $1 AND status IN ('reserved', 'active')",
                |q| q.bind(code),
            )
            .await?;
        Ok(found.into_iter().next())
    }

    async fn get_expired(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        self.fetch_where(
            "status = 'reserved' AND created_at <= $1 ORDER BY created_at ASC",
            |q| q.bind(threshold),
        )
        .await
    }
}

pub(super) async fn conflict_exists(
    conn: &mut PgConnection,
    room_id: RoomId,
    scheduled_start: DateTime<Utc>,
    buffer: Duration,
) -> Result<bool, RepositoryError> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM reservations
            WHERE room_id = $1
              AND status IN ('reserved', 'active')
              AND scheduled_start BETWEEN $2 AND $3
        ) AS conflict
        "#,
    )
    .bind(room_id.0)
    .bind(scheduled_start - buffer)
    .bind(scheduled_start + buffer)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.try_get("conflict")?)
}

/// Lock the reservation row until the surrounding transaction ends
pub(super) async fn lock_reservation_row(
    conn: &mut PgConnection,
    id: ReservationId,
) -> Result<Option<Reservation>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?;

    Ok(load_with_members(conn, rows).await?.into_iter().next())
}

pub(super) async fn insert_reservation_row(
    conn: &mut PgConnection,
    reservation: &Reservation,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO reservations (
            id, room_id, customer_id, customer_name, created_at,
            scheduled_start, actual_start_time, end_time, hourly_rate, total_cost,
            status, notes, access_code, cancellation_reason, cancelled_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(reservation.id.0)
    .bind(reservation.room_id.0)
    .bind(reservation.customer_id.0)
    .bind(reservation.customer_name.as_deref())
    .bind(reservation.created_at)
    .bind(reservation.scheduled_start)
    .bind(reservation.actual_start_time())
    .bind(reservation.end_time())
    .bind(reservation.hourly_rate())
    .bind(reservation.total_cost())
    .bind(reservation.status().as_str())
    .bind(&reservation.notes)
    .bind(reservation.access_code())
    .bind(reservation.cancellation_reason().map(|r| r.as_str()))
    .bind(reservation.cancelled_at())
    .execute(&mut *conn)
    .await?;

    insert_members(conn, reservation.members()).await
}

pub(super) async fn update_reservation_row(
    conn: &mut PgConnection,
    reservation: &Reservation,
) -> Result<(), RepositoryError> {
    // total_cost is only written while still NULL so a billed amount never changes
    let result = sqlx::query(
        r#"
        UPDATE reservations SET
            customer_name = $2,
            actual_start_time = $3,
            end_time = $4,
            total_cost = COALESCE(total_cost, $5),
            status = $6,
            notes = $7,
            cancellation_reason = $8,
            cancelled_at = $9
        WHERE id = $1
        "#,
    )
    .bind(reservation.id.0)
    .bind(reservation.customer_name.as_deref())
    .bind(reservation.actual_start_time())
    .bind(reservation.end_time())
    .bind(reservation.total_cost())
    .bind(reservation.status().as_str())
    .bind(&reservation.notes)
    .bind(reservation.cancellation_reason().map(|r| r.as_str()))
    .bind(reservation.cancelled_at())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound(format!("Reservation {}", reservation.id)));
    }

    insert_members(conn, reservation.members()).await
}

async fn insert_members(
    conn: &mut PgConnection,
    members: &[SessionMember],
) -> Result<(), RepositoryError> {
    for member in members {
        sqlx::query(
            r#"
            INSERT INTO reservation_members (reservation_id, customer_id, customer_name, joined_at, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (reservation_id, customer_id) DO NOTHING
            "#,
        )
        .bind(member.reservation_id.0)
        .bind(member.customer_id.0)
        .bind(&member.customer_name)
        .bind(member.joined_at)
        .bind(member.role.as_str())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_with_members(
    conn: &mut PgConnection,
    rows: Vec<PgRow>,
) -> Result<Vec<Reservation>, RepositoryError> {
    let mut reservations = rows
        .into_iter()
        .map(parse_reservation_row)
        .collect::<Result<Vec<_>, _>>()?;
    if reservations.is_empty() {
        return Ok(reservations);
    }

    let ids: Vec<Uuid> = reservations.iter().map(|r| r.id.0).collect();
    let member_rows = sqlx::query(
        r#"
        SELECT reservation_id, customer_id, customer_name, joined_at, role
        FROM reservation_members
        WHERE reservation_id = ANY($1)
        ORDER BY joined_at ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_reservation: HashMap<ReservationId, Vec<SessionMember>> = HashMap::new();
    for row in member_rows {
        let member = parse_member_row(row)?;
        by_reservation.entry(member.reservation_id).or_default().push(member);
    }
    for reservation in &mut reservations {
        reservation.members = by_reservation.remove(&reservation.id).unwrap_or_default();
    }
    Ok(reservations)
}

fn parse_reservation_row(row: PgRow) -> Result<Reservation, RepositoryError> {
    let status_val: String = row.try_get("status")?;
    let status = ReservationStatus::parse(&status_val).ok_or_else(|| {
        RepositoryError::Serialization(format!("Unknown reservation status '{}'", status_val))
    })?;
    let reason_val: Option<String> = row.try_get("cancellation_reason")?;
    let cancellation_reason = reason_val
        .map(|r| {
            CancellationReason::parse(&r).ok_or_else(|| {
                RepositoryError::Serialization(format!("Unknown cancellation reason '{}'", r))
            })
        })
        .transpose()?;
    let hourly_rate: Decimal = row.try_get("hourly_rate")?;
    let total_cost: Option<Decimal> = row.try_get("total_cost")?;

    Ok(Reservation {
        id: ReservationId(row.try_get("id")?),
        room_id: RoomId(row.try_get("room_id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        customer_name: row.try_get("customer_name")?,
        created_at: row.try_get("created_at")?,
        scheduled_start: row.try_get("scheduled_start")?,
        notes: row.try_get("notes")?,
        actual_start_time: row.try_get("actual_start_time")?,
        end_time: row.try_get("end_time")?,
        hourly_rate,
        total_cost,
        status,
        access_code: row.try_get("access_code")?,
        members: Vec::new(),
        cancellation_reason,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn parse_member_row(row: PgRow) -> Result<SessionMember, RepositoryError> {
    let role_val: String = row.try_get("role")?;
    let role = MemberRole::parse(&role_val).ok_or_else(|| {
        RepositoryError::Serialization(format!("Unknown member role '{}'", role_val))
    })?;

    Ok(SessionMember {
        reservation_id: ReservationId(row.try_get("reservation_id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        customer_name: row.try_get("customer_name")?,
        joined_at: row.try_get("joined_at")?,
        role,
    })
}
