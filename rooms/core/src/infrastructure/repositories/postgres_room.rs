// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Room
//!
//! `rooms` table access. The row helpers take a plain connection so the same
//! SQL serves both the pooled repository and an open transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;

use crate::domain::repository::{RepositoryError, RoomRepository};
use crate::domain::room::{BranchId, LocalizedText, Room, RoomId, RoomStatus};

pub(super) const ROOM_COLUMNS: &str =
    "id, branch_id, name, description, hourly_rate, status, created_at";

pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    async fn save(&self, room: &Room) -> Result<(), RepositoryError> {
        let name = serde_json::to_value(&room.name)?;
        let description = serde_json::to_value(&room.description)?;

        sqlx::query(
            r#"
            INSERT INTO rooms (id, branch_id, name, description, hourly_rate, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                branch_id = EXCLUDED.branch_id,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                hourly_rate = EXCLUDED.hourly_rate,
                status = EXCLUDED.status
            "#,
        )
        .bind(room.id.0)
        .bind(room.branch_id.as_str())
        .bind(name)
        .bind(description)
        .bind(room.hourly_rate())
        .bind(room.status().as_str())
        .bind(room.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save room: {}", e)))?;

        Ok(())
    }

    async fn update(&self, room: &Room) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        update_room_row(&mut conn, room).await
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(parse_room_row).transpose()
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY created_at ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(parse_room_row).collect()
    }
}

/// Lock the room row until the surrounding transaction ends
pub(super) async fn lock_room_row(
    conn: &mut PgConnection,
    id: RoomId,
) -> Result<Option<Room>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE"))
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(parse_room_row).transpose()
}

pub(super) async fn update_room_row(
    conn: &mut PgConnection,
    room: &Room,
) -> Result<(), RepositoryError> {
    let name = serde_json::to_value(&room.name)?;
    let description = serde_json::to_value(&room.description)?;

    let result = sqlx::query(
        r#"
        UPDATE rooms
        SET branch_id = $2, name = $3, description = $4, hourly_rate = $5, status = $6
        WHERE id = $1
        "#,
    )
    .bind(room.id.0)
    .bind(room.branch_id.as_str())
    .bind(name)
    .bind(description)
    .bind(room.hourly_rate())
    .bind(room.status().as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound(format!("Room {}", room.id)));
    }
    Ok(())
}

/// Parse a room from a database row
pub(super) fn parse_room_row(row: PgRow) -> Result<Room, RepositoryError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let branch_id: String = row.try_get("branch_id")?;
    let name_val: serde_json::Value = row.try_get("name")?;
    let description_val: serde_json::Value = row.try_get("description")?;
    let hourly_rate: Decimal = row.try_get("hourly_rate")?;
    let status_val: String = row.try_get("status")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    let name: LocalizedText = serde_json::from_value(name_val)
        .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize name: {}", e)))?;
    let description: LocalizedText = serde_json::from_value(description_val).map_err(|e| {
        RepositoryError::Serialization(format!("Failed to deserialize description: {}", e))
    })?;
    let status = RoomStatus::parse(&status_val).ok_or_else(|| {
        RepositoryError::Serialization(format!("Unknown room status '{}'", status_val))
    })?;

    Ok(Room::restore(
        RoomId(id),
        BranchId::new(branch_id),
        name,
        description,
        hourly_rate,
        status,
        created_at,
    ))
}
