//! Device documents addressed by name.
//!
//! ```sql
//! CREATE TABLE devices (
//!     name         TEXT PRIMARY KEY,
//!     device_index INTEGER NOT NULL,
//!     status       TEXT NOT NULL,     -- online | offline
//!     is_active    BOOLEAN NOT NULL,
//!     last_seen    TIMESTAMPTZ NOT NULL
//! );
//! ```

use crate::db::DbPool;
use crate::error::Result;
use crate::store::{DeviceStatusStore, DeviceStatusUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct DeviceDocument {
    pub name: String,
    pub device_index: i32,
    pub status: String,
    pub is_active: bool,
    pub last_seen: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PgDeviceRepository {
    pool: DbPool,
}

impl PgDeviceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<DeviceDocument>> {
        let devices = sqlx::query_as::<_, DeviceDocument>(
            r#"
            SELECT name, device_index, status, is_active, last_seen
            FROM devices
            ORDER BY device_index
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }
}

#[async_trait]
impl DeviceStatusStore for PgDeviceRepository {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn update_status(&self, update: &DeviceStatusUpdate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO devices (name, device_index, status, is_active, last_seen)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET
                device_index = EXCLUDED.device_index,
                status = EXCLUDED.status,
                is_active = EXCLUDED.is_active,
                last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(&update.name)
        .bind(update.index as i32)
        .bind(update.state.presence_str())
        .bind(update.state.is_on())
        .bind(update.last_seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
