//! Telemetry rows written upstream by the sink pipeline.
//!
//! ```sql
//! CREATE TABLE telemetry (
//!     subject TEXT NOT NULL,
//!     ts_key  TEXT NOT NULL,   -- YYYY-MM-DD_HH:MM:SS_mmm
//!     vrms    DOUBLE PRECISION,
//!     irms    DOUBLE PRECISION,
//!     power   DOUBLE PRECISION,
//!     kwh     DOUBLE PRECISION,
//!     PRIMARY KEY (subject, ts_key)
//! );
//! ```

use crate::db::DbPool;
use crate::error::Result;
use crate::reading::Reading;
use crate::store::TelemetryStore;
use async_trait::async_trait;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
struct TelemetryRow {
    ts_key: String,
    vrms: Option<f64>,
    irms: Option<f64>,
    power: Option<f64>,
    kwh: Option<f64>,
}

impl From<TelemetryRow> for Reading {
    fn from(row: TelemetryRow) -> Self {
        Reading {
            voltage_rms: row.vrms.unwrap_or_default(),
            current_rms: row.irms.unwrap_or_default(),
            power: row.power.unwrap_or_default(),
            cumulative_energy: row.kwh.unwrap_or_default(),
            timestamp: Some(row.ts_key),
        }
    }
}

#[derive(Clone)]
pub struct PgTelemetryRepository {
    pool: DbPool,
}

impl PgTelemetryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelemetryStore for PgTelemetryRepository {
    async fn fetch_recent(&self, subject: &str, limit: usize) -> Result<Vec<Reading>> {
        let rows = sqlx::query_as::<_, TelemetryRow>(
            r#"
            SELECT ts_key, vrms, irms, power, kwh
            FROM telemetry
            WHERE subject = $1
            ORDER BY ts_key DESC
            LIMIT $2
            "#,
        )
        .bind(subject)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        // newest-first from the query; windows are oldest-first
        Ok(rows.into_iter().rev().map(Reading::from).collect())
    }
}
