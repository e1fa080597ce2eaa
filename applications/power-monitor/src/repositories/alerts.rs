//! Append-only alert collection.
//!
//! ```sql
//! CREATE TABLE alerts (
//!     id         TEXT PRIMARY KEY,
//!     title      TEXT NOT NULL,
//!     message    TEXT NOT NULL,
//!     severity   TEXT NOT NULL,    -- low | medium | high
//!     created_at TIMESTAMPTZ NOT NULL,
//!     is_read    BOOLEAN NOT NULL DEFAULT FALSE
//! );
//! ```

use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::store::{Alert, AlertSink, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
struct AlertRow {
    id: String,
    title: String,
    message: String,
    severity: String,
    created_at: DateTime<Utc>,
    is_read: bool,
}

impl TryFrom<AlertRow> for Alert {
    type Error = AppError;

    fn try_from(row: AlertRow) -> Result<Self> {
        let severity = Severity::parse(&row.severity).ok_or_else(|| {
            AppError::Store(format!(
                "alert {} has unknown severity '{}'",
                row.id, row.severity
            ))
        })?;
        Ok(Alert {
            id: row.id,
            title: row.title,
            message: row.message,
            severity,
            timestamp: row.created_at,
            is_read: row.is_read,
        })
    }
}

#[derive(Clone)]
pub struct PgAlertRepository {
    pool: DbPool,
}

impl PgAlertRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertSink for PgAlertRepository {
    async fn push(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, title, message, severity, created_at, is_read)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.severity.as_str())
        .bind(alert.timestamp)
        .bind(alert.is_read)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, limit: i64) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, title, message, severity, created_at, is_read
            FROM alerts
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn acknowledge(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE alerts SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("alert {}", id)));
        }
        Ok(())
    }
}
