//! Candidate pool persistence.
//!
//! One row per (symbol, interval) key, surviving across scan cycles in
//! SQLite. The decision engine is the only writer; operations are
//! per-key read-modify-write (single-instance deployment — see
//! DESIGN.md for the multi-instance open question).

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{CandidateRecord, CandidateStatus, Direction, ScanErrorKind};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS candidates (
    key             TEXT PRIMARY KEY,
    symbol          TEXT NOT NULL,
    interval        TEXT NOT NULL,
    first_detected  TEXT NOT NULL,
    last_checked    TEXT NOT NULL,
    last_change_pct REAL NOT NULL,
    status          TEXT NOT NULL,
    retry_count     INTEGER NOT NULL,
    last_error      TEXT NOT NULL,
    direction       TEXT NOT NULL
)
"#;

/// SQLite-backed candidate pool.
pub struct CandidatePool {
    pool: SqlitePool,
}

impl CandidatePool {
    /// Open (or create) the pool database at the given path.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .with_context(|| format!("Invalid candidate pool path: {path}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open candidate pool at {path}"))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create candidates table")?;

        info!(path, "Candidate pool opened");
        Ok(Self { pool })
    }

    /// An in-memory pool for tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory SQLite options")?;

        // A single connection so every query sees the same :memory: db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory candidate pool")?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create candidates table")?;

        Ok(Self { pool })
    }

    /// Fetch the record for a key, if any.
    pub async fn get(&self, key: &str) -> Result<Option<CandidateRecord>> {
        let row = sqlx::query("SELECT * FROM candidates WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Candidate pool get failed")?;

        row.map(Self::row_to_record).transpose()
    }

    /// Insert or replace the record for its key.
    pub async fn upsert(&self, record: &CandidateRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO candidates
                (key, symbol, interval, first_detected, last_checked,
                 last_change_pct, status, retry_count, last_error, direction)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                first_detected = excluded.first_detected,
                last_checked = excluded.last_checked,
                last_change_pct = excluded.last_change_pct,
                status = excluded.status,
                retry_count = excluded.retry_count,
                last_error = excluded.last_error,
                direction = excluded.direction
            "#,
        )
        .bind(record.key())
        .bind(&record.symbol)
        .bind(&record.interval)
        .bind(record.first_detected.to_rfc3339())
        .bind(record.last_checked.to_rfc3339())
        .bind(record.last_change_pct)
        .bind(record.status.as_str())
        .bind(record.retry_count as i64)
        .bind(record.last_error.as_str())
        .bind(record.direction.as_str())
        .execute(&self.pool)
        .await
        .context("Candidate pool upsert failed")?;

        debug!(key = %record.key(), status = %record.status, "Candidate upserted");
        Ok(())
    }

    /// Transition a key to `confirmed_sent`.
    pub async fn mark_sent(&self, key: &str) -> Result<()> {
        self.set_status(key, CandidateStatus::ConfirmedSent).await
    }

    /// Transition a key to `dropped`.
    pub async fn mark_dropped(&self, key: &str) -> Result<()> {
        self.set_status(key, CandidateStatus::Dropped).await
    }

    async fn set_status(&self, key: &str, status: CandidateStatus) -> Result<()> {
        sqlx::query("UPDATE candidates SET status = ?, last_checked = ? WHERE key = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to mark candidate {key} as {status}"))?;

        debug!(key, status = %status, "Candidate status updated");
        Ok(())
    }

    /// Delete terminal records whose last check is older than the
    /// retention window. Returns the number of rows purged.
    pub async fn purge_older_than(&self, days: i64) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();

        let result = sqlx::query(
            "DELETE FROM candidates WHERE status != 'candidate' AND last_checked < ?",
        )
        .bind(&cutoff)
        .execute(&self.pool)
        .await
        .context("Candidate pool purge failed")?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, days, "Purged stale candidate records");
        }
        Ok(purged)
    }

    /// Number of live (unconfirmed) candidates. Used in startup logs.
    pub async fn live_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM candidates WHERE status = 'candidate'")
            .fetch_one(&self.pool)
            .await
            .context("Candidate pool count failed")?;

        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<CandidateRecord> {
        let parse_time = |field: &str| -> Result<DateTime<Utc>> {
            let raw: String = row.try_get(field)?;
            Ok(DateTime::parse_from_rfc3339(&raw)
                .with_context(|| format!("Bad timestamp in candidate row field {field}"))?
                .with_timezone(&Utc))
        };

        let status: String = row.try_get("status")?;
        let last_error: String = row.try_get("last_error")?;
        let direction: String = row.try_get("direction")?;
        let retry_count: i64 = row.try_get("retry_count")?;

        Ok(CandidateRecord {
            symbol: row.try_get("symbol")?,
            interval: row.try_get("interval")?,
            first_detected: parse_time("first_detected")?,
            last_checked: parse_time("last_checked")?,
            last_change_pct: row.try_get("last_change_pct")?,
            status: status.parse::<CandidateStatus>()?,
            retry_count: retry_count as u32,
            last_error: last_error.parse::<ScanErrorKind>()?,
            direction: direction.parse::<Direction>()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
