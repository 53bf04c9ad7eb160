//! Persistent engine settings.
//!
//! SQLite-backed storage for the scalar admission settings and the two
//! named CIDR lists. The engine itself never reads this at decision time;
//! callers load settings at startup and push list changes through
//! [`Limiter`](crate::Limiter) after persisting them here.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Settings persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database operation failed.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Which named CIDR list a stored row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePurpose {
    /// The block list.
    Block,
    /// The allow list.
    Allow,
}

impl RangePurpose {
    fn as_str(self) -> &'static str {
        match self {
            RangePurpose::Block => "block",
            RangePurpose::Allow => "allow",
        }
    }
}

/// Store handle with connection pool.
#[derive(Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open (and if necessary create) the store, running schema setup.
    ///
    /// `":memory:"` opens a private in-memory database; anything else is a
    /// file path.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let pool = if path == ":memory:" {
            // Uniquely named shared-cache memory database per call;
            // a bare `:memory:` handle would vanish with each pooled
            // connection and collide across parallel tests.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:ipgate-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        } else {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.init_schema().await?;
        info!(path = %path, "settings store opened");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admission_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                enabled INTEGER NOT NULL DEFAULT 0,
                expected_ip_count INTEGER NOT NULL DEFAULT 100,
                excessive_ip_count INTEGER NOT NULL DEFAULT 1000,
                block_top INTEGER NOT NULL DEFAULT 10,
                periodicity TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO admission_settings (id) VALUES (1)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admission_ranges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                purpose TEXT NOT NULL,
                cidr TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_admission_ranges_purpose \
             ON admission_ranges (purpose)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========== Scalar settings ==========

    /// Persist the enabled flag.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE admission_settings SET enabled = ? WHERE id = 1")
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether admission control is enabled.
    pub async fn get_enabled(&self) -> Result<bool, StoreError> {
        let enabled: bool =
            sqlx::query_scalar("SELECT enabled FROM admission_settings WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(enabled)
    }

    /// Persist the expected unique-IP level.
    pub async fn set_expected_ip_count(&self, value: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE admission_settings SET expected_ip_count = ? WHERE id = 1")
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The expected unique-IP level.
    pub async fn get_expected_ip_count(&self) -> Result<i64, StoreError> {
        let value: i64 =
            sqlx::query_scalar("SELECT expected_ip_count FROM admission_settings WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(value)
    }

    /// Persist the excessive unique-IP threshold.
    pub async fn set_excessive_ip_count(&self, value: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE admission_settings SET excessive_ip_count = ? WHERE id = 1")
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The excessive unique-IP threshold.
    pub async fn get_excessive_ip_count(&self) -> Result<i64, StoreError> {
        let value: i64 =
            sqlx::query_scalar("SELECT excessive_ip_count FROM admission_settings WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(value)
    }

    /// Persist how many top ranges aggregation views surface.
    pub async fn set_block_top(&self, value: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE admission_settings SET block_top = ? WHERE id = 1")
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// How many top ranges aggregation views surface.
    pub async fn get_block_top(&self) -> Result<i64, StoreError> {
        let value: i64 =
            sqlx::query_scalar("SELECT block_top FROM admission_settings WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(value)
    }

    /// Persist the re-evaluation cadence string.
    pub async fn set_periodicity(&self, value: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE admission_settings SET periodicity = ? WHERE id = 1")
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The re-evaluation cadence string.
    pub async fn get_periodicity(&self) -> Result<String, StoreError> {
        let value: String =
            sqlx::query_scalar("SELECT periodicity FROM admission_settings WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(value)
    }

    // ========== Named CIDR lists ==========

    /// Replace one named list wholesale.
    ///
    /// Delete-all-then-insert inside a single transaction: a partial list
    /// is never observably persisted, and a failure leaves the previous
    /// rows in place.
    pub async fn set_ranges(
        &self,
        purpose: RangePurpose,
        cidrs: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM admission_ranges WHERE purpose = ?")
            .bind(purpose.as_str())
            .execute(&mut *tx)
            .await?;

        for cidr in cidrs {
            sqlx::query("INSERT INTO admission_ranges (purpose, cidr) VALUES (?, ?)")
                .bind(purpose.as_str())
                .bind(cidr)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Fetch one named list in insertion order.
    pub async fn get_ranges(&self, purpose: RangePurpose) -> Result<Vec<String>, StoreError> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT cidr FROM admission_ranges WHERE purpose = ? ORDER BY id",
        )
        .bind(purpose.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
