use crate::error::StoreError;
use crate::models::CompositeReport;
use crate::policy::{SubscriptionRecord, SubscriptionStatus};
use crate::store::{AnalysisStore, MonthlyUsage, UsageDelta, month_key};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS analyses (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        target_url TEXT NOT NULL,
        created_at_ms INTEGER NOT NULL,
        report TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_analyses_user_created
        ON analyses (user_id, created_at_ms DESC)",
    "CREATE TABLE IF NOT EXISTS usage_counters (
        user_id TEXT NOT NULL,
        month TEXT NOT NULL,
        analyses INTEGER NOT NULL DEFAULT 0,
        tokens INTEGER NOT NULL DEFAULT 0,
        cost_usd REAL NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, month)
    )",
    "CREATE TABLE IF NOT EXISTS subscriptions (
        user_id TEXT PRIMARY KEY,
        plan TEXT NOT NULL,
        status TEXT NOT NULL,
        current_period_end_ms INTEGER
    )",
];

/// SQLite-backed store. Reports are kept as JSON text.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and applies the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(_) => tracing::info!(path = %path.display(), "Database file created"),
            Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "Database file already exists")
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to create database file");
                return Err(StoreError::FileCreation(e.to_string()));
            }
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}", path.display())).await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database, one connection so every query sees the same data
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn set_subscription(
        &self,
        user_id: &str,
        record: &SubscriptionRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO subscriptions (user_id, plan, status, current_period_end_ms)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE SET
                plan = excluded.plan,
                status = excluded.status,
                current_period_end_ms = excluded.current_period_end_ms",
        )
        .bind(user_id)
        .bind(&record.plan)
        .bind(record.status.as_str())
        .bind(record.current_period_end.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[async_trait]
impl AnalysisStore for SqliteStore {
    async fn recent_analyses(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CompositeReport>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, report FROM analyses
             WHERE user_id = ? AND created_at_ms >= ?
             ORDER BY created_at_ms DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(since.timestamp_millis())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let raw: String = row.get("report");
            match serde_json::from_str::<CompositeReport>(&raw) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::debug!(id = %id, error = %e, "Skipping unreadable stored analysis"),
            }
        }
        Ok(reports)
    }

    async fn subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT plan, status, current_period_end_ms FROM subscriptions WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let status: String = row.get("status");
            let end: Option<i64> = row.get("current_period_end_ms");
            Some(SubscriptionRecord {
                plan: row.get("plan"),
                status: SubscriptionStatus::parse(&status)?,
                current_period_end: end.and_then(from_millis),
            })
        }))
    }

    async fn monthly_usage(&self, user_id: &str, month: &str) -> Result<MonthlyUsage, StoreError> {
        let row = sqlx::query(
            "SELECT analyses, tokens, cost_usd FROM usage_counters WHERE user_id = ? AND month = ?",
        )
        .bind(user_id)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|row| MonthlyUsage {
                analyses: row.get::<i64, _>("analyses") as u32,
                tokens: row.get::<i64, _>("tokens") as u64,
                cost_usd: row.get("cost_usd"),
            })
            .unwrap_or_default())
    }

    async fn persist_analysis(
        &self,
        report: &CompositeReport,
        usage: UsageDelta,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(report)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO analyses (id, user_id, target_url, created_at_ms, report)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&report.id)
        .bind(&report.user_id)
        .bind(&report.target_url)
        .bind(report.created_at.timestamp_millis())
        .bind(&json)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO usage_counters (user_id, month, analyses, tokens, cost_usd)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (user_id, month) DO UPDATE SET
                analyses = analyses + excluded.analyses,
                tokens = tokens + excluded.tokens,
                cost_usd = cost_usd + excluded.cost_usd",
        )
        .bind(&report.user_id)
        .bind(month_key(report.created_at))
        .bind(i64::from(usage.analyses))
        .bind(usage.tokens as i64)
        .bind(usage.cost_usd)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_analysis(&self, id: &str) -> Result<Option<CompositeReport>, StoreError> {
        let row = sqlx::query("SELECT report FROM analyses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("report");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn update_analysis(&self, report: &CompositeReport) -> Result<bool, StoreError> {
        let json = serde_json::to_string(report)?;
        let result = sqlx::query("UPDATE analyses SET report = ? WHERE id = ?")
            .bind(&json)
            .bind(&report.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
