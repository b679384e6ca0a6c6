use crate::error::StoreError;
use crate::models::CompositeReport;
use crate::policy::SubscriptionRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Increment applied to a user's monthly usage counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub analyses: u32,
    pub tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUsage {
    pub analyses: u32,
    pub tokens: u64,
    pub cost_usd: f64,
}

/// Usage counters are bucketed by calendar month, e.g. `2026-10`
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Row storage for analyses, subscriptions and usage counters.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// The user's analyses created at or after `since`, most recent first
    async fn recent_analyses(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CompositeReport>, StoreError>;

    async fn subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, StoreError>;

    async fn monthly_usage(&self, user_id: &str, month: &str) -> Result<MonthlyUsage, StoreError>;

    /// Inserts the report and bumps the usage counter as one unit
    async fn persist_analysis(
        &self,
        report: &CompositeReport,
        usage: UsageDelta,
    ) -> Result<(), StoreError>;

    async fn load_analysis(&self, id: &str) -> Result<Option<CompositeReport>, StoreError>;

    /// Replaces a stored report by id. Returns false when no row matched.
    async fn update_analysis(&self, report: &CompositeReport) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    analyses: Vec<CompositeReport>,
    usage: HashMap<(String, String), MonthlyUsage>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    writes: usize,
}

/// In-process store, used for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a historical analysis without touching usage or the write counter
    pub fn seed_analysis(&self, report: CompositeReport) {
        self.lock().analyses.push(report);
    }

    pub fn set_subscription(&self, user_id: &str, record: SubscriptionRecord) {
        self.lock().subscriptions.insert(user_id.to_string(), record);
    }

    pub fn set_usage(&self, user_id: &str, month: &str, usage: MonthlyUsage) {
        self.lock()
            .usage
            .insert((user_id.to_string(), month.to_string()), usage);
    }

    pub fn analyses(&self) -> Vec<CompositeReport> {
        self.lock().analyses.clone()
    }

    /// Number of persist/update calls that changed state
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn recent_analyses(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CompositeReport>, StoreError> {
        let state = self.lock();
        let mut rows: Vec<CompositeReport> = state
            .analyses
            .iter()
            .filter(|r| r.user_id == user_id && r.created_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self.lock().subscriptions.get(user_id).cloned())
    }

    async fn monthly_usage(&self, user_id: &str, month: &str) -> Result<MonthlyUsage, StoreError> {
        Ok(self
            .lock()
            .usage
            .get(&(user_id.to_string(), month.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn persist_analysis(
        &self,
        report: &CompositeReport,
        usage: UsageDelta,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let key = (report.user_id.clone(), month_key(report.created_at));
        let counter = state.usage.entry(key).or_default();
        counter.analyses += usage.analyses;
        counter.tokens += usage.tokens;
        counter.cost_usd += usage.cost_usd;
        state.analyses.push(report.clone());
        state.writes += 1;
        Ok(())
    }

    async fn load_analysis(&self, id: &str) -> Result<Option<CompositeReport>, StoreError> {
        Ok(self.lock().analyses.iter().find(|r| r.id == id).cloned())
    }

    async fn update_analysis(&self, report: &CompositeReport) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(slot) = state.analyses.iter_mut().find(|r| r.id == report.id) else {
            return Ok(false);
        };
        *slot = report.clone();
        state.writes += 1;
        Ok(true)
    }
}
