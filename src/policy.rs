use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub plan: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub max_competitors: usize,
    pub monthly_analyses: u32,
    pub premium_ai: bool,
}

impl TierLimits {
    pub fn free() -> Self {
        Self {
            max_competitors: 1,
            monthly_analyses: 10,
            premium_ai: false,
        }
    }

    pub fn premium() -> Self {
        Self {
            max_competitors: 5,
            monthly_analyses: 200,
            premium_ai: true,
        }
    }
}

pub const DEFAULT_PREMIUM_PLANS: &[&str] = &["premium", "pro"];

/// Decides which tier a user belongs to.
///
/// The decision only looks at the user id and the subscription record handed
/// in by the caller; nothing is read from global state.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    premium_user_ids: HashSet<String>,
    premium_plans: HashSet<String>,
    free: TierLimits,
    premium: TierLimits,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            premium_user_ids: HashSet::new(),
            premium_plans: DEFAULT_PREMIUM_PLANS.iter().map(|p| p.to_string()).collect(),
            free: TierLimits::free(),
            premium: TierLimits::premium(),
        }
    }
}

impl TierPolicy {
    pub fn new(
        premium_user_ids: impl IntoIterator<Item = String>,
        premium_plans: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            premium_user_ids: premium_user_ids.into_iter().collect(),
            premium_plans: premium_plans
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_limits(mut self, free: TierLimits, premium: TierLimits) -> Self {
        self.free = free;
        self.premium = premium;
        self
    }

    pub fn tier(
        &self,
        user_id: &str,
        subscription: Option<&SubscriptionRecord>,
        now: DateTime<Utc>,
    ) -> Tier {
        if self.premium_user_ids.contains(user_id) {
            return Tier::Premium;
        }

        match subscription {
            Some(record) if self.is_active_premium(record, now) => Tier::Premium,
            _ => Tier::Free,
        }
    }

    pub fn limits(&self, tier: Tier) -> TierLimits {
        match tier {
            Tier::Free => self.free,
            Tier::Premium => self.premium,
        }
    }

    fn is_active_premium(&self, record: &SubscriptionRecord, now: DateTime<Utc>) -> bool {
        let active = matches!(
            record.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        );
        let unexpired = record.current_period_end.is_none_or(|end| end > now);
        active && unexpired && self.premium_plans.contains(&record.plan.to_lowercase())
    }
}
