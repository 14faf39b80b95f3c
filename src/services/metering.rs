//! Plan-limited usage metering.
//!
//! Every metered action goes through [`UsageMeter::consume`]: the plan must
//! grant the feature's benefit, and the counter for the current period is
//! bumped with a single compare-and-increment so concurrent requests can
//! never push it past the limit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::aggregates::{Access, FeatureType, FeatureUsage, PlanPermissions, UsageDecision, UsageStatus, UsageWindow};
use crate::domain::events::{DomainEvent, UsageEvent};
use crate::domain::value_objects::{LimitValue, StoreId};
use crate::messaging::EventPublisher;
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncrementOutcome {
    Recorded(FeatureUsage),
    /// Counter left untouched because the increment would exceed the cap.
    Rejected(FeatureUsage),
}

/// Storage for per-period usage counters.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Counter for `window`, zero when nothing was recorded yet.
    async fn load(&self, store_id: StoreId, feature: FeatureType, window: UsageWindow) -> Result<FeatureUsage>;

    /// Atomically adds `amount` unless the result would exceed `cap` (`None` = no cap).
    async fn try_increment(
        &self,
        store_id: StoreId,
        feature: FeatureType,
        window: UsageWindow,
        amount: u64,
        cap: Option<u64>,
    ) -> Result<IncrementOutcome>;
}

type CounterKey = (StoreId, FeatureType, DateTime<Utc>);

/// Process-local counters, used by tests and single-node setups.
#[derive(Clone, Default)]
pub struct InMemoryUsageRepository {
    counters: Arc<Mutex<HashMap<CounterKey, u64>>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn load(&self, store_id: StoreId, feature: FeatureType, window: UsageWindow) -> Result<FeatureUsage> {
        let counters = self.counters.lock().await;
        let used = counters.get(&(store_id, feature, window.start)).copied().unwrap_or(0);
        Ok(FeatureUsage { store_id, feature, used, window })
    }

    async fn try_increment(
        &self,
        store_id: StoreId,
        feature: FeatureType,
        window: UsageWindow,
        amount: u64,
        cap: Option<u64>,
    ) -> Result<IncrementOutcome> {
        let mut counters = self.counters.lock().await;
        let used = counters.entry((store_id, feature, window.start)).or_insert(0);
        let next = used.saturating_add(amount);
        if cap.is_some_and(|cap| next > cap) {
            return Ok(IncrementOutcome::Rejected(FeatureUsage { store_id, feature, used: *used, window }));
        }
        *used = next;
        Ok(IncrementOutcome::Recorded(FeatureUsage { store_id, feature, used: next, window }))
    }
}

#[derive(Clone)]
pub struct UsageMeter {
    repo: Arc<dyn UsageRepository>,
    events: EventPublisher,
}

impl UsageMeter {
    pub fn new(repo: Arc<dyn UsageRepository>, events: EventPublisher) -> Self { Self { repo, events } }

    /// Current usage for the image upload control and similar meters.
    pub async fn status(&self, permissions: &PlanPermissions, store_id: StoreId, feature: FeatureType, now: DateTime<Utc>) -> Result<UsageStatus> {
        let limit = limit_for(permissions, feature)?;
        let usage = self.repo.load(store_id, feature, feature.period().window(now)).await?;
        Ok(usage.status(limit))
    }

    /// Whether `amount` more uses would currently be accepted. Advisory only.
    pub async fn preflight(&self, permissions: &PlanPermissions, store_id: StoreId, feature: FeatureType, amount: u64, now: DateTime<Utc>) -> Result<UsageDecision> {
        let limit = limit_for(permissions, feature)?;
        let usage = self.repo.load(store_id, feature, feature.period().window(now)).await?;
        Ok(usage.evaluate(limit, amount))
    }

    pub async fn consume(&self, permissions: &PlanPermissions, store_id: StoreId, feature: FeatureType, amount: u64, now: DateTime<Utc>) -> Result<UsageStatus> {
        if amount == 0 { return Err(Error::InvalidQuantity); }
        let limit = limit_for(permissions, feature)?;
        let window = feature.period().window(now);

        // Unlimited skips the cap entirely; the counter still moves for reporting.
        match self.repo.try_increment(store_id, feature, window, amount, limit.as_count()).await? {
            IncrementOutcome::Recorded(usage) => {
                tracing::info!(%store_id, %feature, used = usage.used, %limit, "usage recorded");
                self.events.publish(&DomainEvent::Usage(UsageEvent::Recorded { store_id, feature, used: usage.used })).await;
                Ok(usage.status(limit))
            }
            IncrementOutcome::Rejected(usage) => {
                tracing::warn!(%store_id, %feature, used = usage.used, %limit, requested = amount, "usage limit reached");
                self.events.publish(&DomainEvent::Usage(UsageEvent::LimitReached { store_id, feature, used: usage.used, limit })).await;
                Err(Error::UsageLimitReached { feature, used: usage.used, limit })
            }
        }
    }
}

fn limit_for(permissions: &PlanPermissions, feature: FeatureType) -> Result<LimitValue> {
    let benefit = feature.benefit();
    match permissions.check(&benefit) {
        Access::Granted { limit } => Ok(limit),
        Access::Denied { reason } => Err(Error::FeatureNotAvailable { benefit, reason }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{BenefitKey, DenialReason, PlanBenefit, Role, Subscription, SubscriptionPlan, SubscriptionStatus};
    use crate::domain::value_objects::PlanId;

    fn permissions(limit: Option<&str>) -> PlanPermissions {
        let plan = SubscriptionPlan {
            id: PlanId::new(),
            name: "Starter".into(),
            is_active: true,
            benefits: limit
                .map(|l| vec![PlanBenefit { key: BenefitKey::ImageUploads, is_enabled: true, limit: Some(l.parse().unwrap()) }])
                .unwrap_or_default(),
        };
        let sub = Subscription { store_id: StoreId::new(), plan_id: plan.id, status: SubscriptionStatus::Active, current_period_end: None };
        PlanPermissions::resolve(Role::Owner, Some(&sub), Some(&plan), Utc::now())
    }

    fn meter() -> UsageMeter {
        UsageMeter::new(Arc::new(InMemoryUsageRepository::new()), EventPublisher::disabled())
    }

    #[tokio::test]
    async fn test_consume_until_limit() {
        let meter = meter();
        let perms = permissions(Some("3"));
        let store = StoreId::new();
        let now = Utc::now();

        let status = meter.consume(&perms, store, FeatureType::ImageUpload, 2, now).await.unwrap();
        assert_eq!(status.remaining, Some(1));
        let err = meter.consume(&perms, store, FeatureType::ImageUpload, 2, now).await.unwrap_err();
        assert!(matches!(err, Error::UsageLimitReached { used: 2, limit: LimitValue::Count(3), .. }));
        meter.consume(&perms, store, FeatureType::ImageUpload, 1, now).await.unwrap();
        assert_eq!(meter.status(&perms, store, FeatureType::ImageUpload, now).await.unwrap().used, 3);
    }

    #[tokio::test]
    async fn test_unlimited_bypasses_counter_check() {
        let meter = meter();
        let perms = permissions(Some("unlimited"));
        let store = StoreId::new();
        let status = meter.consume(&perms, store, FeatureType::ImageUpload, 10_000, Utc::now()).await.unwrap();
        assert_eq!(status.remaining, None);
        assert_eq!(status.used, 10_000);
    }

    #[tokio::test]
    async fn test_missing_benefit_is_upgrade_required() {
        let meter = meter();
        let err = meter.consume(&permissions(None), StoreId::new(), FeatureType::ImageUpload, 1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::FeatureNotAvailable { reason: DenialReason::BenefitMissing, .. }));
    }

    #[tokio::test]
    async fn test_preflight_does_not_count() {
        let meter = meter();
        let perms = permissions(Some("1"));
        let store = StoreId::new();
        let now = Utc::now();
        assert_eq!(meter.preflight(&perms, store, FeatureType::ImageUpload, 1, now).await.unwrap(), UsageDecision::Allowed { remaining: Some(0) });
        assert_eq!(meter.preflight(&perms, store, FeatureType::ImageUpload, 1, now).await.unwrap(), UsageDecision::Allowed { remaining: Some(0) });
        assert!(matches!(meter.consume(&perms, store, FeatureType::ImageUpload, 0, now).await, Err(Error::InvalidQuantity)));
    }
}
