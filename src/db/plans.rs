//! Subscription, plan and benefit queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::aggregates::{BenefitKey, PlanBenefit, PlanPermissions, Role, Store, Subscription, SubscriptionPlan, SubscriptionStatus};
use crate::domain::value_objects::{LimitValue, PlanId, StoreId};
use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    store_id: StoreId,
    plan_id: PlanId,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: PlanId,
    name: String,
    is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct BenefitRow {
    benefit_key: String,
    is_enabled: bool,
    limit_value: Option<String>,
}

impl TryFrom<BenefitRow> for PlanBenefit {
    type Error = Error;

    fn try_from(row: BenefitRow) -> Result<Self> {
        let limit = row
            .limit_value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(str::parse::<LimitValue>)
            .transpose()
            .map_err(|e| Error::InvalidData(format!("benefit {}: {e}", row.benefit_key)))?;
        Ok(Self { key: BenefitKey::from(row.benefit_key), is_enabled: row.is_enabled, limit })
    }
}

pub async fn get_subscription(pool: &PgPool, store_id: StoreId) -> Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT store_id, plan_id, status, current_period_end FROM store_subscriptions WHERE store_id = $1",
    )
    .bind(store_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| Subscription {
        store_id: r.store_id,
        plan_id: r.plan_id,
        status: SubscriptionStatus::from_string(&r.status),
        current_period_end: r.current_period_end,
    }))
}

pub async fn get_plan(pool: &PgPool, plan_id: PlanId) -> Result<Option<SubscriptionPlan>> {
    let Some(plan) = sqlx::query_as::<_, PlanRow>("SELECT id, name, is_active FROM subscription_plans WHERE id = $1")
        .bind(plan_id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };
    let benefits = sqlx::query_as::<_, BenefitRow>(
        "SELECT benefit_key, is_enabled, limit_value FROM plan_benefits WHERE plan_id = $1 ORDER BY benefit_key",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(PlanBenefit::try_from)
    .collect::<Result<Vec<_>>>()?;
    Ok(Some(SubscriptionPlan { id: plan.id, name: plan.name, is_active: plan.is_active, benefits }))
}

/// Resolves what `role` may do in `store` right now.
pub async fn load_permissions(pool: &PgPool, store: &Store, role: Role, now: DateTime<Utc>) -> Result<PlanPermissions> {
    if role == Role::Superadmin {
        return Ok(PlanPermissions::resolve(role, None, None, now));
    }
    if !store.is_active {
        return Ok(PlanPermissions::inactive_store(role));
    }
    let subscription = get_subscription(pool, store.id).await?;
    let plan = match &subscription {
        Some(sub) => get_plan(pool, sub.plan_id).await?,
        None => None,
    };
    Ok(PlanPermissions::resolve(role, subscription.as_ref(), plan.as_ref(), now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Access, DenialReason};
    use sqlx::postgres::PgPoolOptions;

    // Neither branch below touches the database.
    fn unreachable_pool() -> PgPool {
        PgPoolOptions::new().connect_lazy("postgres://storefront@localhost/unused").unwrap()
    }

    #[tokio::test]
    async fn test_disabled_store_has_no_plan_access() {
        let mut store = Store::create("Closed Shop");
        store.is_active = false;
        let perms = load_permissions(&unreachable_pool(), &store, Role::Owner, Utc::now()).await.unwrap();
        assert_eq!(perms.check(&BenefitKey::Banners), Access::Denied { reason: DenialReason::SubscriptionInactive });

        let perms = load_permissions(&unreachable_pool(), &store, Role::Superadmin, Utc::now()).await.unwrap();
        assert!(perms.has_access(&BenefitKey::Banners));
    }

    #[test]
    fn test_benefit_row_parsing() {
        let row = BenefitRow { benefit_key: "image_uploads".into(), is_enabled: true, limit_value: Some("50".into()) };
        let benefit = PlanBenefit::try_from(row).unwrap();
        assert_eq!(benefit.key, BenefitKey::ImageUploads);
        assert_eq!(benefit.limit, Some(LimitValue::Count(50)));

        let blank = BenefitRow { benefit_key: "banners".into(), is_enabled: true, limit_value: Some("  ".into()) };
        assert_eq!(PlanBenefit::try_from(blank).unwrap().limit, None);

        let bad = BenefitRow { benefit_key: "banners".into(), is_enabled: true, limit_value: Some("many".into()) };
        assert!(matches!(PlanBenefit::try_from(bad), Err(Error::InvalidData(_))));
    }
}
