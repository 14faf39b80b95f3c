//! `PostgreSQL` usage counters.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{to_i64, to_u64};
use crate::domain::aggregates::{FeatureType, FeatureUsage, UsageWindow};
use crate::domain::value_objects::StoreId;
use crate::services::metering::{IncrementOutcome, UsageRepository};
use crate::Result;

#[derive(Clone)]
pub struct PgUsageRepository {
    pool: PgPool,
}

impl PgUsageRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    async fn load(&self, store_id: StoreId, feature: FeatureType, window: UsageWindow) -> Result<FeatureUsage> {
        let used: Option<i64> = sqlx::query_scalar(
            "SELECT used FROM feature_usage WHERE store_id = $1 AND feature_type = $2 AND period_start = $3",
        )
        .bind(store_id)
        .bind(feature.as_str())
        .bind(window.start)
        .fetch_optional(&self.pool)
        .await?;
        match used {
            Some(used) => Ok(FeatureUsage { store_id, feature, used: to_u64(used, "used")?, window }),
            None => Ok(FeatureUsage::empty(store_id, feature, window)),
        }
    }

    async fn try_increment(
        &self,
        store_id: StoreId,
        feature: FeatureType,
        window: UsageWindow,
        amount: u64,
        cap: Option<u64>,
    ) -> Result<IncrementOutcome> {
        let amount = to_i64(amount)?;
        let cap = cap.map(|c| i64::try_from(c).unwrap_or(i64::MAX));

        sqlx::query(
            r#"
            INSERT INTO feature_usage (store_id, feature_type, period_start, period_end, used)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (store_id, feature_type, period_start) DO NOTHING
            "#,
        )
        .bind(store_id)
        .bind(feature.as_str())
        .bind(window.start)
        .bind(window.end)
        .execute(&self.pool)
        .await?;

        // The row lock taken by UPDATE makes the cap check and the increment one step.
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE feature_usage SET used = used + $4, updated_at = NOW()
            WHERE store_id = $1 AND feature_type = $2 AND period_start = $3
              AND ($5::BIGINT IS NULL OR used + $4 <= $5)
            RETURNING used
            "#,
        )
        .bind(store_id)
        .bind(feature.as_str())
        .bind(window.start)
        .bind(amount)
        .bind(cap)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(used) => Ok(IncrementOutcome::Recorded(FeatureUsage { store_id, feature, used: to_u64(used, "used")?, window })),
            None => Ok(IncrementOutcome::Rejected(self.load(store_id, feature, window).await?)),
        }
    }
}
