//! Metered feature usage

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::domain::aggregates::plan::BenefitKey;
use crate::domain::value_objects::{LimitValue, StoreId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    ImageUpload,
    AiGeneration,
    ProductCreate,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageUpload => "image_upload",
            Self::AiGeneration => "ai_generation",
            Self::ProductCreate => "product_create",
        }
    }

    /// Benefit whose limit caps this feature.
    pub fn benefit(&self) -> BenefitKey {
        match self {
            Self::ImageUpload => BenefitKey::ImageUploads,
            Self::AiGeneration => BenefitKey::AiContent,
            Self::ProductCreate => BenefitKey::Products,
        }
    }

    pub fn period(&self) -> UsagePeriod {
        match self {
            Self::AiGeneration => UsagePeriod::Daily,
            Self::ImageUpload | Self::ProductCreate => UsagePeriod::Monthly,
        }
    }
}

impl FromStr for FeatureType {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_upload" => Ok(Self::ImageUpload),
            "ai_generation" => Ok(Self::AiGeneration),
            "product_create" => Ok(Self::ProductCreate),
            other => Err(UnknownFeature(other.to_string())),
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature type: {0}")]
pub struct UnknownFeature(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsagePeriod {
    Daily,
    Monthly,
}

impl UsagePeriod {
    /// Window (UTC) containing `now`.
    pub fn window(&self, now: DateTime<Utc>) -> UsageWindow {
        let today = now.date_naive();
        let (start, end) = match self {
            Self::Daily => (today, today + Duration::days(1)),
            Self::Monthly => {
                let first = today - Duration::days(i64::from(today.day0()));
                (first, first + Months::new(1))
            }
        };
        UsageWindow {
            start: Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN)),
            end: Utc.from_utc_datetime(&end.and_time(NaiveTime::MIN)),
        }
    }
}

/// Half-open `[start, end)` counting window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUsage {
    pub store_id: StoreId,
    pub feature: FeatureType,
    pub used: u64,
    pub window: UsageWindow,
}

impl FeatureUsage {
    pub fn empty(store_id: StoreId, feature: FeatureType, window: UsageWindow) -> Self {
        Self { store_id, feature, used: 0, window }
    }

    pub fn evaluate(&self, limit: LimitValue, requested: u64) -> UsageDecision {
        if limit.allows(self.used, requested) {
            UsageDecision::Allowed { remaining: limit.remaining(self.used.saturating_add(requested)) }
        } else {
            UsageDecision::LimitReached { used: self.used, limit }
        }
    }

    pub fn status(&self, limit: LimitValue) -> UsageStatus {
        UsageStatus {
            feature: self.feature,
            used: self.used,
            limit,
            remaining: limit.remaining(self.used),
            period_start: self.window.start,
            period_end: self.window.end,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum UsageDecision {
    /// `remaining` is `None` for unlimited features.
    Allowed { remaining: Option<u64> },
    LimitReached { used: u64, limit: LimitValue },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UsageStatus {
    pub feature: FeatureType,
    pub used: u64,
    pub limit: LimitValue,
    pub remaining: Option<u64>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_window() {
        let w = UsagePeriod::Monthly.window(at(2024, 12, 17, 15));
        assert_eq!(w.start, at(2024, 12, 1, 0));
        assert_eq!(w.end, at(2025, 1, 1, 0));
        assert_eq!(UsagePeriod::Monthly.window(at(2024, 12, 31, 23)), w);
    }

    #[test]
    fn test_daily_window() {
        let w = UsagePeriod::Daily.window(at(2024, 2, 29, 8));
        assert_eq!(w.start, at(2024, 2, 29, 0));
        assert_eq!(w.end, at(2024, 3, 1, 0));
    }

    #[test]
    fn test_next_period_gets_its_own_window() {
        let may = UsagePeriod::Monthly.window(at(2024, 5, 31, 23));
        let june = UsagePeriod::Monthly.window(at(2024, 6, 1, 0));
        assert_ne!(may.start, june.start);
        assert_eq!(may.end, june.start);
        assert_eq!(FeatureUsage::empty(StoreId::new(), FeatureType::ImageUpload, june).used, 0);
    }

    #[test]
    fn test_evaluate_against_limit() {
        let window = UsagePeriod::Monthly.window(Utc::now());
        let usage = FeatureUsage { store_id: StoreId::new(), feature: FeatureType::ImageUpload, used: 9, window };
        assert_eq!(usage.evaluate(LimitValue::Count(10), 1), UsageDecision::Allowed { remaining: Some(0) });
        assert_eq!(
            usage.evaluate(LimitValue::Count(10), 2),
            UsageDecision::LimitReached { used: 9, limit: LimitValue::Count(10) }
        );
        assert_eq!(usage.evaluate(LimitValue::Unlimited, 1000), UsageDecision::Allowed { remaining: None });
    }

    #[test]
    fn test_feature_parsing() {
        assert_eq!("image_upload".parse::<FeatureType>().unwrap(), FeatureType::ImageUpload);
        assert!("video_upload".parse::<FeatureType>().is_err());
        assert_eq!(FeatureType::AiGeneration.benefit(), BenefitKey::AiContent);
    }
}
