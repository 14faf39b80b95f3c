//! Subscription plans, benefits and the permission resolver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use crate::domain::value_objects::{LimitValue, PlanId, StoreId};

/// Capability a plan can grant.
///
/// Keys that this build does not know about are kept in [`BenefitKey::Other`]
/// so plans can gate capabilities this build has no dedicated variant for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BenefitKey {
    ImageUploads,
    Products,
    PaymentGateways,
    CustomDomain,
    ConversionPixels,
    AiContent,
    WhatsappCheckout,
    CashOnDelivery,
    WholesalePricing,
    Banners,
    Other(String),
}

impl BenefitKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ImageUploads => "image_uploads",
            Self::Products => "max_products",
            Self::PaymentGateways => "payment_gateways",
            Self::CustomDomain => "custom_domain",
            Self::ConversionPixels => "conversion_pixels",
            Self::AiContent => "ai_content",
            Self::WhatsappCheckout => "whatsapp_checkout",
            Self::CashOnDelivery => "cash_on_delivery",
            Self::WholesalePricing => "wholesale_pricing",
            Self::Banners => "banners",
            Self::Other(key) => key,
        }
    }
}

impl FromStr for BenefitKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "image_uploads" => Self::ImageUploads,
            "max_products" => Self::Products,
            "payment_gateways" => Self::PaymentGateways,
            "custom_domain" => Self::CustomDomain,
            "conversion_pixels" => Self::ConversionPixels,
            "ai_content" => Self::AiContent,
            "whatsapp_checkout" => Self::WhatsappCheckout,
            "cash_on_delivery" => Self::CashOnDelivery,
            "wholesale_pricing" => Self::WholesalePricing,
            "banners" => Self::Banners,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for BenefitKey {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(key) => key,
            Err(never) => match never {},
        }
    }
}

impl From<BenefitKey> for String {
    fn from(key: BenefitKey) -> Self { key.as_str().to_string() }
}

impl fmt::Display for BenefitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBenefit {
    pub key: BenefitKey,
    pub is_enabled: bool,
    /// `None` on an enabled benefit means no cap is configured.
    pub limit: Option<LimitValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    pub is_active: bool,
    pub benefits: Vec<PlanBenefit>,
}

impl SubscriptionPlan {
    pub fn benefit(&self, key: &BenefitKey) -> Option<&PlanBenefit> {
        self.benefits.iter().find(|b| &b.key == key)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Trialing,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Expired,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub store_id: StoreId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
            && self.current_period_end.map_or(true, |end| end > now)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    #[default]
    Owner,
    Staff,
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "superadmin" => Ok(Self::Superadmin),
            "owner" => Ok(Self::Owner),
            "staff" => Ok(Self::Staff),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoSubscription,
    SubscriptionInactive,
    BenefitMissing,
    BenefitDisabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum Access {
    Granted { limit: LimitValue },
    Denied { reason: DenialReason },
}

impl Access {
    pub fn is_granted(&self) -> bool { matches!(self, Self::Granted { .. }) }
}

#[derive(Clone, Debug)]
enum PlanState {
    Unavailable(DenialReason),
    Active(HashMap<BenefitKey, PlanBenefit>),
}

/// Answers "may this store use benefit X, and how much of it".
///
/// Anything not explicitly granted by an enabled benefit row is denied.
#[derive(Clone, Debug)]
pub struct PlanPermissions {
    role: Role,
    state: PlanState,
}

impl PlanPermissions {
    pub fn resolve(
        role: Role,
        subscription: Option<&Subscription>,
        plan: Option<&SubscriptionPlan>,
        now: DateTime<Utc>,
    ) -> Self {
        let state = match (subscription, plan) {
            (None, _) | (Some(_), None) => PlanState::Unavailable(DenialReason::NoSubscription),
            (Some(sub), Some(plan)) if !sub.is_current(now) || !plan.is_active || sub.plan_id != plan.id => {
                PlanState::Unavailable(DenialReason::SubscriptionInactive)
            }
            (Some(_), Some(plan)) => PlanState::Active(
                plan.benefits.iter().map(|b| (b.key.clone(), b.clone())).collect(),
            ),
        };
        Self { role, state }
    }

    /// Permissions for a store that has been soft-disabled.
    pub fn inactive_store(role: Role) -> Self {
        Self { role, state: PlanState::Unavailable(DenialReason::SubscriptionInactive) }
    }

    pub fn check(&self, key: &BenefitKey) -> Access {
        if self.role == Role::Superadmin {
            return Access::Granted { limit: LimitValue::Unlimited };
        }
        let benefits = match &self.state {
            PlanState::Unavailable(reason) => return Access::Denied { reason: *reason },
            PlanState::Active(benefits) => benefits,
        };
        match benefits.get(key) {
            None => Access::Denied { reason: DenialReason::BenefitMissing },
            Some(b) if !b.is_enabled => Access::Denied { reason: DenialReason::BenefitDisabled },
            Some(b) => Access::Granted { limit: b.limit.unwrap_or(LimitValue::Unlimited) },
        }
    }

    pub fn has_access(&self, key: &BenefitKey) -> bool { self.check(key).is_granted() }

    pub fn limit(&self, key: &BenefitKey) -> Option<LimitValue> {
        match self.check(key) {
            Access::Granted { limit } => Some(limit),
            Access::Denied { .. } => None,
        }
    }

    /// Every benefit the plan lists, with the decision for each.
    pub fn summary(&self) -> Vec<(BenefitKey, Access)> {
        let mut keys: Vec<BenefitKey> = match &self.state {
            PlanState::Active(benefits) => benefits.keys().cloned().collect(),
            PlanState::Unavailable(_) => Vec::new(),
        };
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        keys.into_iter().map(|k| { let access = self.check(&k); (k, access) }).collect()
    }
}
