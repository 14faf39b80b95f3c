//! Plan-gated payment gateways and checkout options

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::plan::{Access, BenefitKey, PlanPermissions};
use crate::domain::aggregates::store::Store;
use crate::domain::value_objects::LimitValue;

/// How many payment gateways the store may switch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentGatewayControl {
    pub allowed: bool,
    pub limit: Option<LimitValue>,
    pub active: u64,
}

impl PaymentGatewayControl {
    pub fn new(permissions: &PlanPermissions, active: u64) -> Self {
        match permissions.check(&BenefitKey::PaymentGateways) {
            Access::Granted { limit } => Self { allowed: true, limit: Some(limit), active },
            Access::Denied { .. } => Self { allowed: false, limit: None, active },
        }
    }

    pub fn can_enable_another(&self) -> bool {
        self.limit.is_some_and(|limit| limit.allows(self.active, 1))
    }

    /// `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        match self.limit {
            Some(limit) => limit.remaining(self.active),
            None => Some(0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutOption {
    Whatsapp,
    CashOnDelivery,
    OnlinePayment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutOptions {
    pub options: Vec<CheckoutOption>,
}

impl CheckoutOptions {
    pub fn resolve(permissions: &PlanPermissions, store: &Store, active_gateways: u64) -> Self {
        let mut options = Vec::new();
        if permissions.has_access(&BenefitKey::WhatsappCheckout) && store.has_whatsapp() {
            options.push(CheckoutOption::Whatsapp);
        }
        if permissions.has_access(&BenefitKey::CashOnDelivery) && store.cash_on_delivery_enabled {
            options.push(CheckoutOption::CashOnDelivery);
        }
        if permissions.has_access(&BenefitKey::PaymentGateways) && active_gateways > 0 {
            options.push(CheckoutOption::OnlinePayment);
        }
        Self { options }
    }

    pub fn is_available(&self) -> bool { !self.options.is_empty() }

    pub fn allows(&self, option: CheckoutOption) -> bool { self.options.contains(&option) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::plan::{PlanBenefit, Role, Subscription, SubscriptionPlan, SubscriptionStatus};
    use crate::domain::value_objects::PlanId;
    use chrono::Utc;

    fn permissions(benefits: Vec<(BenefitKey, Option<LimitValue>)>) -> PlanPermissions {
        let plan = SubscriptionPlan {
            id: PlanId::new(),
            name: "Basic".into(),
            is_active: true,
            benefits: benefits.into_iter().map(|(key, limit)| PlanBenefit { key, is_enabled: true, limit }).collect(),
        };
        let store = Store::create("Acme");
        let sub = Subscription { store_id: store.id, plan_id: plan.id, status: SubscriptionStatus::Active, current_period_end: None };
        PlanPermissions::resolve(Role::Owner, Some(&sub), Some(&plan), Utc::now())
    }

    #[test]
    fn test_gateway_limit() {
        let perms = permissions(vec![(BenefitKey::PaymentGateways, Some(LimitValue::Count(2)))]);
        let control = PaymentGatewayControl::new(&perms, 1);
        assert!(control.can_enable_another());
        assert_eq!(control.remaining(), Some(1));
        assert!(!PaymentGatewayControl::new(&perms, 2).can_enable_another());
    }

    #[test]
    fn test_gateway_denied_without_benefit() {
        let control = PaymentGatewayControl::new(&permissions(vec![]), 0);
        assert!(!control.allowed);
        assert!(!control.can_enable_another());
        assert_eq!(control.remaining(), Some(0));
    }

    #[test]
    fn test_checkout_options() {
        let perms = permissions(vec![
            (BenefitKey::WhatsappCheckout, None),
            (BenefitKey::PaymentGateways, Some(LimitValue::Unlimited)),
        ]);
        let mut store = Store::create("Acme");
        store.cash_on_delivery_enabled = true;
        let opts = CheckoutOptions::resolve(&perms, &store, 0);
        assert!(!opts.is_available(), "whatsapp needs a number, cod needs the benefit, online needs a gateway");

        store.whatsapp_number = Some("+551100".into());
        let opts = CheckoutOptions::resolve(&perms, &store, 1);
        assert_eq!(opts.options, vec![CheckoutOption::Whatsapp, CheckoutOption::OnlinePayment]);
        assert!(!opts.allows(CheckoutOption::CashOnDelivery));
    }
}
