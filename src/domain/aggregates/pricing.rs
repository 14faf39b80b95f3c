//! Tiered (wholesale) pricing

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::value_objects::Money;

pub const RETAIL_TIER: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub tier_order: u32,
    pub min_quantity: u32,
    pub price: Decimal,
    pub is_enabled: bool,
    pub label: Option<String>,
}

impl PriceTier {
    pub fn retail(price: Decimal) -> Self {
        Self { tier_order: RETAIL_TIER, min_quantity: 1, price, is_enabled: true, label: Some("Retail".into()) }
    }

    pub fn is_retail(&self) -> bool { self.tier_order == RETAIL_TIER }
}

/// Ordered, validated list of price tiers for one product.
///
/// Tier 1 is retail: minimum quantity 1 and never disabled. Minimum
/// quantities rise strictly with `tier_order`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PriceTierSet {
    tiers: Vec<PriceTier>,
}

impl PriceTierSet {
    pub fn new(mut tiers: Vec<PriceTier>) -> Result<Self, PricingError> {
        if tiers.is_empty() { return Err(PricingError::Empty); }
        tiers.sort_by_key(|t| t.tier_order);

        for (expected, tier) in (RETAIL_TIER..).zip(tiers.iter()) {
            if tier.tier_order != expected {
                return Err(PricingError::NonContiguousOrder { expected, found: tier.tier_order });
            }
            if tier.price.is_sign_negative() {
                return Err(PricingError::NegativePrice(tier.tier_order));
            }
            if !Money::is_storable(tier.price) {
                return Err(PricingError::InvalidPrice(tier.tier_order));
            }
        }
        if let Some(retail) = tiers.first() {
            if retail.min_quantity != 1 { return Err(PricingError::RetailMinimum(retail.min_quantity)); }
            if !retail.is_enabled { return Err(PricingError::RetailDisabled); }
        }
        for pair in tiers.windows(2) {
            if let [lower, higher] = pair {
                if higher.min_quantity <= lower.min_quantity {
                    return Err(PricingError::MinimumNotIncreasing(higher.tier_order));
                }
            }
        }
        Ok(Self { tiers })
    }

    pub fn retail_only(price: Decimal) -> Self {
        Self { tiers: vec![PriceTier::retail(price)] }
    }

    pub fn tiers(&self) -> &[PriceTier] { &self.tiers }

    pub fn retail(&self) -> &PriceTier {
        // Construction guarantees a first element.
        &self.tiers[0]
    }

    pub fn enabled(&self) -> impl Iterator<Item = &PriceTier> { self.tiers.iter().filter(|t| t.is_enabled) }

    /// Enabled tier with the largest minimum quantity not above `quantity`.
    pub fn resolve(&self, quantity: u32) -> &PriceTier {
        self.enabled()
            .filter(|t| t.min_quantity <= quantity)
            .max_by_key(|t| t.min_quantity)
            .unwrap_or_else(|| self.retail())
    }

    pub fn unit_price(&self, quantity: u32) -> Decimal { self.resolve(quantity).price }

    /// Next tier above the one `quantity` resolves to, if any.
    pub fn next_break(&self, quantity: u32) -> Option<&PriceTier> {
        self.enabled().filter(|t| t.min_quantity > quantity).min_by_key(|t| t.min_quantity)
    }

    pub fn set_enabled(&mut self, tier_order: u32, enabled: bool) -> Result<(), PricingError> {
        if tier_order == RETAIL_TIER && !enabled { return Err(PricingError::RetailDisabled); }
        let tier = self.tiers.iter_mut().find(|t| t.tier_order == tier_order).ok_or(PricingError::TierNotFound(tier_order))?;
        tier.is_enabled = enabled;
        Ok(())
    }
}

impl<'de> Deserialize<'de> for PriceTierSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tiers = Vec::<PriceTier>::deserialize(deserializer)?;
        Self::new(tiers).map_err(serde::de::Error::custom)
    }
}

/// How a store derives tiers from a product's retail price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PriceModel {
    Retail,
    Wholesale { min_quantity: u32, price: Decimal },
    Gradual { steps: Vec<GradualStep> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradualStep {
    pub min_quantity: u32,
    /// Percent off retail, `0..100`.
    pub discount_percent: Decimal,
}

impl PriceModel {
    pub fn generate(&self, retail_price: Decimal) -> Result<PriceTierSet, PricingError> {
        let mut tiers = vec![PriceTier::retail(retail_price)];
        match self {
            Self::Retail => {}
            Self::Wholesale { min_quantity, price } => tiers.push(PriceTier {
                tier_order: 2,
                min_quantity: *min_quantity,
                price: *price,
                is_enabled: true,
                label: Some("Wholesale".into()),
            }),
            Self::Gradual { steps } => {
                let hundred = Decimal::ONE_HUNDRED;
                for (order, step) in (RETAIL_TIER + 1..).zip(steps.iter()) {
                    if step.discount_percent.is_sign_negative() || step.discount_percent >= hundred {
                        return Err(PricingError::InvalidDiscount(step.discount_percent));
                    }
                    let price = (retail_price * (hundred - step.discount_percent) / hundred)
                        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                    tiers.push(PriceTier {
                        tier_order: order,
                        min_quantity: step.min_quantity,
                        price,
                        is_enabled: true,
                        label: Some(format!("Level {}", order - 1)),
                    });
                }
            }
        }
        PriceTierSet::new(tiers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("at least the retail tier is required")]
    Empty,
    #[error("tier order must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguousOrder { expected: u32, found: u32 },
    #[error("retail tier must start at quantity 1, got {0}")]
    RetailMinimum(u32),
    #[error("retail tier cannot be disabled")]
    RetailDisabled,
    #[error("tier {0} minimum quantity must exceed the previous tier's")]
    MinimumNotIncreasing(u32),
    #[error("tier {0} has a negative price")]
    NegativePrice(u32),
    #[error("tier {0} price needs at most 2 decimal places and 10 integer digits")]
    InvalidPrice(u32),
    #[error("discount must be between 0 and 100, got {0}")]
    InvalidDiscount(Decimal),
    #[error("tier {0} not found")]
    TierNotFound(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(order: u32, min: u32, price: i64) -> PriceTier {
        PriceTier { tier_order: order, min_quantity: min, price: Decimal::new(price, 0), is_enabled: true, label: None }
    }

    fn sample() -> PriceTierSet {
        PriceTierSet::new(vec![tier(1, 1, 100), tier(2, 10, 85), tier(3, 50, 70)]).unwrap()
    }

    #[test]
    fn test_resolve_by_quantity() {
        let set = sample();
        assert_eq!(set.unit_price(12), Decimal::new(85, 0));
        assert_eq!(set.unit_price(1), Decimal::new(100, 0));
        assert_eq!(set.unit_price(9), Decimal::new(100, 0));
        assert_eq!(set.unit_price(10), Decimal::new(85, 0));
        assert_eq!(set.unit_price(500), Decimal::new(70, 0));
        assert!(set.resolve(0).is_retail());
    }

    #[test]
    fn test_disabled_tier_skipped_but_kept() {
        let mut set = sample();
        set.set_enabled(3, false).unwrap();
        assert_eq!(set.unit_price(60), Decimal::new(85, 0));
        assert_eq!(set.tiers().len(), 3);
        set.set_enabled(2, false).unwrap();
        assert!(set.resolve(60).is_retail());
        assert_eq!(set.set_enabled(1, false), Err(PricingError::RetailDisabled));
        assert_eq!(set.set_enabled(7, true), Err(PricingError::TierNotFound(7)));
    }

    #[test]
    fn test_validation() {
        assert_eq!(PriceTierSet::new(vec![]), Err(PricingError::Empty));
        assert_eq!(
            PriceTierSet::new(vec![tier(1, 1, 100), tier(3, 10, 90)]),
            Err(PricingError::NonContiguousOrder { expected: 2, found: 3 })
        );
        assert_eq!(PriceTierSet::new(vec![tier(1, 5, 100)]), Err(PricingError::RetailMinimum(5)));
        assert_eq!(
            PriceTierSet::new(vec![tier(1, 1, 100), tier(2, 10, 90), tier(3, 10, 80)]),
            Err(PricingError::MinimumNotIncreasing(3))
        );
        let mut fractional = tier(2, 10, 0);
        fractional.price = Decimal::new(84999, 3);
        assert_eq!(PriceTierSet::new(vec![tier(1, 1, 100), fractional]), Err(PricingError::InvalidPrice(2)));
        // Input order does not matter.
        let set = PriceTierSet::new(vec![tier(2, 10, 85), tier(1, 1, 100)]).unwrap();
        assert!(set.retail().is_retail());
    }

    #[test]
    fn test_next_break() {
        let set = sample();
        assert_eq!(set.next_break(12).map(|t| t.min_quantity), Some(50));
        assert!(set.next_break(50).is_none());
    }

    #[test]
    fn test_gradual_generation() {
        let model = PriceModel::Gradual {
            steps: vec![
                GradualStep { min_quantity: 6, discount_percent: Decimal::new(10, 0) },
                GradualStep { min_quantity: 12, discount_percent: Decimal::new(155, 1) },
            ],
        };
        let set = model.generate(Decimal::new(1999, 2)).unwrap();
        let prices: Vec<Decimal> = set.tiers().iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![Decimal::new(1999, 2), Decimal::new(1799, 2), Decimal::new(1689, 2)]);

        let bad = PriceModel::Gradual { steps: vec![GradualStep { min_quantity: 3, discount_percent: Decimal::ONE_HUNDRED }] };
        assert!(matches!(bad.generate(Decimal::TEN), Err(PricingError::InvalidDiscount(_))));
    }

    #[test]
    fn test_wholesale_generation_requires_real_minimum() {
        let ok = PriceModel::Wholesale { min_quantity: 10, price: Decimal::new(80, 0) };
        assert_eq!(ok.generate(Decimal::ONE_HUNDRED).unwrap().unit_price(10), Decimal::new(80, 0));
        let bad = PriceModel::Wholesale { min_quantity: 1, price: Decimal::new(80, 0) };
        assert_eq!(bad.generate(Decimal::ONE_HUNDRED), Err(PricingError::MinimumNotIncreasing(2)));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"[{"tier_order":1,"min_quantity":1,"price":"10","is_enabled":true,"label":null},
                       {"tier_order":2,"min_quantity":1,"price":"9","is_enabled":true,"label":null}]"#;
        assert!(serde_json::from_str::<PriceTierSet>(json).is_err());
    }
}
