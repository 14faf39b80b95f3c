//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Defines a tenant-scoped identifier wrapping a [`Uuid`].
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub const fn from_uuid(id: Uuid) -> Self { Self(id) }
            pub const fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl Default for $name {
            fn default() -> Self { Self::new() }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self { Self(id) }
        }
    };
}

define_id!(StoreId);
define_id!(ProductId);
define_id!(VariationId);
define_id!(OrderId);
define_id!(PaymentId);
define_id!(PlanId);
define_id!(BannerId);

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, "USD") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
    pub fn with_amount(&self, amount: Decimal) -> Money { Money::new(amount, &self.currency) }

    /// Whether `amount` fits a `NUMERIC(12, 2)` column without rounding.
    pub fn is_storable(amount: Decimal) -> bool {
        amount.normalize().scale() <= 2 && amount.abs() < Decimal::new(10_000_000_000, 0)
    }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount.round_dp(2), self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
}

/// Limit attached to a plan benefit.
///
/// Stored as free text: either `"unlimited"` or a non-negative integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LimitValue {
    Unlimited,
    Count(u64),
}

impl LimitValue {
    pub const UNLIMITED: &'static str = "unlimited";

    pub fn is_unlimited(&self) -> bool { matches!(self, Self::Unlimited) }

    /// Whether `used + requested` still fits under the limit.
    pub fn allows(&self, used: u64, requested: u64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Count(limit) => used.checked_add(requested).is_some_and(|total| total <= *limit),
        }
    }

    pub fn remaining(&self, used: u64) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Count(limit) => Some(limit.saturating_sub(used)),
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Count(limit) => Some(*limit),
        }
    }
}

impl FromStr for LimitValue {
    type Err = LimitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case(Self::UNLIMITED) {
            return Ok(Self::Unlimited);
        }
        value
            .parse::<u64>()
            .map(Self::Count)
            .map_err(|_| LimitParseError(s.to_string()))
    }
}

impl fmt::Display for LimitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str(Self::UNLIMITED),
            Self::Count(n) => write!(f, "{n}"),
        }
    }
}

impl TryFrom<String> for LimitValue {
    type Error = LimitParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<LimitValue> for String {
    fn from(limit: LimitValue) -> Self { limit.to_string() }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid limit value: {0:?}")]
pub struct LimitParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }
    #[test]
    fn test_money_add() {
        let a = Money::usd(Decimal::new(100, 0));
        let b = Money::usd(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
    }
    #[test]
    fn test_storable_amounts() {
        assert!(Money::is_storable(Decimal::new(4999, 2)));
        assert!(Money::is_storable(Decimal::new(50000, 3)));
        assert!(!Money::is_storable(Decimal::new(1, 3)));
        assert!(!Money::is_storable(Decimal::new(49995, 3)));
        assert!(!Money::is_storable(Decimal::new(10_000_000_000, 0)));
    }
    #[test]
    fn test_money_currency_mismatch() {
        let a = Money::usd(Decimal::new(50, 0));
        assert_eq!(a.add(&Money::zero("EUR")), Err(MoneyError::CurrencyMismatch));
        assert!(Money::zero("EUR").is_zero());
    }
    #[test]
    fn test_limit_parsing() {
        assert_eq!("unlimited".parse::<LimitValue>().unwrap(), LimitValue::Unlimited);
        assert_eq!(" Unlimited ".parse::<LimitValue>().unwrap(), LimitValue::Unlimited);
        assert_eq!("25".parse::<LimitValue>().unwrap(), LimitValue::Count(25));
        assert!("-1".parse::<LimitValue>().is_err());
        assert!("lots".parse::<LimitValue>().is_err());
    }
    #[test]
    fn test_limit_allows() {
        let limit = LimitValue::Count(10);
        assert!(limit.allows(9, 1));
        assert!(!limit.allows(10, 1));
        assert!(!limit.allows(u64::MAX, 1));
        assert_eq!(limit.remaining(12), Some(0));
        assert!(LimitValue::Unlimited.allows(u64::MAX, 1));
    }
    #[test]
    fn test_limit_serde_as_string() {
        assert_eq!(serde_json::to_string(&LimitValue::Count(5)).unwrap(), "\"5\"");
        let parsed: LimitValue = serde_json::from_str("\"unlimited\"").unwrap();
        assert!(parsed.is_unlimited());
    }
}
