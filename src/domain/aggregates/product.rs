//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use crate::domain::aggregates::pricing::{PriceModel, PriceTier, PriceTierSet, PricingError};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, ProductId, Sku, StoreId, VariationId};

/// Stock counters shared by products and variations.
///
/// `available = stock - reserved`, which may only go negative when the
/// owner allows overselling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub stock: i64,
    pub reserved: i64,
}

impl StockLevel {
    pub fn new(stock: i64, reserved: i64) -> Self { Self { stock, reserved } }

    pub fn available(&self) -> i64 { self.stock - self.reserved }

    pub fn reserve(&mut self, qty: u32, allow_negative: bool) -> Result<(), StockError> {
        let qty = i64::from(qty);
        if qty == 0 { return Err(StockError::InvalidQuantity); }
        if !allow_negative && self.available() < qty {
            return Err(StockError::Insufficient { available: self.available(), requested: qty });
        }
        self.reserved += qty;
        Ok(())
    }

    pub fn release(&mut self, qty: u32) -> Result<(), StockError> {
        let qty = i64::from(qty);
        if qty == 0 { return Err(StockError::InvalidQuantity); }
        if qty > self.reserved { return Err(StockError::ReleaseExceedsReserved { reserved: self.reserved, requested: qty }); }
        self.reserved -= qty;
        Ok(())
    }

    /// Turns a reservation into a sale.
    pub fn commit(&mut self, qty: u32) -> Result<(), StockError> {
        self.release(qty)?;
        self.stock -= i64::from(qty);
        Ok(())
    }

    pub fn restock(&mut self, qty: u32) { self.stock += i64::from(qty); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Invalid quantity")]
    InvalidQuantity,
    #[error("Insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: i64, requested: i64 },
    #[error("Cannot release {requested}, only {reserved} reserved")]
    ReleaseExceedsReserved { reserved: i64, requested: i64 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }

    pub fn from_string(s: &str) -> Self {
        match s { "active" => Self::Active, "archived" => Self::Archived, _ => Self::Draft }
    }
}

/// Variation of a product, e.g. color `red` / size `M`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductVariation {
    pub id: VariationId,
    /// Group key (e.g. `color`) to selected value.
    pub attributes: BTreeMap<String, String>,
    pub stock: StockLevel,
    pub price_adjustment: Decimal,
}

/// Attribute group a variation's keys resolve against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationGroup {
    pub key: String,
    pub label: String,
    pub values: Vec<String>,
    /// `None` for platform-wide master groups.
    pub store_id: Option<StoreId>,
}

/// Store groups shadow master groups with the same key.
pub fn resolve_variation_groups(store_groups: &[VariationGroup], master_groups: &[VariationGroup]) -> Vec<VariationGroup> {
    let mut resolved: BTreeMap<&str, &VariationGroup> = master_groups.iter().map(|g| (g.key.as_str(), g)).collect();
    for group in store_groups {
        resolved.insert(group.key.as_str(), group);
    }
    resolved.into_values().cloned().collect()
}

#[derive(Clone, Debug)]
pub struct Product {
    id: ProductId,
    store_id: StoreId,
    sku: Sku,
    name: String,
    image_url: Option<String>,
    retail_price: Money,
    wholesale_price: Option<Money>,
    stock: StockLevel,
    allow_negative_stock: bool,
    status: ProductStatus,
    variations: Vec<ProductVariation>,
    tiers: PriceTierSet,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// Persisted product fields, used to rebuild the aggregate.
#[derive(Clone, Debug)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub store_id: StoreId,
    pub sku: Sku,
    pub name: String,
    pub image_url: Option<String>,
    pub retail_price: Money,
    pub wholesale_price: Option<Money>,
    pub stock: StockLevel,
    pub allow_negative_stock: bool,
    pub status: ProductStatus,
    pub variations: Vec<ProductVariation>,
    pub tiers: PriceTierSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(store_id: StoreId, sku: Sku, name: impl Into<String>, retail_price: Money) -> Self {
        let id = ProductId::new();
        let now = Utc::now();
        let mut product = Self {
            id, store_id, sku: sku.clone(), name: name.into(), image_url: None,
            tiers: PriceTierSet::retail_only(retail_price.amount()),
            retail_price, wholesale_price: None, stock: StockLevel::default(),
            allow_negative_stock: false, status: ProductStatus::Draft, variations: vec![],
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, store_id, sku }));
        product
    }

    pub fn restore(s: ProductSnapshot) -> Self {
        Self {
            id: s.id, store_id: s.store_id, sku: s.sku, name: s.name, image_url: s.image_url,
            retail_price: s.retail_price, wholesale_price: s.wholesale_price, stock: s.stock,
            allow_negative_stock: s.allow_negative_stock, status: s.status, variations: s.variations,
            tiers: s.tiers, created_at: s.created_at, updated_at: s.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> ProductId { self.id }
    pub fn store_id(&self) -> StoreId { self.store_id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn image_url(&self) -> Option<&str> { self.image_url.as_deref() }
    pub fn retail_price(&self) -> &Money { &self.retail_price }
    pub fn wholesale_price(&self) -> Option<&Money> { self.wholesale_price.as_ref() }
    pub fn stock(&self) -> StockLevel { self.stock }
    pub fn allows_negative_stock(&self) -> bool { self.allow_negative_stock }
    pub fn status(&self) -> &ProductStatus { &self.status }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }
    pub fn variations(&self) -> &[ProductVariation] { &self.variations }
    pub fn tiers(&self) -> &PriceTierSet { &self.tiers }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_in_stock(&self) -> bool { self.allow_negative_stock || self.stock.available() > 0 }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.status = ProductStatus::Active;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id }));
        Ok(())
    }

    pub fn archive(&mut self) { self.status = ProductStatus::Archived; self.touch(); }

    pub fn set_image(&mut self, url: Option<String>) { self.image_url = url; self.touch(); }

    pub fn allow_negative_stock(&mut self, allow: bool) { self.allow_negative_stock = allow; self.touch(); }

    pub fn add_variation(&mut self, variation: ProductVariation) { self.variations.push(variation); self.touch(); }

    /// Replaces the tier list; tier 1 follows the retail price.
    pub fn replace_tiers(&mut self, tiers: PriceTierSet) -> Result<(), ProductError> {
        if tiers.retail().price != self.retail_price.amount() {
            return Err(ProductError::RetailTierMismatch);
        }
        self.wholesale_price = tiers.tiers().get(1).map(|t| self.retail_price.with_amount(t.price));
        self.tiers = tiers;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::PriceTiersChanged { product_id: self.id, tier_count: self.tiers.tiers().len() }));
        Ok(())
    }

    pub fn apply_price_model(&mut self, model: &PriceModel) -> Result<(), ProductError> {
        let tiers = model.generate(self.retail_price.amount())?;
        self.replace_tiers(tiers)
    }

    pub fn set_tier_enabled(&mut self, tier_order: u32, enabled: bool) -> Result<(), ProductError> {
        self.tiers.set_enabled(tier_order, enabled)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::PriceTiersChanged { product_id: self.id, tier_count: self.tiers.tiers().len() }));
        Ok(())
    }

    pub fn unit_price(&self, quantity: u32) -> Money { self.retail_price.with_amount(self.tiers.unit_price(quantity)) }

    pub fn variation_unit_price(&self, variation_id: VariationId, quantity: u32) -> Result<Money, ProductError> {
        let variation = self.variation(variation_id)?;
        Ok(self.retail_price.with_amount(self.tiers.unit_price(quantity) + variation.price_adjustment))
    }

    pub fn line_total(&self, quantity: u32) -> Money { self.unit_price(quantity).multiply(quantity) }

    /// Prices `quantity` units. Without wholesale access only the retail tier applies.
    pub fn quote(&self, quantity: u32, variation_id: Option<VariationId>, wholesale: bool) -> Result<PriceQuote, ProductError> {
        if quantity == 0 { return Err(ProductError::InvalidQuantity); }
        let tier = if wholesale { self.tiers.resolve(quantity) } else { self.tiers.retail() };
        let adjustment = match variation_id {
            Some(id) => self.variation(id)?.price_adjustment,
            None => Decimal::ZERO,
        };
        let unit_price = self.retail_price.with_amount(tier.price + adjustment);
        Ok(PriceQuote {
            quantity,
            tier_order: tier.tier_order,
            total: unit_price.multiply(quantity),
            unit_price,
            next_break: if wholesale { self.tiers.next_break(quantity).cloned() } else { None },
        })
    }

    pub fn reserve(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock.reserve(qty, self.allow_negative_stock)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReserved { product_id: self.id, quantity: qty }));
        Ok(())
    }

    pub fn release(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock.release(qty)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReleased { product_id: self.id, quantity: qty }));
        Ok(())
    }

    pub fn commit(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock.commit(qty)?;
        self.touch();
        Ok(())
    }

    pub fn add_inventory(&mut self, qty: u32) {
        self.stock.restock(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::InventoryAdded { product_id: self.id, quantity: qty }));
    }

    pub fn reserve_variation(&mut self, variation_id: VariationId, qty: u32) -> Result<(), ProductError> {
        let allow_negative = self.allow_negative_stock;
        let variation = self.variations.iter_mut().find(|v| v.id == variation_id).ok_or(ProductError::VariationNotFound)?;
        variation.stock.reserve(qty, allow_negative)?;
        self.touch();
        Ok(())
    }

    pub fn variation(&self, variation_id: VariationId) -> Result<&ProductVariation, ProductError> {
        self.variations.iter().find(|v| v.id == variation_id).ok_or(ProductError::VariationNotFound)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub quantity: u32,
    pub tier_order: u32,
    pub unit_price: Money,
    pub total: Money,
    /// Next cheaper tier the buyer could reach.
    pub next_break: Option<PriceTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Invalid quantity")]
    InvalidQuantity,
    #[error("Variation not found")]
    VariationNotFound,
    #[error("Retail tier must match the retail price")]
    RetailTierMismatch,
    #[error(transparent)]
    Stock(#[from] StockError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product::create(StoreId::new(), Sku::new("TEST").unwrap(), "P", Money::usd(Decimal::new(100, 0)))
    }

    #[test]
    fn test_product_create() {
        let mut p = product();
        assert_eq!(p.name(), "P");
        assert_eq!(p.unit_price(40).amount(), Decimal::new(100, 0));
        assert!(matches!(p.take_events().as_slice(), [DomainEvent::Product(ProductEvent::Created { .. })]));
    }

    #[test]
    fn test_reservations_keep_available_non_negative() {
        let mut p = product();
        p.add_inventory(5);
        p.reserve(3).unwrap();
        assert_eq!(p.stock().available(), 2);
        assert_eq!(p.reserve(3), Err(ProductError::Stock(StockError::Insufficient { available: 2, requested: 3 })));
        p.commit(3).unwrap();
        assert_eq!(p.stock(), StockLevel::new(2, 0));
        assert!(p.release(1).is_err());
    }

    #[test]
    fn test_negative_stock_allowed() {
        let mut p = product();
        p.allow_negative_stock(true);
        p.reserve(4).unwrap();
        assert_eq!(p.stock().available(), -4);
        assert!(p.is_in_stock());
    }

    #[test]
    fn test_price_model_and_tiers() {
        let mut p = product();
        p.apply_price_model(&PriceModel::Wholesale { min_quantity: 10, price: Decimal::new(85, 0) }).unwrap();
        assert_eq!(p.unit_price(12).amount(), Decimal::new(85, 0));
        assert_eq!(p.line_total(12).amount(), Decimal::new(1020, 0));
        assert_eq!(p.wholesale_price().map(Money::amount), Some(Decimal::new(85, 0)));

        let wrong_retail = PriceTierSet::retail_only(Decimal::new(90, 0));
        assert_eq!(p.replace_tiers(wrong_retail), Err(ProductError::RetailTierMismatch));

        let tiers = PriceTierSet::new(vec![
            PriceTier::retail(Decimal::new(100, 0)),
            PriceTier { tier_order: 2, min_quantity: 5, price: Decimal::new(90, 0), is_enabled: false, label: None },
        ]).unwrap();
        p.replace_tiers(tiers).unwrap();
        assert_eq!(p.unit_price(12).amount(), Decimal::new(100, 0));
    }

    #[test]
    fn test_variation_price_and_stock() {
        let mut p = product();
        let id = VariationId::new();
        p.add_variation(ProductVariation {
            id,
            attributes: BTreeMap::from([("color".to_string(), "red".to_string())]),
            stock: StockLevel::new(2, 0),
            price_adjustment: Decimal::new(5, 0),
        });
        assert_eq!(p.variation_unit_price(id, 1).unwrap().amount(), Decimal::new(105, 0));
        p.reserve_variation(id, 2).unwrap();
        assert!(p.reserve_variation(id, 1).is_err());
        assert_eq!(p.variation_unit_price(VariationId::new(), 1), Err(ProductError::VariationNotFound));
    }

    #[test]
    fn test_quote() {
        let mut p = product();
        p.apply_price_model(&PriceModel::Gradual {
            steps: vec![
                crate::domain::aggregates::pricing::GradualStep { min_quantity: 10, discount_percent: Decimal::new(15, 0) },
                crate::domain::aggregates::pricing::GradualStep { min_quantity: 50, discount_percent: Decimal::new(30, 0) },
            ],
        }).unwrap();
        let quote = p.quote(12, None, true).unwrap();
        assert_eq!(quote.tier_order, 2);
        assert_eq!(quote.unit_price.amount(), Decimal::new(85, 0));
        assert_eq!(quote.total.amount(), Decimal::new(1020, 0));
        assert_eq!(quote.next_break.map(|t| t.min_quantity), Some(50));

        let retail_only = p.quote(12, None, false).unwrap();
        assert_eq!(retail_only.unit_price.amount(), Decimal::new(100, 0));
        assert!(retail_only.next_break.is_none());
        assert_eq!(p.quote(0, None, true), Err(ProductError::InvalidQuantity));

        p.set_tier_enabled(2, false).unwrap();
        assert_eq!(p.quote(12, None, true).unwrap().tier_order, 1);
        assert_eq!(p.set_tier_enabled(1, false), Err(ProductError::Pricing(PricingError::RetailDisabled)));
    }

    #[test]
    fn test_store_groups_override_master() {
        let store = StoreId::new();
        let master = vec![
            VariationGroup { key: "color".into(), label: "Color".into(), values: vec!["red".into()], store_id: None },
            VariationGroup { key: "size".into(), label: "Size".into(), values: vec!["M".into()], store_id: None },
        ];
        let own = vec![VariationGroup { key: "color".into(), label: "Cor".into(), values: vec!["azul".into()], store_id: Some(store) }];
        let resolved = resolve_variation_groups(&own, &master);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].label, "Cor");
        assert_eq!(resolved[1].key, "size");
    }
}
