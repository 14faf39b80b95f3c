//! Domain events
use crate::domain::aggregates::order::PaymentStatus;
use crate::domain::aggregates::usage::FeatureType;
use crate::domain::value_objects::{LimitValue, OrderId, PaymentId, ProductId, Sku, StoreId};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Usage(UsageEvent),
}

impl DomainEvent {
    /// NATS subject suffix, e.g. `order.payment_status_changed`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(e) => ("product", e.name()),
            Self::Order(e) => ("order", e.name()),
            Self::Usage(e) => ("usage", e.name()),
        };
        format!("{aggregate}.{name}")
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: ProductId, store_id: StoreId, sku: Sku },
    Published { product_id: ProductId },
    InventoryAdded { product_id: ProductId, quantity: u32 },
    StockReserved { product_id: ProductId, quantity: u32 },
    StockReleased { product_id: ProductId, quantity: u32 },
    PriceTiersChanged { product_id: ProductId, tier_count: usize },
}

impl ProductEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Published { .. } => "published",
            Self::InventoryAdded { .. } => "inventory_added",
            Self::StockReserved { .. } => "stock_reserved",
            Self::StockReleased { .. } => "stock_released",
            Self::PriceTiersChanged { .. } => "price_tiers_changed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Confirmed { order_id: OrderId, total: Decimal },
    Cancelled { order_id: OrderId },
    PaymentRecorded { order_id: OrderId, payment_id: PaymentId, amount: Decimal },
    PaymentStatusChanged { order_id: OrderId, from: PaymentStatus, to: PaymentStatus },
}

impl OrderEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::Cancelled { .. } => "cancelled",
            Self::PaymentRecorded { .. } => "payment_recorded",
            Self::PaymentStatusChanged { .. } => "payment_status_changed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UsageEvent {
    Recorded { store_id: StoreId, feature: FeatureType, used: u64 },
    LimitReached { store_id: StoreId, feature: FeatureType, used: u64, limit: LimitValue },
}

impl UsageEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Recorded { .. } => "recorded",
            Self::LimitReached { .. } => "limit_reached",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_and_payload() {
        let event = DomainEvent::Order(OrderEvent::PaymentStatusChanged {
            order_id: OrderId::new(),
            from: PaymentStatus::Pending,
            to: PaymentStatus::Partial,
        });
        assert_eq!(event.subject(), "order.payment_status_changed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["aggregate"], "order");
        assert_eq!(json["event"]["type"], "payment_status_changed");
        assert_eq!(json["event"]["to"], "partial");
    }
}
