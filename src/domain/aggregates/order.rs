//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, OrderId, PaymentId, ProductId, StoreId};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "confirmed" => Self::Confirmed,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "cancelled" | "canceled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            _ => Self::Pending,
        }
    }
}

/// State of a single payment attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState { #[default] Pending, Confirmed, Rejected, Refunded }

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "confirmed" => Self::Confirmed,
            "rejected" => Self::Rejected,
            "refunded" => Self::Refunded,
            _ => Self::Pending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub method: String,
    pub status: PaymentState,
    pub created_at: DateTime<Utc>,
}

/// Payment status shown for an order; always derived from the payments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { Pending, Partial, Paid, Cancelled }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub status: PaymentStatus,
    pub order_total: Decimal,
    pub confirmed_total: Decimal,
    pub remaining: Decimal,
}

impl PaymentSummary {
    /// Pure function of the order total, its status and the payments.
    pub fn derive(order_total: Decimal, order_status: &OrderStatus, payments: &[Payment]) -> Self {
        let confirmed_total: Decimal = payments
            .iter()
            .filter(|p| p.status == PaymentState::Confirmed)
            .map(|p| p.amount)
            .sum();
        let status = if *order_status == OrderStatus::Cancelled {
            PaymentStatus::Cancelled
        } else if confirmed_total.is_zero() {
            PaymentStatus::Pending
        } else if confirmed_total >= order_total {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
        Self { status, order_total, confirmed_total, remaining: (order_total - confirmed_total).max(Decimal::ZERO) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Debug)]
pub struct Order {
    id: OrderId,
    store_id: StoreId,
    order_number: String,
    status: OrderStatus,
    items: Vec<LineItem>,
    total: Money,
    payments: Vec<Payment>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl Order {
    pub fn create(store_id: StoreId, order_number: impl Into<String>, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(), store_id, order_number: order_number.into(), status: OrderStatus::Pending,
            items: vec![], total: Money::zero(currency), payments: vec![], created_at: now, updated_at: now, events: vec![],
        }
    }

    /// Rebuilds an order loaded from storage; line items are not loaded.
    pub fn restore(id: OrderId, store_id: StoreId, order_number: String, status: OrderStatus, total: Money, payments: Vec<Payment>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, store_id, order_number, status, items: vec![], total, payments, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn store_id(&self) -> StoreId { self.store_id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn status(&self) -> &OrderStatus { &self.status }
    pub fn total(&self) -> &Money { &self.total }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn payments(&self) -> &[Payment] { &self.payments }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn payment_summary(&self) -> PaymentSummary {
        PaymentSummary::derive(self.total.amount(), &self.status, &self.payments)
    }

    pub fn add_item(&mut self, item: LineItem) -> Result<(), OrderError> {
        if item.quantity == 0 { return Err(OrderError::InvalidQuantity); }
        self.total = self.total.add(&item.total()).map_err(|_| OrderError::CurrencyMismatch)?;
        self.items.push(item);
        self.touch();
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if self.items.is_empty() { return Err(OrderError::NoItems); }
        self.status = OrderStatus::Confirmed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Confirmed { order_id: self.id, total: self.total.amount() }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Delivered { return Err(OrderError::CannotCancel); }
        self.apply_status_change(|order| order.status = OrderStatus::Cancelled);
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
        Ok(())
    }

    pub fn record_payment(&mut self, amount: Decimal, method: impl Into<String>, status: PaymentState) -> Result<PaymentId, OrderError> {
        if self.status == OrderStatus::Cancelled { return Err(OrderError::Cancelled); }
        if amount <= Decimal::ZERO || !Money::is_storable(amount) { return Err(OrderError::InvalidAmount); }
        let payment = Payment { id: PaymentId::new(), order_id: self.id, amount, method: method.into(), status, created_at: Utc::now() };
        let id = payment.id;
        self.apply_status_change(|order| order.payments.push(payment));
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentRecorded { order_id: self.id, payment_id: id, amount }));
        Ok(id)
    }

    pub fn update_payment(&mut self, payment_id: PaymentId, status: PaymentState) -> Result<(), OrderError> {
        let index = self.payments.iter().position(|p| p.id == payment_id).ok_or(OrderError::PaymentNotFound)?;
        self.apply_status_change(|order| {
            if let Some(payment) = order.payments.get_mut(index) { payment.status = status; }
        });
        Ok(())
    }

    /// Runs a mutation and re-derives the payment status, emitting an event when it moved.
    fn apply_status_change(&mut self, change: impl FnOnce(&mut Self)) {
        let before = self.payment_summary().status;
        change(self);
        self.touch();
        let after = self.payment_summary().status;
        if before != after {
            self.raise_event(DomainEvent::Order(OrderEvent::PaymentStatusChanged { order_id: self.id, from: before, to: after }));
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("No items")]
    NoItems,
    #[error("Cannot cancel")]
    CannotCancel,
    #[error("Order is cancelled")]
    Cancelled,
    #[error("Invalid quantity")]
    InvalidQuantity,
    #[error("Payment amount must be positive with at most 2 decimal places")]
    InvalidAmount,
    #[error("Payment not found")]
    PaymentNotFound,
    #[error("Currency mismatch")]
    CurrencyMismatch,
}
