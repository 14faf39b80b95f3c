//! Tenant Storefront Rules
//!
//! Decision core of a multi-tenant storefront, every query scoped by store.
//!
//! ## Features
//! - Plan permission resolution (fail-closed benefit lookup)
//! - Metered feature usage with atomic, per-period counters
//! - Tiered / gradual wholesale pricing
//! - Derived order payment status
//! - Stock reservations, payment gateway and checkout option gating

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod messaging;
pub mod services;

use crate::domain::aggregates::{BenefitKey, DenialReason, FeatureType, OrderError, PricingError, ProductError};
use crate::domain::value_objects::LimitValue;

// =============================================================================
// Error Types
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Store not found")]
    StoreNotFound,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Payment gateway not found")]
    GatewayNotFound,

    #[error("{benefit} is not available on the current plan ({reason:?})")]
    FeatureNotAvailable { benefit: BenefitKey, reason: DenialReason },

    #[error("Usage limit reached for {feature}: {used} of {limit} used")]
    UsageLimitReached { feature: FeatureType, used: u64, limit: LimitValue },

    #[error("Payment gateway limit reached")]
    GatewayLimitReached,

    #[error("Insufficient stock")]
    InsufficientStock,

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
