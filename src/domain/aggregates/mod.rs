//! Aggregates module
pub mod banner;
pub mod checkout;
pub mod order;
pub mod plan;
pub mod pricing;
pub mod product;
pub mod store;
pub mod usage;

pub use banner::{Banner, BannerSource, ResolvedBanner};
pub use checkout::{CheckoutOption, CheckoutOptions, PaymentGatewayControl};
pub use order::{LineItem, Order, OrderError, OrderStatus, Payment, PaymentState, PaymentStatus, PaymentSummary};
pub use plan::{Access, BenefitKey, DenialReason, PlanBenefit, PlanPermissions, Role, Subscription, SubscriptionPlan, SubscriptionStatus};
pub use pricing::{GradualStep, PriceModel, PriceTier, PriceTierSet, PricingError};
pub use product::{PriceQuote, Product, ProductError, ProductSnapshot, ProductStatus, ProductVariation, StockError, StockLevel, VariationGroup};
pub use store::{Store, StoreSettingsUpdate};
pub use usage::{FeatureType, FeatureUsage, UsageDecision, UsagePeriod, UsageStatus, UsageWindow};
