//! Services coordinating domain rules with storage.
pub mod metering;

pub use metering::{InMemoryUsageRepository, IncrementOutcome, UsageMeter, UsageRepository};
