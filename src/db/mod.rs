//! Database operations for the storefront `PostgreSQL` schema.
//!
//! Every query is scoped by `store_id`. Migrations live in `migrations/` and
//! run at startup.

pub mod banners;
pub mod orders;
pub mod plans;
pub mod products;
pub mod stores;
pub mod usage;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::{Error, Result};

pub use usage::PgUsageRepository;

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &AppConfig) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
}

pub(crate) fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::InvalidData(format!("{field} is negative: {value}")))
}

pub(crate) fn to_u32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidData(format!("{field} is negative: {value}")))
}

pub(crate) fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidQuantity)
}

pub(crate) fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::InvalidQuantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(to_u64(5, "used").unwrap(), 5);
        assert!(matches!(to_u64(-1, "used"), Err(Error::InvalidData(_))));
        assert!(matches!(to_i32(u32::MAX), Err(Error::InvalidQuantity)));
        assert_eq!(to_u32(7, "min_quantity").unwrap(), 7);
        assert_eq!(to_i64(9).unwrap(), 9);
    }
}
