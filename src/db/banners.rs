//! Banner queries.

use sqlx::PgPool;

use crate::domain::aggregates::{Banner, BannerSource};
use crate::domain::value_objects::{BannerId, ProductId, StoreId};
use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct BannerRow {
    id: BannerId,
    store_id: StoreId,
    source_type: String,
    image_url: Option<String>,
    product_id: Option<ProductId>,
    title: Option<String>,
    link_url: Option<String>,
    position: i32,
    is_active: bool,
}

impl TryFrom<BannerRow> for Banner {
    type Error = Error;

    fn try_from(row: BannerRow) -> Result<Self> {
        let source = match (row.source_type.as_str(), row.image_url, row.product_id) {
            ("upload", Some(image_url), _) => BannerSource::Upload { image_url },
            ("product", _, Some(product_id)) => BannerSource::Product { product_id },
            (kind, _, _) => return Err(Error::InvalidData(format!("banner {} has an incomplete {kind} source", row.id))),
        };
        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            title: row.title,
            link_url: row.link_url,
            position: row.position,
            is_active: row.is_active,
            source,
        })
    }
}

/// Active banners in display order. Rows whose source is gone are skipped.
pub async fn list_active(pool: &PgPool, store_id: StoreId) -> Result<Vec<Banner>> {
    let rows = sqlx::query_as::<_, BannerRow>(
        r#"
        SELECT id, store_id, source_type, image_url, product_id, title, link_url, position, is_active
        FROM banners WHERE store_id = $1 AND is_active ORDER BY position, created_at
        "#,
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| match Banner::try_from(row) {
            Ok(banner) => Some(banner),
            Err(error) => {
                tracing::warn!(%store_id, %error, "skipping banner");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source_type: &str, image_url: Option<&str>, product_id: Option<ProductId>) -> BannerRow {
        BannerRow {
            id: BannerId::new(),
            store_id: StoreId::new(),
            source_type: source_type.into(),
            image_url: image_url.map(Into::into),
            product_id,
            title: None,
            link_url: None,
            position: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_source_discriminator() {
        assert!(matches!(Banner::try_from(row("upload", Some("https://cdn/a.png"), None)).unwrap().source, BannerSource::Upload { .. }));
        let product = ProductId::new();
        assert_eq!(Banner::try_from(row("product", None, Some(product))).unwrap().product_id(), Some(product));
        assert!(Banner::try_from(row("product", None, None)).is_err());
        assert!(Banner::try_from(row("video", Some("x"), None)).is_err());
    }
}
