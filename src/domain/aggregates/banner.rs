//! Storefront banners

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{BannerId, ProductId, StoreId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum BannerSource {
    Upload { image_url: String },
    Product { product_id: ProductId },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Banner {
    pub id: BannerId,
    pub store_id: StoreId,
    pub title: Option<String>,
    pub link_url: Option<String>,
    pub position: i32,
    pub is_active: bool,
    pub source: BannerSource,
}

/// What the storefront actually shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedBanner {
    pub id: BannerId,
    pub title: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
}

impl Banner {
    pub fn product_id(&self) -> Option<ProductId> {
        match &self.source {
            BannerSource::Product { product_id } => Some(*product_id),
            BannerSource::Upload { .. } => None,
        }
    }

    /// `product` is the product referenced by a product banner, if it still exists.
    pub fn resolve(&self, product: Option<&Product>) -> Option<ResolvedBanner> {
        if !self.is_active { return None; }
        let (title, image_url) = match &self.source {
            BannerSource::Upload { image_url } => (self.title.clone(), image_url.clone()),
            BannerSource::Product { product_id } => {
                let product = product.filter(|p| p.id() == *product_id && p.is_active())?;
                let image = product.image_url()?.to_string();
                (self.title.clone().or_else(|| Some(product.name().to_string())), image)
            }
        };
        Some(ResolvedBanner { id: self.id, title, image_url, link_url: self.link_url.clone(), position: self.position })
    }
}
