//! Store (tenant) aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::StoreId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub whatsapp_number: Option<String>,
    pub cash_on_delivery_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn create(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: StoreId::new(), slug: slugify(&name), name, is_active: true,
            whatsapp_number: None, cash_on_delivery_enabled: false, created_at: now, updated_at: now,
        }
    }

    pub fn has_whatsapp(&self) -> bool { self.whatsapp_number.as_deref().is_some_and(|n| !n.trim().is_empty()) }

    pub fn apply(&mut self, update: StoreSettingsUpdate) {
        if let Some(name) = update.name { self.name = name; }
        if let Some(number) = update.whatsapp_number {
            let number = number.trim().to_string();
            self.whatsapp_number = if number.is_empty() { None } else { Some(number) };
        }
        if let Some(cod) = update.cash_on_delivery_enabled { self.cash_on_delivery_enabled = cod; }
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Clone, Debug, Default, Deserialize, validator::Validate)]
pub struct StoreSettingsUpdate {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    /// Empty string clears the number.
    #[validate(length(max = 32))]
    pub whatsapp_number: Option<String>,
    pub cash_on_delivery_enabled: Option<bool>,
}

pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slugify("Loja da Ana  & Filhos!"), "loja-da-ana-filhos");
        assert_eq!(Store::create("Acme Shop").slug, "acme-shop");
    }

    #[test]
    fn test_settings_update() {
        let mut store = Store::create("Acme");
        store.apply(StoreSettingsUpdate { whatsapp_number: Some(" +5511999 ".into()), ..Default::default() });
        assert!(store.has_whatsapp());
        assert_eq!(store.whatsapp_number.as_deref(), Some("+5511999"));
        store.apply(StoreSettingsUpdate { whatsapp_number: Some(String::new()), cash_on_delivery_enabled: Some(true), ..Default::default() });
        assert!(!store.has_whatsapp());
        assert!(store.cash_on_delivery_enabled);
    }
}
