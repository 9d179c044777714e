//! Local state for pricedrop.
//!
//! Tracked products and the API base URL live in an injected key-value
//! store; this module holds the domain types and the typed facade over it.

mod product;
mod store;

pub(crate) use product::opaque_id;
pub use product::{AlertKind, LastAlert, TrackedProduct, domain_from_url, validate_condition};
pub use store::{
    API_URL_KEY, FileStore, KeyValueStore, MemoryStore, SettingsStore, TRACKED_PRODUCTS_KEY,
};

use rust_decimal::Decimal;

/// Snapshot of the persisted settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// Base URL of the remote price-tracking API.
    pub api_base_url: String,
    /// Tracked products in tracking order.
    pub tracked_products: Vec<TrackedProduct>,
}

impl Settings {
    /// Look up a tracked product by id.
    pub fn product(&self, product_id: &str) -> Option<&TrackedProduct> {
        self.tracked_products.iter().find(|p| p.id == product_id)
    }
}

/// Outcome of one successful remote status check.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub product_id: String,
    /// Price fetched after an update, `None` when nothing changed.
    pub current_price: Option<Decimal>,
    /// Whether the forced check reported a change.
    pub updated: bool,
}

impl PollResult {
    /// A check that reported no update.
    pub fn unchanged(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            current_price: None,
            updated: false,
        }
    }

    /// A check that reported an update, with the refreshed price.
    pub fn updated(product_id: impl Into<String>, current_price: Option<Decimal>) -> Self {
        Self {
            product_id: product_id.into(),
            current_price,
            updated: true,
        }
    }
}
