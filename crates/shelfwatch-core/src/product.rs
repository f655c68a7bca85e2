use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product extracted from one storefront, normalized for storage and
/// diffing across crawl runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub site_key: String,
    /// Stable identifier, a pure function of (site key, URL slug, normalized
    /// name). Re-crawling an unchanged listing yields the same id, so the
    /// downstream store can upsert rather than insert and diff price/stock
    /// transitions on the same logical product.
    pub id: String,
    pub name: String,
    /// Absolute product page URL.
    pub url: String,
    pub category: Option<String>,
    /// Price in the canonical currency, rounded to two decimal places.
    pub price: Decimal,
    pub in_stock: bool,
    /// Resolved image URL; `None` when no acceptable candidate was found.
    pub image_url: Option<String>,
    /// Every product has at least one variant; a product with no declared
    /// variants carries a single implicit default variant.
    pub variants: Vec<Variant>,
    pub last_seen: DateTime<Utc>,
}

impl Product {
    /// Returns `true` if at least one variant is currently purchasable.
    #[must_use]
    pub fn has_available_variants(&self) -> bool {
        self.variants.iter().any(|v| v.available)
    }

    /// Returns the lowest-priced variant, if any.
    #[must_use]
    pub fn cheapest_variant(&self) -> Option<&Variant> {
        self.variants.iter().min_by_key(|v| v.price)
    }
}

/// One purchasable SKU (size/format) of a [`Product`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Display label, e.g. `"50g Dose"` or `"default"`.
    pub label: String,
    /// Price in the canonical currency, rounded to two decimal places.
    pub price: Decimal,
    pub available: bool,
    /// Variant id from the source, when the source exposes one.
    pub source_id: Option<String>,
    pub sku: Option<String>,
}
