//! Per-site extraction: selector-driven generic adapter plus dispatch to
//! specialized adapters.
//!
//! Adapter selection is a tagged union over the site config's `adapter`
//! field, resolved at construction — one fixed interface, many
//! implementations, no inheritance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use scraper::{ElementRef, Html};
use shelfwatch_core::{AdapterKind, Product, SiteConfig, Variant};

use crate::client::PageClient;
use crate::currency::{parse_price_text, CurrencyTable};
use crate::error::ScrapeError;
use crate::identity::generate_id;
use crate::image::best_image;
use crate::select::{extract_link, SelectorChain};
use crate::tealight;
use crate::variants::{reconcile, RawVariant};

/// The site's selector chains, compiled once at adapter construction.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub product: SelectorChain,
    pub name: SelectorChain,
    pub price: SelectorChain,
    pub stock: SelectorChain,
    pub link: SelectorChain,
    pub image: SelectorChain,
}

impl CompiledSelectors {
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidSelector`] naming the first selector
    /// that fails to parse.
    pub fn compile(site: &SiteConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            product: SelectorChain::compile(&site.key, &site.selectors.product)?,
            name: SelectorChain::compile(&site.key, &site.selectors.name)?,
            price: SelectorChain::compile(&site.key, &site.selectors.price)?,
            stock: SelectorChain::compile(&site.key, &site.selectors.stock)?,
            link: SelectorChain::compile(&site.key, &site.selectors.link)?,
            image: SelectorChain::compile(&site.key, &site.selectors.image)?,
        })
    }
}

/// Extraction logic for one configured storefront.
#[derive(Debug)]
pub struct SiteAdapter {
    pub(crate) site: SiteConfig,
    pub(crate) selectors: CompiledSelectors,
    pub(crate) currency: Arc<CurrencyTable>,
}

impl SiteAdapter {
    /// Compiles the site's selector chains and binds the currency table.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidSelector`] if any configured selector
    /// fails to parse.
    pub fn new(site: SiteConfig, currency: Arc<CurrencyTable>) -> Result<Self, ScrapeError> {
        let selectors = CompiledSelectors::compile(&site)?;
        Ok(Self {
            site,
            selectors,
            currency,
        })
    }

    #[must_use]
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Runs the full extraction for this site: fetches the listing page and
    /// dispatches to the generic or specialized implementation.
    ///
    /// `inter_request_delay_ms` only matters for adapters that visit
    /// individual product pages.
    ///
    /// # Errors
    ///
    /// Fetch-level failures propagate; they are site-level conditions the
    /// orchestrator records. Product-level failures are absorbed here.
    pub async fn extract(
        &self,
        client: &PageClient,
        inter_request_delay_ms: u64,
    ) -> Result<Vec<Product>, ScrapeError> {
        let html = client.fetch_text(&self.site.listing_url).await?;
        match self.site.adapter {
            AdapterKind::Generic => Ok(self.extract_listing(&html, Utc::now())),
            AdapterKind::Tealight => {
                tealight::extract(self, client, &html, inter_request_delay_ms).await
            }
        }
    }

    /// Generic selector-driven extraction over one listing document.
    ///
    /// Containers whose name or link cannot be extracted are skipped and
    /// logged — a product with no identity cannot be stored — without
    /// affecting sibling containers. The timestamp is injected so that a
    /// fixed document yields a reproducible result in tests.
    #[must_use]
    pub fn extract_listing(&self, html: &str, now: DateTime<Utc>) -> Vec<Product> {
        let document = Html::parse_document(html);
        let containers = self.selectors.product.select_all(document.root_element());

        let mut products = Vec::with_capacity(containers.len());
        let mut skipped = 0usize;

        for container in containers {
            match self.extract_container(container, now) {
                Some(product) => products.push(product),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(
                site = %self.site.key,
                skipped,
                extracted = products.len(),
                "containers skipped — no usable name or link"
            );
        }

        products
    }

    fn extract_container(
        &self,
        container: ElementRef<'_>,
        now: DateTime<Utc>,
    ) -> Option<Product> {
        let name = self.selectors.name.first_text(container)?;
        let url = extract_link(container, &self.selectors.link, &self.site.base_url)?;

        let price_text = self.selectors.price.first_text(container);
        let base_price = price_text.as_deref().and_then(parse_price_text).unwrap_or_else(|| {
            tracing::debug!(site = %self.site.key, name = %name, "no parseable container price");
            Decimal::ZERO
        });

        let stock_text = self.selectors.stock.first_text(container);
        let available = stock_indicates_available(stock_text.as_deref(), &self.site);

        let raw_variants = reconcile(container, &self.site, base_price, available);
        let image_url = best_image(container, &self.selectors.image, &self.site.base_url);

        self.assemble_product(&name, &url, base_price, raw_variants, image_url, now)
    }

    /// Converts source-currency parts into a canonical [`Product`].
    ///
    /// Shared by the generic path and specialized adapters. Returns `None`
    /// (logged) on a currency-table mismatch, which cannot happen for a
    /// validated site registry.
    pub(crate) fn assemble_product(
        &self,
        name: &str,
        url: &str,
        base_price: Decimal,
        raw_variants: Vec<RawVariant>,
        image_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Product> {
        let price = self.normalize_price(base_price)?;
        let variants = raw_variants
            .into_iter()
            .map(|raw| {
                Some(Variant {
                    label: raw.label,
                    price: self.normalize_price(raw.price)?,
                    available: raw.available,
                    source_id: raw.source_id,
                    sku: raw.sku,
                })
            })
            .collect::<Option<Vec<_>>>()?;

        let in_stock = variants.iter().any(|v| v.available);
        let id = generate_id(&self.site.key, name, url);

        Some(Product {
            site_key: self.site.key.clone(),
            id,
            name: name.to_owned(),
            url: url.to_owned(),
            category: self.site.category.clone(),
            price,
            in_stock,
            image_url,
            variants,
            last_seen: now,
        })
    }

    fn normalize_price(&self, amount: Decimal) -> Option<Decimal> {
        match self.currency.normalize(amount, &self.site.currency) {
            Ok(price) => Some(price),
            Err(e) => {
                tracing::warn!(site = %self.site.key, error = %e, "price normalization failed");
                None
            }
        }
    }
}

/// Interprets a stock text against the site's keyword lists.
///
/// Out-of-stock keywords take precedence; absent or unrecognized text
/// defaults to available (sites that hide stock state entirely are treated
/// as sellable until proven otherwise).
#[must_use]
pub fn stock_indicates_available(stock_text: Option<&str>, site: &SiteConfig) -> bool {
    let Some(text) = stock_text else {
        return true;
    };
    let lower = text.to_lowercase();

    if site
        .out_of_stock_keywords
        .iter()
        .any(|k| lower.contains(&k.to_lowercase()))
    {
        return false;
    }

    if site
        .in_stock_keywords
        .iter()
        .any(|k| lower.contains(&k.to_lowercase()))
    {
        return true;
    }

    // Anything not explicitly marked out of stock counts as available.
    true
}

#[cfg(test)]
#[path = "adapter_test.rs"]
mod tests;
