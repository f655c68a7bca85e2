//! Specialized adapter for storefronts whose listing pages expose only
//! product links.
//!
//! The listing is used purely for link discovery; each product page is
//! visited individually (with an inter-request delay to stay under the
//! upstream rate limit) and its embedded JSON payload provides the
//! authoritative variant and price data. Product pages that expose no
//! variant structure at all fall back to the site's declared packaging
//! catalog — a stated business rule for these vendors, not inference.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use scraper::Html;
use shelfwatch_core::Product;

use crate::adapter::{stock_indicates_available, SiteAdapter};
use crate::client::PageClient;
use crate::error::ScrapeError;
use crate::image::best_image;
use crate::select::extract_link;
use crate::variants::{catalog_variants, embedded_json_variants, RawVariant};

/// Extracts all products for a link-only listing site.
///
/// Per-product failures (page fetch errors, unusable markup) are logged and
/// skipped; only listing-level conditions propagate to the orchestrator.
///
/// # Errors
///
/// Currently none beyond what the caller already handled to obtain
/// `listing_html`; the signature leaves room for listing-level failures.
pub(crate) async fn extract(
    adapter: &SiteAdapter,
    client: &PageClient,
    listing_html: &str,
    inter_request_delay_ms: u64,
) -> Result<Vec<Product>, ScrapeError> {
    let links = collect_product_links(adapter, listing_html);
    if links.is_empty() {
        tracing::warn!(site = %adapter.site.key, "listing page yielded no product links");
        return Ok(Vec::new());
    }

    let mut products = Vec::with_capacity(links.len());

    for (idx, link) in links.iter().enumerate() {
        // Local blocking wait within this site's task; sibling sites keep
        // running.
        if idx > 0 && inter_request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(inter_request_delay_ms)).await;
        }

        let page = match client.fetch_text(link).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(site = %adapter.site.key, url = %link, error = %e, "skipping product — page fetch failed");
                continue;
            }
        };

        match extract_product_page(adapter, link, &page, Utc::now()) {
            Some(product) => products.push(product),
            None => {
                tracing::warn!(site = %adapter.site.key, url = %link, "skipping product — no usable name");
            }
        }
    }

    Ok(products)
}

/// Collects unique absolute product-page URLs from the listing document.
///
/// Uses the product containers when the container chain matches; otherwise
/// runs the link chain over the whole document.
fn collect_product_links(adapter: &SiteAdapter, listing_html: &str) -> Vec<String> {
    let document = Html::parse_document(listing_html);
    let root = document.root_element();

    let mut seen: HashSet<String> = HashSet::new();
    let mut links: Vec<String> = Vec::new();
    let mut push = |url: String| {
        if seen.insert(url.clone()) {
            links.push(url);
        }
    };

    let containers = adapter.selectors.product.select_all(root);
    if containers.is_empty() {
        for el in adapter.selectors.link.iter_elements(root) {
            if let Some(href) = el.value().attr("href") {
                if let Some(url) = crate::select::absolutize(&adapter.site.base_url, href) {
                    push(url);
                }
            }
        }
    } else {
        for container in containers {
            if let Some(url) = extract_link(container, &adapter.selectors.link, &adapter.site.base_url)
            {
                push(url);
            }
        }
    }

    links
}

/// Builds one product from its own page.
///
/// Embedded JSON variants are authoritative; the declared catalog covers
/// pages with no variant structure; a page with neither yields a single
/// implicit default variant at the page price.
fn extract_product_page(
    adapter: &SiteAdapter,
    url: &str,
    page_html: &str,
    now: DateTime<Utc>,
) -> Option<Product> {
    let document = Html::parse_document(page_html);
    let root = document.root_element();

    let name = adapter.selectors.name.first_text(root)?;

    let price_text = adapter.selectors.price.first_text(root);
    let mut base_price = price_text
        .as_deref()
        .and_then(crate::currency::parse_price_text)
        .unwrap_or(Decimal::ZERO);

    let stock_text = adapter.selectors.stock.first_text(root);
    let available = stock_indicates_available(stock_text.as_deref(), &adapter.site);

    let raw_variants = embedded_json_variants(root, &adapter.site).unwrap_or_else(|| {
        let catalog = catalog_variants(&adapter.site, base_price, available);
        if catalog.is_empty() {
            vec![RawVariant {
                label: "default".to_string(),
                price: base_price,
                available,
                source_id: None,
                sku: None,
            }]
        } else {
            catalog
        }
    });

    // Pages driven purely by embedded JSON often render the price via
    // scripts; fall back to the cheapest variant as the product price.
    if base_price == Decimal::ZERO {
        if let Some(min) = raw_variants.iter().map(|v| v.price).min() {
            base_price = min;
        }
    }

    let image_url = best_image(root, &adapter.selectors.image, &adapter.site.base_url);

    adapter.assemble_product(&name, url, base_price, raw_variants, image_url, now)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use rust_decimal_macros::dec;
    use shelfwatch_core::{AdapterKind, FallbackVariant, SiteConfig, SiteSelectors};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::currency::CurrencyTable;

    use super::*;

    fn tealight_site(base_url: &str) -> SiteConfig {
        SiteConfig {
            key: "tealight".to_string(),
            name: "Tealight".to_string(),
            base_url: base_url.to_string(),
            listing_url: format!("{base_url}/collections/all"),
            currency: "EUR".to_string(),
            category: Some("tea".to_string()),
            selectors: SiteSelectors {
                product: vec![".card".to_string()],
                name: vec!["h1".to_string()],
                price: vec![".price".to_string()],
                stock: vec![],
                link: vec!["a".to_string()],
                image: vec!["img".to_string()],
            },
            in_stock_keywords: vec![],
            out_of_stock_keywords: vec![],
            // This shop's embedded payloads always quote cents; a low
            // threshold makes even sub-10-euro prices scale correctly.
            minor_unit_threshold: 100,
            fallback_variants: vec![
                FallbackVariant {
                    label: "30g Tüte".to_string(),
                    multiplier: dec!(1.0),
                },
                FallbackVariant {
                    label: "100g Dose".to_string(),
                    multiplier: dec!(2.8),
                },
            ],
            adapter: AdapterKind::Tealight,
        }
    }

    fn adapter_for(base_url: &str) -> SiteAdapter {
        let currency = Arc::new(CurrencyTable::new("EUR".to_string(), BTreeMap::new()));
        SiteAdapter::new(tealight_site(base_url), currency).expect("adapter builds")
    }

    fn listing_html() -> &'static str {
        r#"
            <div class="card"><a href="/products/sencha">Sencha</a></div>
            <div class="card"><a href="/products/bancha">Bancha</a></div>
            <div class="card"><a href="/products/sencha">Sencha again</a></div>
        "#
    }

    #[tokio::test]
    async fn visits_each_product_page_and_parses_embedded_variants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/sencha"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<h1>Sencha Superior</h1>
                   <script>{"variants":[
                     {"id":11,"price":990,"available":true,"title":"30g"},
                     {"id":12,"price":2490,"available":false,"title":"100g"}
                   ]}</script>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products/bancha"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<h1>Bancha</h1><span class="price">7,90 €</span>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server.uri());
        let client = PageClient::new(5, "shelfwatch-test/0.1", 0, 0).unwrap();
        let products = extract(&adapter, &client, listing_html(), 0).await.unwrap();

        assert_eq!(products.len(), 2);

        let sencha = &products[0];
        assert_eq!(sencha.name, "Sencha Superior");
        assert_eq!(sencha.variants.len(), 2);
        assert_eq!(sencha.variants[0].price, dec!(9.90));
        assert_eq!(sencha.variants[1].price, dec!(24.90));
        // No DOM price on the page: product price falls back to the
        // cheapest variant.
        assert_eq!(sencha.price, dec!(9.90));
        assert!(sencha.in_stock);

        // Bancha has no embedded variants: the declared catalog applies.
        let bancha = &products[1];
        assert_eq!(bancha.variants.len(), 2);
        assert_eq!(bancha.variants[0].label, "30g Tüte");
        assert_eq!(bancha.variants[0].price, dec!(7.90));
        assert_eq!(bancha.variants[1].label, "100g Dose");
        assert_eq!(bancha.variants[1].price, dec!(22.12));
    }

    #[tokio::test]
    async fn failing_product_page_is_skipped_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/sencha"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products/bancha"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<h1>Bancha</h1><span class="price">7,90 €</span>"#,
            ))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server.uri());
        let client = PageClient::new(5, "shelfwatch-test/0.1", 0, 0).unwrap();
        let products = extract(&adapter, &client, listing_html(), 0).await.unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Bancha");
    }

    #[tokio::test]
    async fn empty_listing_yields_no_products() {
        let server = MockServer::start().await;
        let adapter = adapter_for(&server.uri());
        let client = PageClient::new(5, "shelfwatch-test/0.1", 0, 0).unwrap();
        let products = extract(&adapter, &client, "<html><body></body></html>", 0)
            .await
            .unwrap();
        assert!(products.is_empty());
    }

    #[test]
    fn product_links_are_deduplicated_and_absolute() {
        let adapter = adapter_for("https://tealight.example");
        let links = collect_product_links(&adapter, listing_html());
        assert_eq!(
            links,
            vec![
                "https://tealight.example/products/sencha".to_string(),
                "https://tealight.example/products/bancha".to_string(),
            ]
        );
    }
}
