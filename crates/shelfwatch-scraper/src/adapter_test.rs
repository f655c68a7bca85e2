use std::collections::BTreeMap;

use rust_decimal_macros::dec;
use shelfwatch_core::{SiteSelectors, SitesFile};

use super::*;

fn test_site() -> SiteConfig {
    SiteConfig {
        key: "alpen-tee".to_string(),
        name: "Alpen Tee".to_string(),
        base_url: "https://alpen-tee.example".to_string(),
        listing_url: "https://alpen-tee.example/collections/matcha".to_string(),
        currency: "EUR".to_string(),
        category: Some("matcha".to_string()),
        selectors: SiteSelectors {
            product: vec![".product".to_string()],
            name: vec![".title".to_string(), "h3".to_string()],
            price: vec![".price".to_string()],
            stock: vec![".stock".to_string()],
            link: vec!["a".to_string()],
            image: vec!["img".to_string()],
        },
        in_stock_keywords: vec!["in den warenkorb".to_string()],
        out_of_stock_keywords: vec!["ausverkauft".to_string(), "sold out".to_string()],
        minor_unit_threshold: 1000,
        fallback_variants: vec![],
        adapter: AdapterKind::Generic,
    }
}

fn eur_currency() -> Arc<CurrencyTable> {
    let mut rates = BTreeMap::new();
    rates.insert("GBP".to_string(), dec!(1.17));
    Arc::new(CurrencyTable::new("EUR".to_string(), rates))
}

fn adapter_for(site: SiteConfig) -> SiteAdapter {
    SiteAdapter::new(site, eur_currency()).expect("adapter builds")
}

fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

const LISTING: &str = r#"
    <html><body>
      <div class="product">
        <h3>Matcha Ceremonial 50g</h3>
        <span class="price">€12,50</span>
        <span class="stock">In den Warenkorb</span>
        <a href="/products/matcha-ceremonial-50g">view</a>
        <img src="/img/matcha.jpg" alt="Matcha Ceremonial">
      </div>
    </body></html>
"#;

#[test]
fn worked_example_from_fallback_chain() {
    // Name chain [".title", "h3"]: .title is absent, h3 wins; price text is
    // locale-formatted; stock text is the add-to-cart label.
    let adapter = adapter_for(test_site());
    let products = adapter.extract_listing(LISTING, fixed_now());

    assert_eq!(products.len(), 1);
    let p = &products[0];
    assert_eq!(p.name, "Matcha Ceremonial 50g");
    assert_eq!(p.price, dec!(12.50));
    assert!(p.in_stock);
    assert_eq!(
        p.url,
        "https://alpen-tee.example/products/matcha-ceremonial-50g"
    );
    assert_eq!(
        p.image_url.as_deref(),
        Some("https://alpen-tee.example/img/matcha.jpg")
    );
    assert_eq!(p.category.as_deref(), Some("matcha"));
}

#[test]
fn recrawl_is_idempotent() {
    // Same document, two passes: byte-identical id and price.
    let adapter = adapter_for(test_site());
    let first = adapter.extract_listing(LISTING, fixed_now());
    let second = adapter.extract_listing(LISTING, fixed_now());
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].price, second[0].price);
}

#[test]
fn every_product_has_at_least_one_variant() {
    let adapter = adapter_for(test_site());
    let products = adapter.extract_listing(LISTING, fixed_now());
    assert_eq!(products[0].variants.len(), 1);
    assert_eq!(products[0].variants[0].label, "default");
    assert_eq!(products[0].variants[0].price, dec!(12.50));
}

#[test]
fn container_without_name_is_skipped_not_fatal() {
    let html = r#"
        <div class="product">
          <span class="price">€5,00</span>
          <a href="/p/nameless">view</a>
        </div>
        <div class="product">
          <h3>Sencha</h3>
          <span class="price">€8,00</span>
          <a href="/p/sencha">view</a>
        </div>
    "#;
    let adapter = adapter_for(test_site());
    let products = adapter.extract_listing(html, fixed_now());
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Sencha");
}

#[test]
fn container_without_link_is_skipped_not_fatal() {
    let html = r#"
        <div class="product">
          <h3>Linkless</h3>
          <span class="price">€5,00</span>
        </div>
        <div class="product">
          <h3>Sencha</h3>
          <span class="price">€8,00</span>
          <a href="/p/sencha">view</a>
        </div>
    "#;
    let adapter = adapter_for(test_site());
    let products = adapter.extract_listing(html, fixed_now());
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Sencha");
}

#[test]
fn out_of_stock_keyword_marks_product_unavailable() {
    let html = r#"
        <div class="product">
          <h3>Gyokuro</h3>
          <span class="price">€19,90</span>
          <span class="stock">Ausverkauft</span>
          <a href="/p/gyokuro">view</a>
        </div>
    "#;
    let adapter = adapter_for(test_site());
    let products = adapter.extract_listing(html, fixed_now());
    assert!(!products[0].in_stock);
    assert!(!products[0].variants[0].available);
}

#[test]
fn prices_are_converted_into_canonical_currency() {
    let mut site = test_site();
    site.currency = "GBP".to_string();
    let adapter = adapter_for(site);
    let html = r#"
        <div class="product">
          <h3>Earl Grey</h3>
          <span class="price">£10.00</span>
          <a href="/p/earl-grey">view</a>
        </div>
    "#;
    let products = adapter.extract_listing(html, fixed_now());
    // 10.00 GBP * 1.17 = 11.70 EUR
    assert_eq!(products[0].price, dec!(11.70));
    assert_eq!(products[0].variants[0].price, dec!(11.70));
}

#[test]
fn embedded_variants_flow_through_to_canonical_product() {
    let html = r#"
        <div class="product">
          <h3>Matcha Starter</h3>
          <span class="price">€64,80</span>
          <a href="/p/matcha-starter">view</a>
          <script>{"variants":[
            {"id":1,"price":6480,"available":true,"title":"50g Dose"},
            {"id":2,"price":9800,"available":false,"title":"100g"}
          ]}</script>
        </div>
    "#;
    let adapter = adapter_for(test_site());
    let products = adapter.extract_listing(html, fixed_now());
    let p = &products[0];
    assert_eq!(p.variants.len(), 2);
    assert_eq!(p.variants[0].price, dec!(64.80));
    assert_eq!(p.variants[1].price, dec!(98.00));
    // One variant is still purchasable, so the product is in stock.
    assert!(p.in_stock);
    assert!(!p.variants[1].available);
}

#[test]
fn unparseable_selector_is_a_configuration_error() {
    let mut site = test_site();
    site.selectors.price = vec!["span[".to_string()];
    let err = SiteAdapter::new(site, eur_currency()).unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidSelector { .. }));
}

#[test]
fn stock_text_default_is_available() {
    let site = test_site();
    assert!(stock_indicates_available(None, &site));
    assert!(stock_indicates_available(Some("Lieferbar in 3 Tagen"), &site));
}

#[test]
fn stock_text_out_of_stock_beats_default() {
    let site = test_site();
    assert!(!stock_indicates_available(Some("Leider ausverkauft"), &site));
    assert!(!stock_indicates_available(Some("SOLD OUT"), &site));
}

#[test]
fn stock_text_in_stock_keyword_is_positive() {
    let site = test_site();
    assert!(stock_indicates_available(Some("In den Warenkorb"), &site));
}

#[test]
fn sites_file_currency_table_roundtrip() {
    // CurrencyTable::from_sites_file carries the canonical code and rates.
    let file = SitesFile {
        canonical_currency: "EUR".to_string(),
        rates: BTreeMap::from([("USD".to_string(), dec!(0.86))]),
        sites: vec![],
    };
    let table = CurrencyTable::from_sites_file(&file);
    assert_eq!(table.canonical(), "EUR");
    assert_eq!(table.normalize(dec!(100), "USD").unwrap(), dec!(86.00));
}
