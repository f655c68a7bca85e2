use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which extraction implementation handles a site.
///
/// Most sites are expressible as selector lists and use [`AdapterKind::Generic`].
/// Sites whose markup cannot be driven by selectors alone get a named
/// specialized adapter, selected here rather than via inheritance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Generic,
    /// Listing carries only product links; variants come from embedded JSON
    /// on each product page, with a declared packaging catalog as fallback.
    Tealight,
}

/// Ordered CSS selector chains for the parts of a product listing.
///
/// Chains are tried in order; the first selector that matches a non-empty
/// value wins. `stock` and `image` may be empty for sites that expose
/// neither.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Product container on the listing page.
    pub product: Vec<String>,
    pub name: Vec<String>,
    pub price: Vec<String>,
    #[serde(default)]
    pub stock: Vec<String>,
    pub link: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
}

/// One entry of a declared fallback variant catalog: a packaging option the
/// vendor is known to sell, priced as a multiple of the base price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackVariant {
    pub label: String,
    pub multiplier: Decimal,
}

/// Per-site static configuration, loaded once at startup and immutable for
/// the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Unique site key, `[a-z0-9-]`.
    pub key: String,
    /// Human-readable display name.
    pub name: String,
    pub base_url: String,
    /// Category or collection page enumerating the products to extract.
    pub listing_url: String,
    /// ISO 4217 code of the currency prices are quoted in on this site.
    pub currency: String,
    /// Optional category tag stamped onto every product from this site.
    #[serde(default)]
    pub category: Option<String>,
    pub selectors: SiteSelectors,
    #[serde(default)]
    pub in_stock_keywords: Vec<String>,
    #[serde(default)]
    pub out_of_stock_keywords: Vec<String>,
    /// A numeric variant price strictly greater than this is assumed to be
    /// expressed in minor units (cents) and is divided by 100. Observed
    /// heuristic, overridable per site; never treat it as universal.
    #[serde(default = "default_minor_unit_threshold")]
    pub minor_unit_threshold: u32,
    /// Declared packaging catalog for sites exposing no variant data at all.
    #[serde(default)]
    pub fallback_variants: Vec<FallbackVariant>,
    #[serde(default)]
    pub adapter: AdapterKind,
}

fn default_minor_unit_threshold() -> u32 {
    1000
}

/// The full site registry: canonical currency, exchange-rate table, and
/// one [`SiteConfig`] per storefront.
#[derive(Debug, Clone, Deserialize)]
pub struct SitesFile {
    /// ISO 4217 code all prices are normalized into.
    pub canonical_currency: String,
    /// Source currency → rate into the canonical currency. Static by design;
    /// good enough for monitoring, not for transactional pricing.
    #[serde(default)]
    pub rates: BTreeMap<String, Decimal>,
    pub sites: Vec<SiteConfig>,
}

impl SitesFile {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.key == key)
    }

    /// All configured site keys in file order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.key.clone()).collect()
    }
}

/// Load and validate the site registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sites(path: &Path) -> Result<SitesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SitesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let sites_file: SitesFile = serde_yaml::from_str(&content)?;

    validate_sites(&sites_file)?;

    Ok(sites_file)
}

fn validate_sites(file: &SitesFile) -> Result<(), ConfigError> {
    if file.canonical_currency.trim().is_empty() {
        return Err(ConfigError::Validation(
            "canonical_currency must be non-empty".to_string(),
        ));
    }

    for (code, rate) in &file.rates {
        if *rate <= Decimal::ZERO {
            return Err(ConfigError::Validation(format!(
                "exchange rate for '{code}' must be positive, got {rate}"
            )));
        }
    }

    let mut seen_keys = HashSet::new();

    for site in &file.sites {
        if site.key.is_empty()
            || !site
                .key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "site key '{}' must be non-empty and match [a-z0-9-]",
                site.key
            )));
        }

        if !seen_keys.insert(site.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site key: '{}'",
                site.key
            )));
        }

        for (field, url) in [("base_url", &site.base_url), ("listing_url", &site.listing_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "site '{}': {field} must be an absolute http(s) URL, got '{url}'",
                    site.key
                )));
            }
        }

        for (field, chain) in [
            ("product", &site.selectors.product),
            ("name", &site.selectors.name),
            ("price", &site.selectors.price),
            ("link", &site.selectors.link),
        ] {
            if chain.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "site '{}': selector chain '{field}' must not be empty",
                    site.key
                )));
            }
        }

        if site.currency != file.canonical_currency && !file.rates.contains_key(&site.currency) {
            return Err(ConfigError::Validation(format!(
                "site '{}': currency '{}' has no exchange rate into '{}'",
                site.key, site.currency, file.canonical_currency
            )));
        }

        if site.minor_unit_threshold == 0 {
            return Err(ConfigError::Validation(format!(
                "site '{}': minor_unit_threshold must be positive",
                site.key
            )));
        }

        for fv in &site.fallback_variants {
            if fv.label.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "site '{}': fallback variant label must be non-empty",
                    site.key
                )));
            }
            if fv.multiplier <= Decimal::ZERO {
                return Err(ConfigError::Validation(format!(
                    "site '{}': fallback variant '{}' multiplier must be positive",
                    site.key, fv.label
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn minimal_site(key: &str) -> SiteConfig {
        SiteConfig {
            key: key.to_string(),
            name: "Test Shop".to_string(),
            base_url: "https://shop.example".to_string(),
            listing_url: "https://shop.example/collection/tea".to_string(),
            currency: "EUR".to_string(),
            category: None,
            selectors: SiteSelectors {
                product: vec![".product".to_string()],
                name: vec![".title".to_string()],
                price: vec![".price".to_string()],
                stock: vec![],
                link: vec!["a".to_string()],
                image: vec![],
            },
            in_stock_keywords: vec![],
            out_of_stock_keywords: vec![],
            minor_unit_threshold: 1000,
            fallback_variants: vec![],
            adapter: AdapterKind::Generic,
        }
    }

    fn minimal_file(sites: Vec<SiteConfig>) -> SitesFile {
        SitesFile {
            canonical_currency: "EUR".to_string(),
            rates: BTreeMap::new(),
            sites,
        }
    }

    #[test]
    fn validate_accepts_minimal_site() {
        let file = minimal_file(vec![minimal_site("tee-eins")]);
        assert!(validate_sites(&file).is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_keys() {
        let file = minimal_file(vec![minimal_site("shop"), minimal_site("shop")]);
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate site key"));
    }

    #[test]
    fn validate_rejects_uppercase_key() {
        let file = minimal_file(vec![minimal_site("Shop")]);
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("[a-z0-9-]"));
    }

    #[test]
    fn validate_rejects_relative_listing_url() {
        let mut site = minimal_site("shop");
        site.listing_url = "/collection/tea".to_string();
        let file = minimal_file(vec![site]);
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("listing_url"));
    }

    #[test]
    fn validate_rejects_empty_required_chain() {
        let mut site = minimal_site("shop");
        site.selectors.price = vec![];
        let file = minimal_file(vec![site]);
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("'price'"));
    }

    #[test]
    fn validate_rejects_unmapped_currency() {
        let mut site = minimal_site("shop");
        site.currency = "GBP".to_string();
        let file = minimal_file(vec![site]);
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("no exchange rate"));
    }

    #[test]
    fn validate_accepts_mapped_currency() {
        let mut site = minimal_site("shop");
        site.currency = "GBP".to_string();
        let mut file = minimal_file(vec![site]);
        file.rates.insert("GBP".to_string(), dec!(1.17));
        assert!(validate_sites(&file).is_ok());
    }

    #[test]
    fn validate_rejects_nonpositive_rate() {
        let mut file = minimal_file(vec![minimal_site("shop")]);
        file.rates.insert("USD".to_string(), dec!(0));
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn validate_rejects_zero_minor_unit_threshold() {
        let mut site = minimal_site("shop");
        site.minor_unit_threshold = 0;
        let file = minimal_file(vec![site]);
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("minor_unit_threshold"));
    }

    #[test]
    fn validate_rejects_zero_fallback_multiplier() {
        let mut site = minimal_site("shop");
        site.fallback_variants = vec![FallbackVariant {
            label: "100g".to_string(),
            multiplier: dec!(0),
        }];
        let file = minimal_file(vec![site]);
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("multiplier must be positive"));
    }

    #[test]
    fn adapter_kind_defaults_to_generic() {
        let yaml = r"
canonical_currency: EUR
sites:
  - key: shop
    name: Shop
    base_url: https://shop.example
    listing_url: https://shop.example/tea
    currency: EUR
    selectors:
      product: ['.product']
      name: ['.title']
      price: ['.price']
      link: ['a']
";
        let file: SitesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.sites[0].adapter, AdapterKind::Generic);
        assert_eq!(file.sites[0].minor_unit_threshold, 1000);
    }

    #[test]
    fn adapter_kind_parses_specialized_tag() {
        let yaml = r"
canonical_currency: EUR
sites:
  - key: shop
    name: Shop
    base_url: https://shop.example
    listing_url: https://shop.example/tea
    currency: EUR
    adapter: tealight
    selectors:
      product: ['.product']
      name: ['.title']
      price: ['.price']
      link: ['a']
";
        let file: SitesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.sites[0].adapter, AdapterKind::Tealight);
    }

    #[test]
    fn get_finds_site_by_key() {
        let file = minimal_file(vec![minimal_site("alpha"), minimal_site("beta")]);
        assert_eq!(file.get("beta").map(|s| s.key.as_str()), Some("beta"));
        assert!(file.get("gamma").is_none());
    }

    #[test]
    fn load_sites_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("sites.yaml");
        assert!(
            path.exists(),
            "sites.yaml missing at {path:?} — required for this test"
        );
        let result = load_sites(&path);
        assert!(result.is_ok(), "failed to load sites.yaml: {result:?}");
        let file = result.unwrap();
        assert!(!file.sites.is_empty());
    }
}
