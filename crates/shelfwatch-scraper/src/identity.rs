//! Stable product-identity generation.
//!
//! The identifier is a pure function of (site key, URL slug, normalized
//! name): no randomness, no timestamps, no counters. Re-crawling the same
//! listing yields the same id, which is what lets the downstream store
//! upsert instead of insert and detect stock/price transitions on the same
//! logical product.

/// Maximum length of the name fragment embedded in a product id.
const NAME_FRAGMENT_MAX: usize = 24;

/// Derives a stable, deterministic product id from site key, product name,
/// and product URL.
///
/// Shape: `{site_key}_{url_slug}_{name_fragment}`, filtered to `[a-z0-9_]`.
/// The slug is the last path segment of the URL with query string and
/// fragment stripped; the name fragment is the lower-cased alphanumeric
/// residue of the name, truncated to a bounded length.
///
/// Callers normalize the product title (trim, collapse whitespace) before
/// calling; titles that drift between crawl runs (localized punctuation,
/// added marketing suffixes) can still produce diverging ids — that is a
/// per-site data-quality concern, not something this function can absorb.
#[must_use]
pub fn generate_id(site_key: &str, name: &str, url: &str) -> String {
    let slug = url_slug(url);
    let fragment = name_fragment(name);

    let combined = format!("{site_key}_{slug}_{fragment}");
    combined
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Last path segment of the URL, lower-cased, without query or fragment.
fn url_slug(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Lower-cased alphanumeric characters of the name, truncated.
fn name_fragment(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(NAME_FRAGMENT_MAX)
        .collect()
}
