//! Image candidate selection and asset-store reconciliation.
//!
//! Candidate extraction follows the attribute precedence `src` → lazy-load
//! attributes (`data-src`, `data-original`, `data-lazy`) → `srcset` (highest
//! resolution). Candidates matching the exclusion list (icons, logos,
//! badges) by URL or alt-text substring are rejected. Resolution failures
//! degrade to "no image", never to a failed product.

use scraper::ElementRef;
use sha2::{Digest, Sha256};

use crate::client::PageClient;
use crate::error::ScrapeError;
use crate::select::{absolutize, SelectorChain};

/// URL/alt substrings that mark a candidate as a non-product image.
const EXCLUDED_SUBSTRINGS: &[&str] = &[
    "icon",
    "logo",
    "badge",
    "sprite",
    "favicon",
    "placeholder",
];

/// Lazy-load attributes consulted after `src`, in precedence order.
const LAZY_ATTRS: &[&str] = &["data-src", "data-original", "data-lazy"];

/// Picks the best product-image URL under `scope` using the site's image
/// selector chain, resolved to an absolute URL.
///
/// Elements are visited in chain order; within one element the attribute
/// precedence above applies. The first acceptable candidate wins.
#[must_use]
pub fn best_image(scope: ElementRef<'_>, chain: &SelectorChain, base_url: &str) -> Option<String> {
    for el in chain.iter_elements(scope) {
        if el
            .value()
            .attr("alt")
            .is_some_and(|alt| is_excluded(alt))
        {
            continue;
        }

        for attr in std::iter::once("src").chain(LAZY_ATTRS.iter().copied()) {
            if let Some(raw) = non_empty_attr(el, attr) {
                if !is_excluded(&raw) {
                    if let Some(url) = absolutize(base_url, &raw) {
                        return Some(url);
                    }
                }
            }
        }

        for attr in ["srcset", "data-srcset"] {
            if let Some(raw) = non_empty_attr(el, attr) {
                if let Some(candidate) = best_srcset_candidate(&raw) {
                    if !is_excluded(candidate) {
                        if let Some(url) = absolutize(base_url, candidate) {
                            return Some(url);
                        }
                    }
                }
            }
        }
    }
    None
}

fn non_empty_attr(el: ElementRef<'_>, attr: &str) -> Option<String> {
    el.value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Returns the highest-resolution URL from a `srcset`-style list.
///
/// Entries look like `url 640w` or `url 2x`; entries without a descriptor
/// rank lowest. Ties keep the earlier entry.
#[must_use]
pub fn best_srcset_candidate(srcset: &str) -> Option<&str> {
    let mut best: Option<(&str, u32)> = None;

    for entry in srcset.split(',') {
        let mut parts = entry.split_whitespace();
        let Some(url) = parts.next() else { continue };
        let weight = parts
            .next()
            .and_then(|d| {
                d.strip_suffix('w')
                    .or_else(|| d.strip_suffix('x'))
                    .and_then(|n| n.parse::<f32>().ok())
            })
            .map_or(0u32, |n| {
                // Density descriptors ("2x") and width descriptors ("640w")
                // never appear together in one attribute; comparing raw
                // magnitudes within one list is sufficient.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let w = (n * 100.0) as u32;
                w
            });

        if best.is_none_or(|(_, bw)| weight > bw) {
            best = Some((url, weight));
        }
    }

    best.map(|(url, _)| url)
}

/// Case-insensitive exclusion check against [`EXCLUDED_SUBSTRINGS`].
fn is_excluded(value: &str) -> bool {
    let lower = value.to_lowercase();
    EXCLUDED_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// Remote asset storage consumed by the image resolver.
///
/// Paths are deterministic (see [`asset_path`]); `exists` is checked before
/// every `upload` so that re-crawling the same product never creates
/// duplicate assets.
#[allow(async_fn_in_trait)]
pub trait AssetStore {
    /// Whether an asset is already stored under `path`.
    async fn exists(&self, path: &str) -> Result<bool, ScrapeError>;

    /// Stores `bytes` under `path` and returns the public URL.
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, ScrapeError>;

    /// Public URL an existing asset at `path` is served from.
    fn public_url(&self, path: &str) -> String;
}

/// Deterministic storage path for a product image.
///
/// `{site_key}/{product_id}-{fingerprint}.{ext}` where the fingerprint is a
/// truncated SHA-256 of the source URL. The same (product, source image)
/// pair always maps to the same path; a changed source image URL maps to a
/// new path and supersedes the old asset downstream.
#[must_use]
pub fn asset_path(site_key: &str, product_id: &str, source_url: &str) -> String {
    let digest = Sha256::digest(source_url.as_bytes());
    let fingerprint: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    let ext = url_extension(source_url).unwrap_or("jpg");
    format!("{site_key}/{product_id}-{fingerprint}.{ext}")
}

/// File extension of the URL's last path segment, when it looks like an
/// image extension.
fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let ext = segment.rsplit('.').next()?;
    let known = ["jpg", "jpeg", "png", "webp", "gif", "avif", "svg"];
    known.contains(&ext.to_lowercase().as_str()).then_some(ext)
}

/// Reconciles a resolved image URL with the asset store.
///
/// Returns the stored public URL: the existing one when the derived path is
/// already present (no download), otherwise downloads the image once and
/// uploads it. Any failure degrades to `None` — a product without a cached
/// image is still a valid product.
pub async fn cache_image<S: AssetStore>(
    client: &PageClient,
    store: &S,
    site_key: &str,
    product_id: &str,
    source_url: &str,
) -> Option<String> {
    let path = asset_path(site_key, product_id, source_url);

    match store.exists(&path).await {
        Ok(true) => return Some(store.public_url(&path)),
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(site = site_key, path, error = %e, "asset existence check failed");
            return None;
        }
    }

    let bytes = match client.fetch_bytes(source_url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(site = site_key, url = source_url, error = %e, "image download failed");
            return None;
        }
    };

    match store.upload(&path, &bytes).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(site = site_key, path, error = %e, "image upload failed");
            None
        }
    }
}

/// In-memory [`AssetStore`] used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryAssetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.lock().map(|a| a.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetStore for MemoryAssetStore {
    async fn exists(&self, path: &str) -> Result<bool, ScrapeError> {
        Ok(self
            .assets
            .lock()
            .map(|a| a.contains_key(path))
            .unwrap_or(false))
    }

    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, ScrapeError> {
        if let Ok(mut assets) = self.assets.lock() {
            assets.insert(path.to_owned(), bytes.to_vec());
        }
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{path}")
    }
}
