//! Selector fallback chains — the core resilience mechanism against markup
//! drift.
//!
//! A chain is an ordered list of CSS selectors tried in sequence; the first
//! selector that matches a non-empty value wins. A listing redesign that
//! breaks selector #1 degrades to selector #2 rather than failing the whole
//! site.

use scraper::{ElementRef, Selector};

use crate::error::ScrapeError;

/// An ordered, pre-parsed list of CSS selectors.
///
/// Selector strings come from site configuration and are compiled once at
/// adapter construction; a malformed selector is a configuration error, not
/// a runtime condition.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    /// Compiles the raw selector strings of one chain.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidSelector`] naming the offending selector
    /// if any entry fails to parse.
    pub fn compile(site_key: &str, raw: &[String]) -> Result<Self, ScrapeError> {
        let mut selectors = Vec::with_capacity(raw.len());
        for s in raw {
            let parsed = Selector::parse(s).map_err(|e| ScrapeError::InvalidSelector {
                site_key: site_key.to_owned(),
                selector: s.clone(),
                reason: e.to_string(),
            })?;
            selectors.push(parsed);
        }
        Ok(Self { selectors })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Returns the first element matched by the first selector that matches
    /// anything under `scope`.
    #[must_use]
    pub fn first_element<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors
            .iter()
            .find_map(|sel| scope.select(sel).next())
    }

    /// Returns all elements matched by the first selector that matches
    /// anything under `scope`. Used for product containers, where one
    /// selector is expected to enumerate every listing entry.
    #[must_use]
    pub fn select_all<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        for sel in &self.selectors {
            let matched: Vec<ElementRef<'a>> = scope.select(sel).collect();
            if !matched.is_empty() {
                return matched;
            }
        }
        Vec::new()
    }

    /// Returns the first non-empty text value produced by the chain.
    ///
    /// A selector that matches an element with only whitespace text does not
    /// win; the chain falls through to the next selector.
    #[must_use]
    pub fn first_text(&self, scope: ElementRef<'_>) -> Option<String> {
        for sel in &self.selectors {
            for el in scope.select(sel) {
                let text = collapse_whitespace(&el.text().collect::<String>());
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }

    /// Returns the first non-empty value of `attr` produced by the chain.
    #[must_use]
    pub fn first_attr(&self, scope: ElementRef<'_>, attr: &str) -> Option<String> {
        for sel in &self.selectors {
            for el in scope.select(sel) {
                if let Some(value) = el.value().attr(attr) {
                    let value = value.trim();
                    if !value.is_empty() {
                        return Some(value.to_owned());
                    }
                }
            }
        }
        None
    }

    /// Iterates every element matched by every selector in chain order.
    /// Later selectors may re-match elements already seen; callers that care
    /// deduplicate on the extracted value.
    pub fn iter_elements<'a, 'b>(
        &'b self,
        scope: ElementRef<'a>,
    ) -> impl Iterator<Item = ElementRef<'a>> + 'b
    where
        'a: 'b,
    {
        self.selectors.iter().flat_map(move |sel| scope.select(sel))
    }
}

/// Extracts the first usable `href` from the chain and resolves it against
/// `base_url`. Returns `None` when no selector yields a non-empty href or
/// the value cannot be resolved to an absolute URL.
#[must_use]
pub fn extract_link(scope: ElementRef<'_>, chain: &SelectorChain, base_url: &str) -> Option<String> {
    let href = chain.first_attr(scope, "href")?;
    absolutize(base_url, &href)
}

/// Resolves a possibly-relative URL reference against a base URL.
///
/// Handles absolute (`https://…`), protocol-relative (`//host/path`), and
/// root-relative (`/path`) forms. Entity-escaped ampersands from raw HTML
/// attributes are unescaped first.
#[must_use]
pub fn absolutize(base_url: &str, candidate: &str) -> Option<String> {
    let candidate = candidate.replace("&amp;", "&");
    let base = reqwest::Url::parse(base_url).ok()?;
    base.join(&candidate).ok().map(|u| u.to_string())
}

/// Trims and collapses internal whitespace runs to single spaces.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
