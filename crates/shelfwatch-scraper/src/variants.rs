//! Variant reconciliation: expands one listing entry into its purchasable
//! variants, merging DOM-derived and embedded-JSON-derived data.
//!
//! Source priority, first success wins:
//! 1. embedded JSON — a `variants` array inside a script body (commonly
//!    nested in an analytics/meta object), parsed defensively;
//! 2. DOM — `<select>` options and radio inputs;
//! 3. the site's declared fallback catalog;
//! 4. a single implicit default variant from the container-level price.
//!
//! Every product therefore ends up with at least one variant.

use std::str::FromStr;
use std::sync::LazyLock;

use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};
use serde::Deserialize;
use shelfwatch_core::SiteConfig;

use crate::currency::parse_price_text;
use crate::select::collapse_whitespace;

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("valid selector"));
static OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select option").expect("valid selector"));
static RADIO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[type="radio"]"#).expect("valid selector"));

/// A reconciled variant priced in the site's source currency, before
/// currency normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVariant {
    pub label: String,
    /// Price in the source currency, major units.
    pub price: Decimal,
    pub available: bool,
    pub source_id: Option<String>,
    pub sku: Option<String>,
}

/// One entry of an embedded `variants` array.
///
/// Fields beyond `id` and `price` are all optional with permissive
/// defaults; storefront payloads vary widely. Availability defaults to
/// `true` unless the source explicitly marks `available: false`.
#[derive(Debug, Deserialize)]
struct EmbeddedVariant {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    price: Option<serde_json::Value>,
    #[serde(default = "default_available")]
    available: bool,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    public_title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sku: Option<String>,
}

/// Serde's `default = "..."` attribute expects a function path to call for
/// each missing field. `true` is intentional (optimistic availability when
/// the source omits the flag).
fn default_available() -> bool {
    true
}

/// Expands one product container into its purchasable variants.
///
/// `base_price` and `base_available` are the container-level values used by
/// the fallback catalog and the implicit default variant. Never returns an
/// empty list.
#[must_use]
pub fn reconcile(
    scope: ElementRef<'_>,
    site: &SiteConfig,
    base_price: Decimal,
    base_available: bool,
) -> Vec<RawVariant> {
    if let Some(variants) = embedded_json_variants(scope, site) {
        return variants;
    }

    let dom = dom_variants(scope, base_price);
    if !dom.is_empty() {
        return dom;
    }

    let catalog = catalog_variants(site, base_price, base_available);
    if !catalog.is_empty() {
        return catalog;
    }

    vec![RawVariant {
        label: "default".to_string(),
        price: base_price,
        available: base_available,
        source_id: None,
        sku: None,
    }]
}

/// Scans script bodies under `scope` for a parseable `variants` array.
///
/// Returns `None` when no candidate parses into at least one usable entry.
/// Malformed candidates are discarded (logged at debug), never surfaced —
/// the reconciler simply falls through to the next source.
#[must_use]
pub fn embedded_json_variants(
    scope: ElementRef<'_>,
    site: &SiteConfig,
) -> Option<Vec<RawVariant>> {
    for script in scope.select(&SCRIPT_SELECTOR) {
        let body = script.text().collect::<String>();
        if let Some(variants) = scan_script_for_variants(&body, site) {
            return Some(variants);
        }
    }
    None
}

fn scan_script_for_variants(body: &str, site: &SiteConfig) -> Option<Vec<RawVariant>> {
    let mut search_from = 0usize;

    while let Some(rel) = body[search_from..].find("\"variants\"") {
        let key_pos = search_from + rel;
        search_from = key_pos + "\"variants\"".len();

        let Some(array) = json_array_after(body, search_from) else {
            continue;
        };

        match serde_json::from_str::<Vec<EmbeddedVariant>>(array) {
            Ok(entries) => {
                let variants: Vec<RawVariant> = entries
                    .into_iter()
                    .filter_map(|e| embedded_to_raw(e, site))
                    .collect();
                if !variants.is_empty() {
                    return Some(variants);
                }
            }
            Err(e) => {
                // Candidate discarded, not an error: fall through to the
                // next occurrence or the next variant source.
                tracing::debug!(site = %site.key, error = %e, "embedded variants candidate did not parse");
            }
        }
    }

    None
}

/// Returns the bracket-balanced JSON array starting at the first `[` after
/// `from`, or `None` when the brackets never balance. String literals and
/// escapes are honored so that bracket characters inside values do not
/// derail the match.
fn json_array_after(body: &str, from: usize) -> Option<&str> {
    let bytes = body.as_bytes();
    let start = body[from..].find('[')? + from;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'[' if !in_string => depth += 1,
            b']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Converts one embedded entry, applying the site's minor-unit rule.
/// Entries missing `id` or a parseable `price` are dropped.
fn embedded_to_raw(entry: EmbeddedVariant, site: &SiteConfig) -> Option<RawVariant> {
    let id = entry.id.as_ref().and_then(json_value_to_id)?;
    let price = entry.price.as_ref().and_then(json_value_to_decimal)?;
    let price = scale_minor_units(price, site.minor_unit_threshold);

    let label = entry
        .public_title
        .or(entry.title)
        .or(entry.name)
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "default".to_string());

    Some(RawVariant {
        label,
        price,
        available: entry.available,
        source_id: Some(id),
        sku: entry.sku.filter(|s| !s.is_empty()),
    })
}

fn json_value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn json_value_to_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str(s.trim())
            .ok()
            .or_else(|| parse_price_text(s)),
        _ => None,
    }
}

/// Divides by 100 when the value exceeds the site's minor-unit threshold.
///
/// Embedded payloads usually quote prices in minor units (cents); a value
/// like 64800 is not a believable unit price, so anything strictly above
/// the threshold is scaled. The threshold is a per-site config value — the
/// heuristic is observed behavior, not a contract.
#[must_use]
pub fn scale_minor_units(price: Decimal, threshold: u32) -> Decimal {
    if price > Decimal::from(threshold) {
        price / Decimal::ONE_HUNDRED
    } else {
        price
    }
}

/// Extracts variants from `<select>` options and radio inputs.
///
/// An entry must have a non-empty value and label and not be a disabled
/// placeholder. A disabled entry with a real value is a sold-out variant,
/// not a placeholder. DOM options rarely carry per-variant prices; a
/// `data-price` attribute is honored when present, otherwise the container
/// price applies.
#[must_use]
pub fn dom_variants(scope: ElementRef<'_>, base_price: Decimal) -> Vec<RawVariant> {
    let mut variants: Vec<RawVariant> = Vec::new();

    for option in scope.select(&OPTION_SELECTOR) {
        let Some(value) = non_empty_attr_value(option, "value") else {
            continue;
        };
        let label = collapse_whitespace(&option.text().collect::<String>());
        if label.is_empty() || is_placeholder_label(&label) {
            continue;
        }
        let disabled = option.value().attr("disabled").is_some();
        let price = option
            .value()
            .attr("data-price")
            .and_then(parse_price_text)
            .unwrap_or(base_price);

        push_unique(
            &mut variants,
            RawVariant {
                label,
                price,
                available: !disabled,
                source_id: Some(value),
                sku: None,
            },
        );
    }

    for radio in scope.select(&RADIO_SELECTOR) {
        let Some(value) = non_empty_attr_value(radio, "value") else {
            continue;
        };
        let label = radio
            .value()
            .attr("data-label")
            .map(collapse_whitespace)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| value.clone());
        if is_placeholder_label(&label) {
            continue;
        }
        let disabled = radio.value().attr("disabled").is_some();
        let price = radio
            .value()
            .attr("data-price")
            .and_then(parse_price_text)
            .unwrap_or(base_price);

        push_unique(
            &mut variants,
            RawVariant {
                label,
                price,
                available: !disabled,
                source_id: Some(value),
                sku: None,
            },
        );
    }

    variants
}

fn non_empty_attr_value(el: ElementRef<'_>, attr: &str) -> Option<String> {
    el.value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Labels like `"---"` or `"Bitte wählen"` mark a non-variant placeholder.
fn is_placeholder_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    lower.starts_with('-')
        || lower.contains("wählen")
        || lower.contains("auswahl")
        || lower.contains("choose")
        || lower.starts_with("select ")
}

fn push_unique(variants: &mut Vec<RawVariant>, candidate: RawVariant) {
    if !variants.iter().any(|v| v.label == candidate.label) {
        variants.push(candidate);
    }
}

/// Synthesizes variants from the site's declared packaging catalog.
///
/// This is an explicit business rule for vendors known to sell a fixed set
/// of packaging options without exposing them in markup — not a guess at
/// missing data. Returns an empty list for sites without a catalog.
#[must_use]
pub fn catalog_variants(
    site: &SiteConfig,
    base_price: Decimal,
    base_available: bool,
) -> Vec<RawVariant> {
    site.fallback_variants
        .iter()
        .map(|fv| RawVariant {
            label: fv.label.clone(),
            price: base_price * fv.multiplier,
            available: base_available,
            source_id: None,
            sku: None,
        })
        .collect()
}

#[cfg(test)]
#[path = "variants_test.rs"]
mod tests;
