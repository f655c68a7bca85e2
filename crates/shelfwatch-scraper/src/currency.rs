//! Price normalization into the canonical currency.
//!
//! Rates are a fixed table injected at construction — static by design.
//! Good enough for restock/price monitoring; not a source of truth for
//! transactional pricing.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use shelfwatch_core::SitesFile;

use crate::error::ScrapeError;

/// Immutable exchange-rate table mapping source currencies into the one
/// canonical currency all products are stored in.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    canonical: String,
    rates: BTreeMap<String, Decimal>,
}

impl CurrencyTable {
    #[must_use]
    pub fn new(canonical: String, rates: BTreeMap<String, Decimal>) -> Self {
        Self { canonical, rates }
    }

    #[must_use]
    pub fn from_sites_file(file: &SitesFile) -> Self {
        Self::new(file.canonical_currency.clone(), file.rates.clone())
    }

    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Converts `amount` from `source` currency into the canonical currency,
    /// rounded to two decimal places (half away from zero).
    ///
    /// Pure: identical inputs always yield identical outputs.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::UnknownCurrency`] when `source` is neither the
    /// canonical currency nor present in the rate table. Site configs are
    /// validated against the table at load time, so this only fires on a
    /// table/config mismatch.
    pub fn normalize(&self, amount: Decimal, source: &str) -> Result<Decimal, ScrapeError> {
        let converted = if source == self.canonical {
            amount
        } else {
            let rate = self
                .rates
                .get(source)
                .ok_or_else(|| ScrapeError::UnknownCurrency {
                    code: source.to_owned(),
                })?;
            amount * *rate
        };
        Ok(round_price(converted))
    }
}

/// Rounds to two decimal places, half away from zero.
#[must_use]
pub fn round_price(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parses a locale-formatted price string into a `Decimal`.
///
/// Tolerates currency symbols, ISO codes, and surrounding words; the first
/// numeric run in the string wins. Separator handling:
///
/// - both `.` and `,` present: the one occurring later is the decimal
///   separator, the other a grouping separator (`"1.299,00"` → 1299.00,
///   `"1,299.00"` → 1299.00);
/// - a single separator followed by exactly three digits is read as a
///   grouping separator (`"1.299"` → 1299); one or two trailing digits make
///   it the decimal separator (`"12,50"` → 12.50);
/// - a dangling separator is dropped (`"12,-"` → 12).
///
/// Returns `None` when the string contains no digits.
#[must_use]
pub fn parse_price_text(text: &str) -> Option<Decimal> {
    let run = first_numeric_run(text)?;

    let last_dot = run.rfind('.');
    let last_comma = run.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            let (decimal_sep, group_sep) = if dot > comma { ('.', ',') } else { (',', '.') };
            let without_groups: String = run.chars().filter(|&c| c != group_sep).collect();
            without_groups.replace(decimal_sep, ".")
        }
        (Some(_), None) => normalize_single_separator(&run, '.'),
        (None, Some(_)) => normalize_single_separator(&run, ','),
        (None, None) => run,
    };

    Decimal::from_str(&normalized).ok()
}

/// Extracts the first maximal run of digits and separators containing at
/// least one digit, with dangling separators trimmed.
fn first_numeric_run(text: &str) -> Option<String> {
    let mut run = String::new();
    let mut seen_digit = false;

    for c in text.chars() {
        if c.is_ascii_digit() {
            run.push(c);
            seen_digit = true;
        } else if (c == '.' || c == ',') && seen_digit {
            run.push(c);
        } else if seen_digit {
            break;
        }
    }

    if !seen_digit {
        return None;
    }
    Some(run.trim_end_matches(['.', ',']).to_string())
}

/// Resolves a run containing only one kind of separator.
fn normalize_single_separator(run: &str, sep: char) -> String {
    let groups: Vec<&str> = run.split(sep).collect();
    let trailing = groups.last().map_or(0, |g| g.len());
    let is_grouping = groups.len() > 2 || trailing == 3;

    if is_grouping {
        groups.concat()
    } else {
        run.replace(sep, ".")
    }
}
