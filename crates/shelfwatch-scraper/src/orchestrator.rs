//! Crawl orchestration: fan-out over configured sites with bounded
//! parallelism, per-site timeouts, and strict failure isolation.
//!
//! One site's failure never aborts others. Failures are collected into the
//! report, not thrown; a crawl invocation always completes with a per-site
//! success/failure breakdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use shelfwatch_core::{AppConfig, Product, SitesFile};

use crate::adapter::SiteAdapter;
use crate::client::PageClient;
use crate::currency::CurrencyTable;
use crate::error::ScrapeError;
use crate::image::{cache_image, AssetStore};

/// Outcome of one site's extraction.
#[derive(Debug, Serialize)]
pub struct SiteResult {
    pub site_key: String,
    pub outcome: SiteOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SiteOutcome {
    Succeeded {
        products: Vec<Product>,
        elapsed_ms: u64,
    },
    Failed {
        error: SiteFailure,
    },
}

/// Site-level error classification surfaced in the crawl report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteFailure {
    /// No adapter/site registered for the requested key, or the site's
    /// configuration cannot be compiled. No fetch is attempted.
    Configuration { reason: String },
    /// Transport or HTTP failure; recoverable by a future crawl cycle.
    Fetch { detail: String },
    /// The site exceeded its crawl budget.
    Timeout { budget_secs: u64 },
    /// Extraction produced nothing usable at site level.
    Extraction { detail: String },
    /// Embedded payload parsing failed at site level.
    Parse { detail: String },
}

impl SiteFailure {
    fn classify(err: &ScrapeError) -> Self {
        match err {
            ScrapeError::Timeout { budget_secs, .. } => SiteFailure::Timeout {
                budget_secs: *budget_secs,
            },
            ScrapeError::UnknownSite { .. }
            | ScrapeError::InvalidSelector { .. }
            | ScrapeError::UnknownCurrency { .. } => SiteFailure::Configuration {
                reason: err.to_string(),
            },
            ScrapeError::Http(_)
            | ScrapeError::RateLimited { .. }
            | ScrapeError::NotFound { .. }
            | ScrapeError::UnexpectedStatus { .. } => SiteFailure::Fetch {
                detail: err.to_string(),
            },
            ScrapeError::Extraction { .. } => SiteFailure::Extraction {
                detail: err.to_string(),
            },
            ScrapeError::Parse { .. } => SiteFailure::Parse {
                detail: err.to_string(),
            },
        }
    }
}

/// Aggregated result of one crawl invocation, ordered by the requested
/// site-key order regardless of completion order.
#[derive(Debug, Serialize)]
pub struct CrawlReport {
    pub results: Vec<SiteResult>,
}

impl CrawlReport {
    /// All extracted products across succeeded sites.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.results.iter().filter_map(|r| match &r.outcome {
            SiteOutcome::Succeeded { products, .. } => Some(products.iter()),
            SiteOutcome::Failed { .. } => None,
        })
        .flatten()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SiteOutcome::Succeeded { .. }))
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// The crawl orchestrator: owns the site registry, compiled adapters, and
/// the shared fetch transport.
pub struct Crawler {
    config: AppConfig,
    adapters: HashMap<String, SiteAdapter>,
    /// Site keys in registry order, for "crawl everything" callers.
    ordered_keys: Vec<String>,
    client: PageClient,
}

impl Crawler {
    /// Builds the orchestrator from validated configuration: compiles every
    /// site's selector chains and constructs the shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidSelector`] for an uncompilable site
    /// config, or [`ScrapeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: AppConfig, sites: SitesFile) -> Result<Self, ScrapeError> {
        let client = PageClient::new(
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_secs,
        )?;

        let currency = Arc::new(CurrencyTable::from_sites_file(&sites));
        let ordered_keys = sites.keys();

        let mut adapters = HashMap::with_capacity(sites.sites.len());
        for site in sites.sites {
            let key = site.key.clone();
            let adapter = SiteAdapter::new(site, Arc::clone(&currency))?;
            adapters.insert(key, adapter);
        }

        Ok(Self {
            config,
            adapters,
            ordered_keys,
            client,
        })
    }

    /// All configured site keys, in registry order.
    #[must_use]
    pub fn site_keys(&self) -> &[String] {
        &self.ordered_keys
    }

    /// Crawls the requested sites with bounded parallelism.
    ///
    /// Unknown keys are reported as configuration failures without any
    /// fetch. Each site runs under its own timeout; no cross-site
    /// cancellation. The report preserves the requested key order.
    pub async fn crawl(&self, site_keys: &[String]) -> CrawlReport {
        let tasks = site_keys.iter().enumerate().map(|(idx, key)| async move {
            (idx, self.crawl_site(key).await)
        });

        let mut indexed: Vec<(usize, SiteResult)> = stream::iter(tasks)
            .buffer_unordered(self.config.max_concurrent_sites)
            .collect()
            .await;

        // Fan-in: restore the requested order regardless of completion order.
        indexed.sort_by_key(|(idx, _)| *idx);

        let report = CrawlReport {
            results: indexed.into_iter().map(|(_, r)| r).collect(),
        };

        tracing::info!(
            requested = site_keys.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "crawl complete"
        );

        report
    }

    /// Crawls the requested sites and reconciles each extracted product
    /// image with the asset store (existence-checked, idempotent upload).
    pub async fn crawl_with_assets<S: AssetStore>(
        &self,
        site_keys: &[String],
        store: &S,
    ) -> CrawlReport {
        let mut report = self.crawl(site_keys).await;

        for result in &mut report.results {
            let SiteOutcome::Succeeded { products, .. } = &mut result.outcome else {
                continue;
            };
            for product in products.iter_mut() {
                let Some(source_url) = product.image_url.clone() else {
                    continue;
                };
                if let Some(public_url) = cache_image(
                    &self.client,
                    store,
                    &product.site_key,
                    &product.id,
                    &source_url,
                )
                .await
                {
                    product.image_url = Some(public_url);
                }
            }
        }

        report
    }

    async fn crawl_site(&self, key: &str) -> SiteResult {
        let Some(adapter) = self.adapters.get(key) else {
            tracing::warn!(site = key, "no site configured for requested key");
            return SiteResult {
                site_key: key.to_owned(),
                outcome: SiteOutcome::Failed {
                    error: SiteFailure::Configuration {
                        reason: format!("no site configured for key '{key}'"),
                    },
                },
            };
        };

        let budget_secs = self.config.site_timeout_secs;
        let started = Instant::now();

        let outcome = match tokio::time::timeout(
            std::time::Duration::from_secs(budget_secs),
            adapter.extract(&self.client, self.config.inter_request_delay_ms),
        )
        .await
        {
            Ok(Ok(products)) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::info!(
                    site = key,
                    products = products.len(),
                    elapsed_ms,
                    "site extracted"
                );
                SiteOutcome::Succeeded {
                    products,
                    elapsed_ms,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(site = key, error = %e, "site extraction failed");
                SiteOutcome::Failed {
                    error: SiteFailure::classify(&e),
                }
            }
            Err(_) => {
                tracing::warn!(site = key, budget_secs, "site exceeded crawl budget");
                SiteOutcome::Failed {
                    error: SiteFailure::Timeout { budget_secs },
                }
            }
        };

        SiteResult {
            site_key: key.to_owned(),
            outcome,
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
