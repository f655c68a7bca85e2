//! Crawl command handlers.
//!
//! The per-site breakdown goes to stderr so stdout stays a clean JSON-lines
//! stream for the downstream store. Per-site failures are part of the
//! breakdown, never a process failure — the crawl always completes.

use std::io::Write;
use std::path::PathBuf;

use shelfwatch_core::{load_sites, AppConfig};
use shelfwatch_scraper::{Crawler, SiteFailure, SiteOutcome};

/// Crawl the requested (or all configured) sites and emit products.
///
/// # Errors
///
/// Returns an error when configuration cannot be loaded or the output file
/// cannot be written. Site-level extraction failures are reported in the
/// breakdown, not as errors.
pub(crate) async fn run_crawl(
    config: &AppConfig,
    site_filter: Vec<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let sites = load_sites(&config.sites_path)?;
    let crawler = Crawler::new(config.clone(), sites)
        .map_err(|e| anyhow::anyhow!("failed to build crawler: {e}"))?;

    let keys = if site_filter.is_empty() {
        crawler.site_keys().to_vec()
    } else {
        site_filter
    };

    tracing::info!(sites = keys.len(), "starting crawl");
    let report = crawler.crawl(&keys).await;

    for result in &report.results {
        match &result.outcome {
            SiteOutcome::Succeeded {
                products,
                elapsed_ms,
            } => {
                eprintln!(
                    "{:<20} ok      {:>4} products  {elapsed_ms}ms",
                    result.site_key,
                    products.len()
                );
            }
            SiteOutcome::Failed { error } => {
                eprintln!(
                    "{:<20} failed  {}",
                    result.site_key,
                    failure_summary(error)
                );
            }
        }
    }

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    };

    let mut emitted = 0usize;
    for product in report.products() {
        serde_json::to_writer(&mut writer, product)?;
        writeln!(writer)?;
        emitted += 1;
    }
    writer.flush()?;

    eprintln!(
        "crawled {} sites ({} ok, {} failed), emitted {emitted} products",
        report.results.len(),
        report.succeeded(),
        report.failed()
    );

    Ok(())
}

/// Print the configured site registry.
///
/// # Errors
///
/// Returns an error when the sites file cannot be loaded.
pub(crate) fn run_sites(config: &AppConfig) -> anyhow::Result<()> {
    let sites = load_sites(&config.sites_path)?;

    println!("canonical currency: {}", sites.canonical_currency);
    for site in &sites.sites {
        println!(
            "{:<20} {:<24} {:<8} {:<10} {}",
            site.key,
            site.name,
            site.currency,
            format!("{:?}", site.adapter).to_lowercase(),
            site.listing_url
        );
    }

    Ok(())
}

fn failure_summary(failure: &SiteFailure) -> String {
    match failure {
        SiteFailure::Configuration { reason } => format!("configuration: {reason}"),
        SiteFailure::Fetch { detail } => format!("fetch: {detail}"),
        SiteFailure::Timeout { budget_secs } => {
            format!("timeout: exceeded {budget_secs}s budget")
        }
        SiteFailure::Extraction { detail } => format!("extraction: {detail}"),
        SiteFailure::Parse { detail } => format!("parse: {detail}"),
    }
}
