use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("site {site_key} exceeded its crawl budget of {budget_secs}s")]
    Timeout { site_key: String, budget_secs: u64 },

    #[error("no site configured for key '{key}'")]
    UnknownSite { key: String },

    #[error("invalid selector '{selector}' for site {site_key}: {reason}")]
    InvalidSelector {
        site_key: String,
        selector: String,
        reason: String,
    },

    #[error("no exchange rate from '{code}' into the canonical currency")]
    UnknownCurrency { code: String },

    #[error("extraction failed for {site_key}: {reason}")]
    Extraction { site_key: String, reason: String },

    #[error("embedded JSON parse error in {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
