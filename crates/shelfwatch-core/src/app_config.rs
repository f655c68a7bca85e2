use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

/// Process-level configuration, loaded once at startup from environment
/// variables. Site definitions live separately in the sites file
/// (see [`crate::sites`]); this struct only carries pipeline tunables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Path to the YAML site registry.
    pub sites_path: PathBuf,
    /// Per-request timeout for page fetches.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Upper bound on sites crawled concurrently.
    pub max_concurrent_sites: usize,
    /// Wall-clock budget for one site's full extraction, including all
    /// product-page fetches made by specialized adapters.
    pub site_timeout_secs: u64,
    /// Delay between consecutive product-page fetches within one site.
    pub inter_request_delay_ms: u64,
    /// Additional attempts after the first failure for transient errors.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff.
    pub retry_backoff_base_secs: u64,
}
