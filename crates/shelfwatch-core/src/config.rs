use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value cannot be parsed. All variables have
/// defaults, so a bare environment is valid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("SHELFWATCH_ENV", "development"));
    let log_level = or_default("SHELFWATCH_LOG_LEVEL", "info");
    let sites_path = PathBuf::from(or_default("SHELFWATCH_SITES_PATH", "./config/sites.yaml"));

    let request_timeout_secs = parse_u64("SHELFWATCH_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("SHELFWATCH_USER_AGENT", "shelfwatch/0.1 (restock-monitor)");
    let max_concurrent_sites = parse_usize("SHELFWATCH_MAX_CONCURRENT_SITES", "4")?;
    let site_timeout_secs = parse_u64("SHELFWATCH_SITE_TIMEOUT_SECS", "120")?;
    let inter_request_delay_ms = parse_u64("SHELFWATCH_INTER_REQUEST_DELAY_MS", "250")?;
    let max_retries = parse_u32("SHELFWATCH_MAX_RETRIES", "3")?;
    let retry_backoff_base_secs = parse_u64("SHELFWATCH_RETRY_BACKOFF_BASE_SECS", "2")?;

    if max_concurrent_sites == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHELFWATCH_MAX_CONCURRENT_SITES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        log_level,
        sites_path,
        request_timeout_secs,
        user_agent,
        max_concurrent_sites,
        site_timeout_secs,
        inter_request_delay_ms,
        max_retries,
        retry_backoff_base_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
