use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the process environment so tests can drive it
/// with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
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

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("BOOTHDB_ENV", "development"));
    let log_level = or_default("BOOTHDB_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default(
        "BOOTHDB_SOURCES_PATH",
        "./config/sources.yaml",
    ));

    let db_max_connections = parse_u32("BOOTHDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BOOTHDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("BOOTHDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let fetch_timeout_secs = parse_u64("BOOTHDB_FETCH_TIMEOUT_SECS", "30")?;
    let fetch_user_agent = or_default("BOOTHDB_FETCH_USER_AGENT", "boothdb/0.1 (catalog-crawler)");

    let agent_url = optional("BOOTHDB_AGENT_URL");
    if let Some(url) = &agent_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidEnvVar {
                var: "BOOTHDB_AGENT_URL".to_string(),
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }
    }
    let agent_api_key = optional("BOOTHDB_AGENT_API_KEY");
    let agent_timeout_secs = parse_u64("BOOTHDB_AGENT_TIMEOUT_SECS", "120")?;

    let geocode_user_agent = or_default(
        "BOOTHDB_GEOCODE_USER_AGENT",
        "boothdb/0.1 (geocoding; contact@boothdb.invalid)",
    );
    let nominatim_url = or_default(
        "BOOTHDB_NOMINATIM_URL",
        "https://nominatim.openstreetmap.org",
    );
    let mapbox_access_token = optional("MAPBOX_ACCESS_TOKEN");
    let google_maps_api_key = optional("GOOGLE_MAPS_API_KEY");
    let geocode_timeout_secs = parse_u64("BOOTHDB_GEOCODE_TIMEOUT_SECS", "15")?;
    let geocode_max_retries = parse_u32("BOOTHDB_GEOCODE_MAX_RETRIES", "2")?;
    let geocode_backoff_base_ms = parse_u64("BOOTHDB_GEOCODE_BACKOFF_BASE_MS", "1000")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        sources_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        fetch_timeout_secs,
        fetch_user_agent,
        agent_url,
        agent_api_key,
        agent_timeout_secs,
        geocode_user_agent,
        nominatim_url,
        mapbox_access_token,
        google_maps_api_key,
        geocode_timeout_secs,
        geocode_max_retries,
        geocode_backoff_base_ms,
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
