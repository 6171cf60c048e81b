use crate::app_config::{AppConfig, CacheBackend, Environment, GeocodingProviderKind};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
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
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    // Empty strings count as unset so `.env` templates with blank keys behave.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default =
        |var: &str, default: &str| -> String { optional(var).unwrap_or_else(|| default.to_string()) };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("GEOPROP_ENV", "development"))?;

    let bind_addr = or_default("GEOPROP_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("GEOPROP_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("GEOPROP_LOG_LEVEL", "info");

    let geocoding_provider = parse_provider_kind(&or_default("GEOCODING_PROVIDER", "stub"))?;
    let google_maps_api_key = optional("GOOGLE_MAPS_API_KEY");
    let nominatim_base_url = or_default(
        "NOMINATIM_BASE_URL",
        "https://nominatim.openstreetmap.org",
    );
    let geocoding_user_agent = or_default(
        "GEOCODING_USER_AGENT",
        "geoprop/0.1 (property-discovery)",
    );
    let geocoding_timeout_secs = parse_u64("GEOCODING_TIMEOUT_SECS", "10")?;
    let geocoding_max_retries = parse_u32("GEOCODING_MAX_RETRIES", "2")?;

    let geocode_cache_backend = parse_cache_backend(&or_default("GEOCODE_CACHE_BACKEND", "memory"))?;
    let geocode_cache_ttl_secs = parse_u64("GEOCODE_CACHE_TTL_SECS", "86400")?;
    let geocode_batch_concurrency = parse_usize("GEOCODE_BATCH_CONCURRENCY", "1")?;
    if geocode_batch_concurrency == 0 {
        return Err(invalid(
            "GEOCODE_BATCH_CONCURRENCY",
            "must be at least 1".to_string(),
        ));
    }

    let catalog_base_url = optional("CATALOG_BASE_URL");
    let catalog_timeout_secs = parse_u64("CATALOG_TIMEOUT_SECS", "5")?;

    let search_index_url = or_default("SEARCH_INDEX_URL", "http://localhost:7700");
    let search_index_api_key = optional("SEARCH_INDEX_API_KEY");
    let search_index_name = or_default("SEARCH_INDEX_NAME", "properties");
    let search_index_timeout_secs = parse_u64("SEARCH_INDEX_TIMEOUT_SECS", "10")?;

    let default_language = or_default("DEFAULT_LANGUAGE", "en").to_lowercase();

    let cors_allowed_origins = or_default("CORS_ALLOWED_ORIGINS", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    let rate_limit_per_minute = parse_usize("GEOPROP_RATE_LIMIT_PER_MINUTE", "120")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        geocoding_provider,
        google_maps_api_key,
        nominatim_base_url,
        geocoding_user_agent,
        geocoding_timeout_secs,
        geocoding_max_retries,
        geocode_cache_backend,
        geocode_cache_ttl_secs,
        geocode_batch_concurrency,
        catalog_base_url,
        catalog_timeout_secs,
        search_index_url,
        search_index_api_key,
        search_index_name,
        search_index_timeout_secs,
        default_language,
        cors_allowed_origins,
        rate_limit_per_minute,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GEOPROP_ENV".to_string(),
            reason: format!("expected development, test, or production; got {other:?}"),
        }),
    }
}

fn parse_provider_kind(s: &str) -> Result<GeocodingProviderKind, ConfigError> {
    match s.trim().to_lowercase().as_str() {
        "google" => Ok(GeocodingProviderKind::Google),
        "nominatim" | "osm" | "openstreetmap" => Ok(GeocodingProviderKind::Nominatim),
        "stub" => Ok(GeocodingProviderKind::Stub),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GEOCODING_PROVIDER".to_string(),
            reason: format!("expected google, nominatim, or stub; got {other:?}"),
        }),
    }
}

fn parse_cache_backend(s: &str) -> Result<CacheBackend, ConfigError> {
    match s.trim().to_lowercase().as_str() {
        "memory" => Ok(CacheBackend::Memory),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GEOCODE_CACHE_BACKEND".to_string(),
            reason: format!("unsupported cache backend {other:?}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
