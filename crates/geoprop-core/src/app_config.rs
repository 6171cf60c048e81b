use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which upstream geocoding service backs address lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodingProviderKind {
    Google,
    Nominatim,
    Stub,
}

impl GeocodingProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GeocodingProviderKind::Google => "google",
            GeocodingProviderKind::Nominatim => "nominatim",
            GeocodingProviderKind::Stub => "stub",
        }
    }
}

impl std::fmt::Display for GeocodingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backing store for the geocode cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub geocoding_provider: GeocodingProviderKind,
    pub google_maps_api_key: Option<String>,
    pub nominatim_base_url: String,
    pub geocoding_user_agent: String,
    pub geocoding_timeout_secs: u64,
    pub geocoding_max_retries: u32,
    pub geocode_cache_backend: CacheBackend,
    pub geocode_cache_ttl_secs: u64,
    pub geocode_batch_concurrency: usize,
    pub catalog_base_url: Option<String>,
    pub catalog_timeout_secs: u64,
    pub search_index_url: String,
    pub search_index_api_key: Option<String>,
    pub search_index_name: String,
    pub search_index_timeout_secs: u64,
    pub default_language: String,
    pub cors_allowed_origins: Vec<String>,
    pub rate_limit_per_minute: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("geocoding_provider", &self.geocoding_provider)
            .field(
                "google_maps_api_key",
                &self.google_maps_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("nominatim_base_url", &self.nominatim_base_url)
            .field("geocoding_user_agent", &self.geocoding_user_agent)
            .field("geocoding_timeout_secs", &self.geocoding_timeout_secs)
            .field("geocoding_max_retries", &self.geocoding_max_retries)
            .field("geocode_cache_backend", &self.geocode_cache_backend)
            .field("geocode_cache_ttl_secs", &self.geocode_cache_ttl_secs)
            .field(
                "geocode_batch_concurrency",
                &self.geocode_batch_concurrency,
            )
            .field("catalog_base_url", &self.catalog_base_url)
            .field("catalog_timeout_secs", &self.catalog_timeout_secs)
            .field("search_index_url", &self.search_index_url)
            .field(
                "search_index_api_key",
                &self.search_index_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("search_index_name", &self.search_index_name)
            .field(
                "search_index_timeout_secs",
                &self.search_index_timeout_secs,
            )
            .field("default_language", &self.default_language)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}
