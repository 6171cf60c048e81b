//! Shared domain model, configuration, and pure geo algorithms for the
//! property-discovery services.

pub mod app_config;
pub mod cluster;
pub mod config;
pub mod error;
pub mod geo;
pub mod language;
pub mod property;
pub mod query;

pub use app_config::{AppConfig, CacheBackend, Environment, GeocodingProviderKind};
pub use cluster::{cluster_documents, cluster_within_bounds, ClusterOptions, ClusterPoint, GeoTagged};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, ValidationError};
pub use geo::{haversine_km, BoundingBox, Coordinates};
pub use language::{parse_accept_language, resolve_language, resolve_localized};
pub use property::{LocalizedText, PropertyDocument, PropertyStatus};
pub use query::{SearchFilters, SearchOptions, SortField, SortOrder, SortSpec};
