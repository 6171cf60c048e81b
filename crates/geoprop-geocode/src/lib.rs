//! Address and coordinate lookups behind a provider abstraction, with a
//! read-through TTL cache, batch processing, and the catalog nearby bridge.

pub mod cache;
pub mod error;
pub mod nearby;
pub mod provider;
mod retry;
pub mod service;
pub mod types;

pub use cache::{GeocodeCache, MemoryCache};
pub use error::GeocodeError;
pub use nearby::CatalogClient;
pub use provider::{
    build_provider, GeocodingProvider, GoogleProvider, NominatimProvider, StubProvider,
};
pub use service::{GeocodeService, MAX_BATCH_SIZE};
pub use types::{
    BatchGeocodeItem, BatchGeocodeOutcome, BatchSummary, GeocodeResult, NearbyProperty,
    NearbyQuery, NearbyResults, ReverseGeocodeResult,
};
