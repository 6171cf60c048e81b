//! Property search: index schema, filter expressions, storage backends,
//! facets and suggestions, and the language-aware search entry point.

pub mod adapter;
pub mod backend;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod schema;

pub use adapter::{Facets, FacetCount, PriceRange, PropertyIndex, Suggestion};
pub use backend::{IndexHits, IndexQuery, MeiliBackend, MemoryBackend, SearchBackend};
pub use error::SearchError;
pub use filter::FilterExpr;
pub use orchestrator::{LocalizedProperty, SearchResponse, SearchService};
pub use schema::IndexSettings;
