//! Keyed TTL cache for geocoding results.
//!
//! Values are stored as serialized JSON so that any backend (in-process or
//! a shared store) can hold them. The orchestrator owns encoding and treats
//! an undecodable entry as a miss.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use geoprop_core::geo::coordinate_key;

/// Get / set-with-TTL capability injected into [`crate::GeocodeService`].
#[async_trait]
pub trait GeocodeCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);
}

/// Writes between full sweeps of expired entries.
const SWEEP_EVERY: usize = 256;

/// In-process cache. Expired entries are dropped on read and swept every
/// [`SWEEP_EVERY`] writes, so keys that are never read again still go away.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Instant)>,
    writes: AtomicUsize,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "geocode cache swept");
        }
        removed
    }
}

#[async_trait]
impl GeocodeCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if *expires_at > now {
                return Some(value.clone());
            }
        }
        // The read guard must be released before `remove_if` locks the shard.
        self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key.to_owned(), (value, expires_at));

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
    }
}

/// Lower-cases, trims, and collapses runs of whitespace to a single space.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `normalized-address[:country-hint]`
#[must_use]
pub fn address_cache_key(address: &str, country_hint: Option<&str>) -> String {
    let normalized = normalize_address(address);
    match country_hint.map(normalize_address).filter(|h| !h.is_empty()) {
        Some(hint) => format!("{normalized}:{hint}"),
        None => normalized,
    }
}

/// Coordinates rounded to four decimals (about 11 m).
#[must_use]
pub fn reverse_cache_key(latitude: f64, longitude: f64) -> String {
    coordinate_key(latitude, longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_case_and_whitespace() {
        assert_eq!(
            normalize_address("  10   Downing\tStreet,\nLONDON "),
            "10 downing street, london"
        );
    }

    #[test]
    fn address_key_appends_hint_only_when_present() {
        assert_eq!(address_cache_key("Rue de Rivoli ", None), "rue de rivoli");
        assert_eq!(
            address_cache_key("Rue  de Rivoli", Some("FR")),
            "rue de rivoli:fr"
        );
        assert_eq!(address_cache_key("Rue de Rivoli", Some("  ")), "rue de rivoli");
    }

    #[test]
    fn reverse_key_rounds_to_four_decimals() {
        assert_eq!(reverse_cache_key(48.856_61, 2.352_22), "48.8566:2.3522");
        assert_eq!(
            reverse_cache_key(48.856_61, 2.352_22),
            reverse_cache_key(48.856_64, 2.352_19)
        );
    }

    #[tokio::test]
    async fn memory_cache_returns_value_before_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn memory_cache_drops_expired_entries() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), Duration::ZERO).await;
        assert_eq!(cache.get("k").await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn unread_expired_entries_are_swept_by_later_writes() {
        let cache = MemoryCache::new();
        for i in 0..10_000 {
            cache
                .set(&format!("addr-{i}"), "v".to_string(), Duration::ZERO)
                .await;
        }
        cache
            .set("fresh", "v".to_string(), Duration::from_secs(60))
            .await;

        assert!(cache.len() <= SWEEP_EVERY, "len = {}", cache.len());
        assert_eq!(cache.get("fresh").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn purge_keeps_live_entries() {
        let cache = MemoryCache::new();
        cache.set("old", "v".to_string(), Duration::ZERO).await;
        cache
            .set("live", "v".to_string(), Duration::from_secs(60))
            .await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("live").await.as_deref(), Some("v"));
    }
}
