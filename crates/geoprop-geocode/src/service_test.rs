use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::types::BatchSummary;

/// Provider double that counts calls and answers from a fixed script.
#[derive(Default)]
struct CountingProvider {
    forward_calls: AtomicUsize,
    reverse_calls: AtomicUsize,
}

impl CountingProvider {
    fn forward_calls(&self) -> usize {
        self.forward_calls.load(Ordering::SeqCst)
    }

    fn reverse_calls(&self) -> usize {
        self.reverse_calls.load(Ordering::SeqCst)
    }
}

fn paris() -> GeocodeResult {
    GeocodeResult {
        latitude: 48.8566,
        longitude: 2.3522,
        formatted_address: "Paris, France".to_string(),
        street: None,
        postal_code: None,
        city: Some("Paris".to_string()),
        region: None,
        country: Some("France".to_string()),
        country_code: Some("FR".to_string()),
        confidence: 0.7,
    }
}

#[async_trait]
impl GeocodingProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn geocode(
        &self,
        address: &str,
        _country_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        let lowered = address.to_lowercase();
        if lowered.contains("boom") {
            return Err(GeocodeError::Upstream {
                provider: "counting",
                message: "provider exploded".to_string(),
                retriable: false,
            });
        }
        if lowered.contains("nowhere") {
            return Ok(None);
        }
        if lowered.contains("slow") {
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        Ok(Some(GeocodeResult {
            formatted_address: address.to_string(),
            ..paris()
        }))
    }

    async fn reverse_geocode(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Option<ReverseGeocodeResult>, GeocodeError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(paris().into()))
    }
}

fn service_with(provider: &Arc<CountingProvider>) -> (GeocodeService, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let service = GeocodeService::new(
        Arc::clone(provider) as Arc<dyn GeocodingProvider>,
        Arc::clone(&cache) as Arc<dyn GeocodeCache>,
        Duration::from_secs(3600),
    );
    (service, cache)
}

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
    let provider = Arc::new(CountingProvider::default());
    let (service, _) = service_with(&provider);

    let first = service.geocode("1 Rue de Rivoli, Paris", None).await.unwrap();
    let second = service
        .geocode("  1 rue DE   rivoli, paris ", None)
        .await
        .unwrap();

    assert_eq!(provider.forward_calls(), 1);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn country_hint_is_part_of_the_key() {
    let provider = Arc::new(CountingProvider::default());
    let (service, _) = service_with(&provider);

    service.geocode("Paris", Some("FR")).await.unwrap();
    service.geocode("Paris", Some("US")).await.unwrap();
    service.geocode("Paris", Some("fr")).await.unwrap();

    assert_eq!(provider.forward_calls(), 2);
}

#[tokio::test]
async fn misses_are_never_cached() {
    let provider = Arc::new(CountingProvider::default());
    let (service, cache) = service_with(&provider);

    assert_eq!(service.geocode("Nowhere", None).await.unwrap(), None);
    assert_eq!(service.geocode("Nowhere", None).await.unwrap(), None);

    assert_eq!(provider.forward_calls(), 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn corrupt_cache_entry_is_treated_as_miss_and_replaced() {
    let provider = Arc::new(CountingProvider::default());
    let (service, cache) = service_with(&provider);
    cache
        .set("geocode:paris", "{not json".to_string(), Duration::from_secs(60))
        .await;

    let result = service.geocode("Paris", None).await.unwrap().unwrap();
    assert_eq!(result.formatted_address, "Paris");
    assert_eq!(provider.forward_calls(), 1);

    service.geocode("Paris", None).await.unwrap();
    assert_eq!(provider.forward_calls(), 1);
}

#[tokio::test]
async fn reverse_lookups_share_a_rounded_cell() {
    let provider = Arc::new(CountingProvider::default());
    let (service, _) = service_with(&provider);

    service.reverse_geocode(48.856_61, 2.352_21).await.unwrap();
    service.reverse_geocode(48.856_63, 2.352_24).await.unwrap();

    assert_eq!(provider.reverse_calls(), 1);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_the_provider() {
    let provider = Arc::new(CountingProvider::default());
    let (service, _) = service_with(&provider);

    let err = service.reverse_geocode(91.0, 0.0).await.unwrap_err();
    assert!(matches!(
        err,
        GeocodeError::Validation(ValidationError::LatitudeOutOfRange(_))
    ));
    let err = service.geocode("   ", None).await.unwrap_err();
    assert!(matches!(err, GeocodeError::Validation(_)));

    assert_eq!(provider.forward_calls(), 0);
    assert_eq!(provider.reverse_calls(), 0);
}

#[test]
fn distance_validates_and_matches_haversine() {
    let d = GeocodeService::calculate_distance(48.8566, 2.3522, 51.5074, -0.1278).unwrap();
    assert!((343.0..345.0).contains(&d), "got {d}");
    assert_eq!(
        GeocodeService::calculate_distance(10.0, 10.0, 10.0, 10.0).unwrap(),
        0.0
    );
    assert!(GeocodeService::calculate_distance(0.0, 181.0, 0.0, 0.0).is_err());
}

fn item(id: &str, address: &str) -> BatchGeocodeItem {
    BatchGeocodeItem {
        id: id.to_string(),
        address: address.to_string(),
        country_hint: None,
    }
}

#[tokio::test]
async fn batch_isolates_failures_and_keeps_order() {
    let provider = Arc::new(CountingProvider::default());
    let (service, _) = service_with(&provider);
    let service = service.with_batch_concurrency(4);

    let outcomes = service
        .batch_geocode(vec![
            item("a", "slow Berlin"),
            item("b", "boom"),
            item("c", "Nowhere"),
            item("d", ""),
            item("e", "Madrid"),
        ])
        .await
        .unwrap();

    let ids: Vec<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);

    assert!(outcomes[0].result.is_some() && outcomes[0].error.is_none());
    assert!(outcomes[1].result.is_none());
    assert!(outcomes[1]
        .error
        .as_deref()
        .unwrap()
        .contains("provider exploded"));
    assert!(outcomes[2].result.is_none() && outcomes[2].error.is_none());
    assert!(outcomes[3].error.is_some());
    assert_eq!(
        outcomes[4].result.as_ref().unwrap().formatted_address,
        "Madrid"
    );

    assert_eq!(
        BatchSummary::from_outcomes(&outcomes),
        BatchSummary {
            total: 5,
            succeeded: 2,
            not_found: 1,
            failed: 2,
        }
    );
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let provider = Arc::new(CountingProvider::default());
    let (service, _) = service_with(&provider);
    let items = (0..=MAX_BATCH_SIZE)
        .map(|i| item(&i.to_string(), "Paris"))
        .collect();

    let err = service.batch_geocode(items).await.unwrap_err();
    assert!(matches!(err, GeocodeError::Validation(_)));
    assert_eq!(provider.forward_calls(), 0);
}

#[tokio::test]
async fn nearby_without_catalog_is_empty_but_still_validated() {
    let provider = Arc::new(CountingProvider::default());
    let (service, _) = service_with(&provider);
    let mut query = NearbyQuery {
        latitude: 48.8566,
        longitude: 2.3522,
        radius_km: 5.0,
        limit: 20,
        offset: 0,
        status: None,
    };

    let results = service.nearby_search(&query).await.unwrap();
    assert!(results.properties.is_empty());
    assert_eq!(results.total, 0);

    query.radius_km = 0.0;
    assert!(service.nearby_search(&query).await.is_err());
}
