//! End-to-end search through `SearchService` on the in-memory backend.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use geoprop_core::{
    BoundingBox, ClusterOptions, LocalizedText, PropertyDocument, PropertyStatus, SearchFilters,
    SearchOptions, SortSpec,
};
use geoprop_search::{MemoryBackend, PropertyIndex, SearchService};

fn listing(id: &str, city: &str, price: f64, coords: (f64, f64)) -> PropertyDocument {
    let ts = Utc.with_ymd_and_hms(2024, 2, 10, 8, 30, 0).unwrap();
    let mut title = LocalizedText::new();
    title.insert("en".to_string(), format!("Home {id}"));
    title.insert("es".to_string(), format!("Casa {id}"));
    let mut description = LocalizedText::new();
    description.insert("de".to_string(), "Nur auf Deutsch".to_string());
    PropertyDocument {
        id: id.to_string(),
        owner_id: "owner-7".to_string(),
        status: PropertyStatus::Listed,
        property_type: "apartment".to_string(),
        price,
        currency: "EUR".to_string(),
        latitude: Some(coords.0),
        longitude: Some(coords.1),
        street: None,
        postal_code: None,
        city: Some(city.to_string()),
        region: None,
        country: Some("FR".to_string()),
        media_urls: vec![format!("https://cdn.example.com/{id}.jpg")],
        title,
        description,
        created_at: ts,
        updated_at: ts,
        published_at: Some(ts),
    }
}

async fn service() -> SearchService {
    let index = PropertyIndex::new(Arc::new(MemoryBackend::new()));
    index.initialize().await.expect("memory index init");
    index
        .index_properties(&[
            listing("p-100", "Paris", 100_000.0, (48.8566, 2.3522)),
            listing("p-300", "Paris", 300_000.0, (48.8606, 2.3376)),
            listing("p-200", "Paris", 200_000.0, (48.8530, 2.3499)),
            listing("l-150", "Lyon", 150_000.0, (45.7640, 4.8357)),
        ])
        .await
        .expect("seed");
    let mut draft = listing("p-draft", "Paris", 250_000.0, (48.85, 2.35));
    draft.status = PropertyStatus::Draft;
    index.index_property(&draft).await.expect("seed draft");
    SearchService::new(index, "en")
}

fn paris() -> SearchFilters {
    SearchFilters {
        city: Some("Paris".to_string()),
        ..SearchFilters::default()
    }
}

#[tokio::test]
async fn paris_sorted_by_price_desc() {
    let service = service().await;
    let options = SearchOptions {
        sort: SortSpec::parse_list("price:desc").unwrap(),
        ..SearchOptions::default()
    };

    let response = service
        .search_properties("", &paris(), &options, None)
        .await
        .unwrap();

    let prices: Vec<f64> = response.properties.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![300_000.0, 200_000.0, 100_000.0]);
    assert_eq!(response.total, 3);
    assert_eq!(response.limit, 20);
    assert_eq!(response.offset, 0);
    assert_eq!(response.query, "");
}

#[tokio::test]
async fn default_sort_is_price_ascending() {
    let service = service().await;
    let response = service
        .search_properties("", &paris(), &SearchOptions::default(), None)
        .await
        .unwrap();
    let ids: Vec<&str> = response.properties.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p-100", "p-200", "p-300"]);
}

#[tokio::test]
async fn accept_language_selects_title_and_falls_back_per_field() {
    let service = service().await;
    let response = service
        .search_properties("", &paris(), &SearchOptions::default(), Some("es-ES,es;q=0.9,en;q=0.8"))
        .await
        .unwrap();

    let first = &response.properties[0];
    assert_eq!(first.title, "Casa p-100");
    assert_eq!(first.description, "Nur auf Deutsch");
}

#[tokio::test]
async fn explicit_language_beats_header() {
    let service = service().await;
    let options = SearchOptions {
        language: Some("en".to_string()),
        ..SearchOptions::default()
    };
    let response = service
        .search_properties("", &paris(), &options, Some("es"))
        .await
        .unwrap();
    assert_eq!(response.properties[0].title, "Home p-100");
}

#[tokio::test]
async fn radius_filter_excludes_other_cities() {
    let service = service().await;
    let filters = SearchFilters {
        latitude: Some(48.8566),
        longitude: Some(2.3522),
        radius_km: Some(10.0),
        ..SearchFilters::default()
    };
    let response = service
        .search_properties("", &filters, &SearchOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(response.total, 3);
    assert!(response
        .properties
        .iter()
        .all(|p| p.city.as_deref() == Some("Paris")));
}

#[tokio::test]
async fn clusters_group_paris_and_honor_bbox() {
    let service = service().await;
    let options = ClusterOptions::for_zoom(5.0);

    let clusters = service.clusters("", None, &options, "en").await.unwrap();
    let total: usize = clusters.iter().map(|c| c.count).sum();
    assert_eq!(total, 4);
    assert_eq!(clusters[0].count, 3);
    assert_eq!(clusters[0].properties.as_ref().map(Vec::len), Some(3));

    let around_lyon = BoundingBox {
        min_lat: 45.0,
        min_lon: 4.0,
        max_lat: 46.0,
        max_lon: 5.5,
    };
    let clusters = service
        .clusters("", Some(around_lyon), &options, "en")
        .await
        .unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].count, 1);
    assert!((clusters[0].lat - 45.764).abs() < 1e-9);
}
