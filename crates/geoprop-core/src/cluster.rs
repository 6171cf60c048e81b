//! Zoom-dependent grid clustering for map markers.
//!
//! Documents are bucketed into square lat/lng cells whose size halves with
//! every zoom level. Each occupied cell becomes one marker at the centroid of
//! its members. When there are more cells than the caller can draw, the
//! smallest ones are folded into a single overflow marker.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::geo::BoundingBox;
use crate::property::PropertyDocument;

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 20.0;
pub const MIN_CELL_SIZE_DEG: f64 = 0.0001;
pub const DEFAULT_INCLUSION_THRESHOLD: usize = 5;
pub const DEFAULT_MAX_CLUSTERS: usize = 100;

/// Anything with an optional position.
pub trait GeoTagged {
    /// `(latitude, longitude)` in degrees, or `None` when unplaced.
    fn position(&self) -> Option<(f64, f64)>;
}

impl GeoTagged for PropertyDocument {
    fn position(&self) -> Option<(f64, f64)> {
        self.coordinates()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    pub zoom: f64,
    pub max_clusters: usize,
    /// Clusters at or below this size carry their member documents.
    pub inclusion_threshold: usize,
}

impl ClusterOptions {
    #[must_use]
    pub fn for_zoom(zoom: f64) -> Self {
        Self {
            zoom,
            ..Self::default()
        }
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            zoom: MIN_ZOOM,
            max_clusters: DEFAULT_MAX_CLUSTERS,
            inclusion_threshold: DEFAULT_INCLUSION_THRESHOLD,
        }
    }
}

/// One map marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterPoint<T> {
    pub lat: f64,
    pub lng: f64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<T>>,
}

/// Grid cell edge in degrees for a zoom level. NaN zoom is treated as fully zoomed out.
#[must_use]
pub fn cell_size(zoom: f64) -> f64 {
    let zoom = if zoom.is_nan() {
        MIN_ZOOM
    } else {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    };
    (1.0 / 2f64.powf(zoom - 1.0)).max(MIN_CELL_SIZE_DEG)
}

#[allow(clippy::cast_possible_truncation)]
fn cell_index(value: f64, size: f64) -> i64 {
    (value / size).floor() as i64
}

/// Clusters `documents` for display at `options.zoom`.
///
/// Documents without a finite position are skipped. Output is sorted by
/// count, largest first; ties keep grid order so results are reproducible.
#[must_use]
pub fn cluster_documents<T>(documents: &[T], options: &ClusterOptions) -> Vec<ClusterPoint<T>>
where
    T: GeoTagged + Clone,
{
    let size = cell_size(options.zoom);

    let mut cells: BTreeMap<(i64, i64), Vec<(&T, f64, f64)>> = BTreeMap::new();
    for doc in documents {
        let Some((lat, lng)) = doc.position() else {
            continue;
        };
        if !lat.is_finite() || !lng.is_finite() {
            continue;
        }
        cells
            .entry((cell_index(lat, size), cell_index(lng, size)))
            .or_default()
            .push((doc, lat, lng));
    }

    let mut clusters: Vec<ClusterPoint<T>> = cells
        .into_values()
        .map(|members| {
            let count = members.len();
            #[allow(clippy::cast_precision_loss)]
            let n = count as f64;
            let lat = members.iter().map(|(_, lat, _)| lat).sum::<f64>() / n;
            let lng = members.iter().map(|(_, _, lng)| lng).sum::<f64>() / n;
            let properties = (count <= options.inclusion_threshold)
                .then(|| members.iter().map(|(doc, _, _)| (*doc).clone()).collect());
            ClusterPoint {
                lat,
                lng,
                count,
                properties,
            }
        })
        .collect();

    clusters.sort_by(|a, b| b.count.cmp(&a.count));
    merge_overflow(clusters, options.max_clusters)
}

/// Restricts clustering to documents inside `bbox`.
#[must_use]
pub fn cluster_within_bounds<T>(
    documents: &[T],
    bbox: &BoundingBox,
    options: &ClusterOptions,
) -> Vec<ClusterPoint<T>>
where
    T: GeoTagged + Clone,
{
    let inside: Vec<T> = documents
        .iter()
        .filter(|doc| {
            doc.position()
                .is_some_and(|(lat, lng)| bbox.contains(lat, lng))
        })
        .cloned()
        .collect();
    cluster_documents(&inside, options)
}

/// Keeps the `max_clusters - 1` largest clusters and folds the rest into one
/// overflow cluster at their count-weighted centroid. Input must already be
/// sorted by count descending.
///
/// Every folded cluster contributes its whole count, so the output total always
/// equals the input total: `[10, 8, 5, 3, 1]` with a limit of 3 becomes
/// `[10, 8, 9]`, not `[10, 8, 4]`.
fn merge_overflow<T>(mut clusters: Vec<ClusterPoint<T>>, max_clusters: usize) -> Vec<ClusterPoint<T>> {
    if max_clusters == 0 || clusters.len() <= max_clusters {
        return clusters;
    }

    let overflow = clusters.split_off(max_clusters - 1);
    let count: usize = overflow.iter().map(|c| c.count).sum();
    #[allow(clippy::cast_precision_loss)]
    let (lat_sum, lng_sum) = overflow.iter().fold((0.0, 0.0), |(lat, lng), c| {
        let weight = c.count as f64;
        (lat + c.lat * weight, lng + c.lng * weight)
    });
    #[allow(clippy::cast_precision_loss)]
    let total = count as f64;

    clusters.push(ClusterPoint {
        lat: lat_sum / total,
        lng: lng_sum / total,
        count,
        properties: None,
    });
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pin {
        id: u32,
        lat: Option<f64>,
        lng: Option<f64>,
    }

    impl GeoTagged for Pin {
        fn position(&self) -> Option<(f64, f64)> {
            Some((self.lat?, self.lng?))
        }
    }

    fn pin(id: u32, lat: f64, lng: f64) -> Pin {
        Pin {
            id,
            lat: Some(lat),
            lng: Some(lng),
        }
    }

    /// `n` pins spread inside the 1° cell whose south-west corner is `(lat, lng)`.
    fn cell_pins(start_id: u32, n: u32, lat: f64, lng: f64) -> Vec<Pin> {
        (0..n)
            .map(|i| pin(start_id + i, lat + 0.1 + f64::from(i) * 0.01, lng + 0.5))
            .collect()
    }

    #[test]
    fn no_valid_documents_yields_no_clusters() {
        let pins = vec![
            Pin {
                id: 1,
                lat: None,
                lng: Some(2.0),
            },
            pin(2, f64::NAN, 2.0),
        ];
        assert!(cluster_documents(&pins, &ClusterOptions::for_zoom(10.0)).is_empty());
        assert!(cluster_documents::<Pin>(&[], &ClusterOptions::default()).is_empty());
    }

    #[test]
    fn single_document_is_its_own_cluster() {
        let pins = vec![pin(1, 48.8566, 2.3522)];
        let clusters = cluster_documents(&pins, &ClusterOptions::for_zoom(12.0));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 1);
        assert_eq!(clusters[0].lat, 48.8566);
        assert_eq!(clusters[0].lng, 2.3522);
        assert_eq!(clusters[0].properties.as_deref(), Some(&pins[..]));
    }

    #[test]
    fn cell_size_halves_per_zoom_and_is_floored() {
        assert_eq!(cell_size(1.0), 1.0);
        assert_eq!(cell_size(2.0), 0.5);
        assert_eq!(cell_size(20.0), MIN_CELL_SIZE_DEG);
    }

    #[test]
    fn out_of_range_zoom_is_clamped() {
        assert_eq!(cell_size(-4.0), cell_size(1.0));
        assert_eq!(cell_size(35.0), cell_size(20.0));
        assert_eq!(cell_size(f64::NAN), cell_size(1.0));
    }

    #[test]
    fn points_a_metre_apart_share_a_cluster_at_max_zoom() {
        // ~1.1 m apart in latitude.
        let pins = vec![pin(1, 48.856_61, 2.352_21), pin(2, 48.856_62, 2.352_21)];
        let clusters = cluster_documents(&pins, &ClusterOptions::for_zoom(20.0));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 2);
    }

    #[test]
    fn distant_points_at_min_zoom_follow_cell_formula() {
        let paris = (48.8566, 2.3522);
        let rome = (41.9028, 12.4964);
        let size = cell_size(1.0);
        let same_cell = cell_index(paris.0, size) == cell_index(rome.0, size)
            && cell_index(paris.1, size) == cell_index(rome.1, size);
        let expected = if same_cell { 1 } else { 2 };

        let pins = vec![pin(1, paris.0, paris.1), pin(2, rome.0, rome.1)];
        let clusters = cluster_documents(&pins, &ClusterOptions::for_zoom(1.0));
        assert_eq!(clusters.len(), expected);
    }

    #[test]
    fn centroid_is_mean_of_members() {
        let pins = vec![pin(1, 10.2, 20.2), pin(2, 10.4, 20.6)];
        let clusters = cluster_documents(&pins, &ClusterOptions::for_zoom(1.0));
        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].lat - 10.3).abs() < 1e-9);
        assert!((clusters[0].lng - 20.4).abs() < 1e-9);
    }

    #[test]
    fn large_clusters_omit_members() {
        let pins = cell_pins(0, 6, 10.0, 20.0);
        let clusters = cluster_documents(&pins, &ClusterOptions::for_zoom(1.0));
        assert_eq!(clusters[0].count, 6);
        assert!(clusters[0].properties.is_none());
    }

    #[test]
    fn clusters_are_sorted_by_count_descending() {
        let mut pins = cell_pins(0, 2, 10.0, 20.0);
        pins.extend(cell_pins(100, 4, 30.0, 40.0));
        pins.extend(cell_pins(200, 3, -10.0, -20.0));
        let counts: Vec<usize> = cluster_documents(&pins, &ClusterOptions::for_zoom(1.0))
            .iter()
            .map(|c| c.count)
            .collect();
        assert_eq!(counts, vec![4, 3, 2]);
    }

    #[test]
    fn overflow_clusters_are_merged_with_weighted_centroid() {
        let mut pins = cell_pins(0, 10, 10.0, 10.0);
        pins.extend(cell_pins(100, 8, 20.0, 20.0));
        pins.extend(cell_pins(200, 5, 30.0, 30.0));
        pins.extend(cell_pins(300, 3, 40.0, 40.0));
        pins.extend(cell_pins(400, 1, 50.0, 50.0));

        let options = ClusterOptions {
            zoom: 1.0,
            max_clusters: 5,
            inclusion_threshold: DEFAULT_INCLUSION_THRESHOLD,
        };
        let unmerged = cluster_documents(&pins, &options);
        assert_eq!(unmerged.len(), 5);

        let merged = cluster_documents(
            &pins,
            &ClusterOptions {
                max_clusters: 3,
                ..options
            },
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], unmerged[0]);
        assert_eq!(merged[1], unmerged[1]);

        let overflow = &merged[2];
        assert_eq!(overflow.count, 5 + 3 + 1);
        assert!(overflow.properties.is_none());
        let expected_lat = unmerged[2..]
            .iter()
            .map(|c| c.lat * c.count as f64)
            .sum::<f64>()
            / 9.0;
        assert!((overflow.lat - expected_lat).abs() < 1e-9);

        let total: usize = merged.iter().map(|c| c.count).sum();
        assert_eq!(total, pins.len());
    }

    #[test]
    fn bounding_box_variant_filters_first() {
        let pins = vec![pin(1, 48.85, 2.35), pin(2, 51.5, -0.12)];
        let bbox = BoundingBox {
            min_lat: 48.0,
            min_lon: 2.0,
            max_lat: 49.0,
            max_lon: 3.0,
        };
        let clusters = cluster_within_bounds(&pins, &bbox, &ClusterOptions::for_zoom(5.0));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].properties.as_ref().map(|p| p[0].id), Some(1));
    }
}
