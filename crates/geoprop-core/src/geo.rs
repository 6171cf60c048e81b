//! Great-circle distance and coordinate validation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Upper bound accepted for any search radius (roughly half the circumference).
pub const MAX_RADIUS_KM: f64 = 20_000.0;

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if either value is non-finite or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        validate_latitude(latitude)?;
        validate_longitude(longitude)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[must_use]
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Rectangular geographic filter. Does not wrap across the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// # Errors
    ///
    /// Returns [`ValidationError`] for out-of-range corners or an inverted box.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_latitude(self.min_lat)?;
        validate_latitude(self.max_lat)?;
        validate_longitude(self.min_lon)?;
        validate_longitude(self.max_lon)?;
        if self.min_lat > self.max_lat {
            return Err(ValidationError::InvertedBoundingBox(format!(
                "min latitude {} > max latitude {}",
                self.min_lat, self.max_lat
            )));
        }
        if self.min_lon > self.max_lon {
            return Err(ValidationError::InvertedBoundingBox(format!(
                "min longitude {} > max longitude {}",
                self.min_lon, self.max_lon
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }
}

/// Haversine great-circle distance between two points, degrees in, kilometres out.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Rounds `value` to `decimals` places. Used at API boundaries only.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Stable cache-key fragment for a coordinate: 4 decimal places, about an 11 m cell.
#[must_use]
pub fn coordinate_key(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.4}:{longitude:.4}")
}

/// # Errors
///
/// Returns [`ValidationError::LatitudeOutOfRange`] for NaN, infinities, or |lat| > 90.
pub fn validate_latitude(latitude: f64) -> Result<(), ValidationError> {
    if latitude.is_finite() && (-90.0..=90.0).contains(&latitude) {
        Ok(())
    } else {
        Err(ValidationError::LatitudeOutOfRange(latitude))
    }
}

/// # Errors
///
/// Returns [`ValidationError::LongitudeOutOfRange`] for NaN, infinities, or |lon| > 180.
pub fn validate_longitude(longitude: f64) -> Result<(), ValidationError> {
    if longitude.is_finite() && (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(ValidationError::LongitudeOutOfRange(longitude))
    }
}

/// # Errors
///
/// Returns [`ValidationError::InvalidRadius`] unless `0 < radius_km <= MAX_RADIUS_KM`.
pub fn validate_radius_km(radius_km: f64) -> Result<(), ValidationError> {
    if radius_km.is_finite() && radius_km > 0.0 && radius_km <= MAX_RADIUS_KM {
        Ok(())
    } else {
        Err(ValidationError::InvalidRadius {
            value: radius_km,
            max: MAX_RADIUS_KM,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: (f64, f64) = (48.8566, 2.3522);
    const LONDON: (f64, f64) = (51.5074, -0.1278);

    #[test]
    fn distance_to_self_is_zero() {
        for (lat, lon) in [PARIS, LONDON, (0.0, 0.0), (-33.8688, 151.2093), (90.0, 180.0)] {
            assert_eq!(haversine_km(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (PARIS, LONDON),
            ((40.7128, -74.006), (34.0522, -118.2437)),
            ((-33.8688, 151.2093), (35.6762, 139.6503)),
        ];
        for (a, b) in pairs {
            let ab = haversine_km(a.0, a.1, b.0, b.1);
            let ba = haversine_km(b.0, b.1, a.0, a.1);
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }
    }

    #[test]
    fn paris_to_london_is_about_344_km() {
        let d = haversine_km(PARIS.0, PARIS.1, LONDON.0, LONDON.1);
        assert!((343.0..=345.0).contains(&d), "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        let half = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((d - half).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn coordinates_reject_out_of_range_values() {
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn radius_must_be_positive_and_bounded() {
        assert!(validate_radius_km(0.0).is_err());
        assert!(validate_radius_km(-1.0).is_err());
        assert!(validate_radius_km(25_000.0).is_err());
        assert!(validate_radius_km(5.0).is_ok());
    }

    #[test]
    fn coordinate_key_rounds_to_four_places() {
        assert_eq!(coordinate_key(48.856_613, 2.352_222), "48.8566:2.3522");
        assert_eq!(coordinate_key(-33.868_82, 151.2093), "-33.8688:151.2093");
    }

    #[test]
    fn round_to_two_decimals() {
        assert!((round_to(343.556_1, 2) - 343.56).abs() < f64::EPSILON);
        assert!((round_to(0.004, 2)).abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_box_validation_and_containment() {
        let bbox = BoundingBox {
            min_lat: 48.0,
            min_lon: 2.0,
            max_lat: 49.0,
            max_lon: 3.0,
        };
        assert!(bbox.validate().is_ok());
        assert!(bbox.contains(PARIS.0, PARIS.1));
        assert!(!bbox.contains(LONDON.0, LONDON.1));

        let inverted = BoundingBox {
            min_lat: 49.5,
            ..bbox
        };
        assert!(matches!(
            inverted.validate(),
            Err(ValidationError::InvertedBoundingBox(_))
        ));
    }
}
