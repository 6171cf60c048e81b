//! One-off geocoding lookups against the configured provider.

use geoprop_core::{geo::round_to, AppConfig};
use geoprop_geocode::GeocodeService;

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn run_geocode(
    config: &AppConfig,
    address: &str,
    country: Option<&str>,
) -> anyhow::Result<()> {
    let service = GeocodeService::from_config(config)?;
    match service.geocode(address, country).await? {
        Some(result) => print_json(&result),
        None => {
            println!("no match for {address:?}");
            Ok(())
        }
    }
}

pub(crate) async fn run_reverse(config: &AppConfig, lat: f64, lon: f64) -> anyhow::Result<()> {
    let service = GeocodeService::from_config(config)?;
    match service.reverse_geocode(lat, lon).await? {
        Some(result) => print_json(&result),
        None => {
            println!("no address found at {lat}, {lon}");
            Ok(())
        }
    }
}

pub(crate) fn run_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> anyhow::Result<()> {
    let km = GeocodeService::calculate_distance(lat1, lon1, lat2, lon2)?;
    println!("{:.2} km", round_to(km, 2));
    Ok(())
}
