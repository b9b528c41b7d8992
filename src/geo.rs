//! Location sources and reverse geocoding consumed by the save pipeline.

use anyhow::anyhow;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::GeocoderConfig;
use crate::db::Location;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the device's current position.
pub trait LocationSource {
    fn current_location(&self) -> Result<Location, GeoError>;
}

/// Maps coordinates to a human-readable place.
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` means the lookup worked but nothing was found.
    fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<Placemark>, GeoError>;

    /// Name for log output.
    fn name(&self) -> &'static str;
}

/// The parts of a reverse-geocoding result the gallery displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placemark {
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Placemark {
    /// `"<name or street>, <city>"`. `None` if neither name nor street is known.
    pub fn label(&self) -> Option<String> {
        let place = non_empty(&self.name).or_else(|| non_empty(&self.street))?;
        match non_empty(&self.city) {
            Some(city) => Some(format!("{}, {}", place, city)),
            None => Some(place.to_string()),
        }
    }
}

/// A source that always reports the same position, stamped with the time of the call.
pub struct FixedLocation {
    location: Location,
}

impl FixedLocation {
    pub fn new(location: Location) -> Self {
        Self { location }
    }
}

impl LocationSource for FixedLocation {
    fn current_location(&self) -> Result<Location, GeoError> {
        let mut location = self.location.clone();
        if location.timestamp.is_none() {
            location.timestamp = Some(Utc::now().timestamp_millis());
        }
        Ok(location)
    }
}

/// Stands in for a device where location access was refused.
pub struct NoLocation;

impl LocationSource for NoLocation {
    fn current_location(&self) -> Result<Location, GeoError> {
        Err(GeoError::PermissionDenied)
    }
}

/// Reverse geocoding against a Nominatim server.
pub struct NominatimGeocoder {
    endpoint: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<ReverseAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    road: Option<String>,
    pedestrian: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
}

impl ReverseResponse {
    fn into_placemark(self) -> Option<Placemark> {
        if let Some(error) = self.error {
            debug!("Nominatim found no place: {}", error);
            return None;
        }

        let address = self.address?;
        let placemark = Placemark {
            name: self.name,
            street: address.road.or(address.pedestrian),
            city: address
                .city
                .or(address.town)
                .or(address.village)
                .or(address.hamlet),
        };
        Some(placemark)
    }
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build();

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn from_config(config: &GeocoderConfig) -> Self {
        Self::new(
            &config.endpoint,
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn request(&self, latitude: f64, longitude: f64) -> anyhow::Result<ReverseResponse> {
        let url = format!("{}/reverse", self.endpoint);

        let response = self
            .agent
            .get(&url)
            .query("format", "jsonv2")
            .query("lat", &latitude.to_string())
            .query("lon", &longitude.to_string())
            .call()
            .map_err(|e| anyhow!("Reverse geocoding request failed: {}", e))?;

        response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse reverse geocoding response: {}", e))
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<Placemark>, GeoError> {
        let response = self
            .request(latitude, longitude)
            .map_err(|e| GeoError::Unavailable(e.to_string()))?;
        Ok(response.into_placemark())
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placemark(name: Option<&str>, street: Option<&str>, city: Option<&str>) -> Placemark {
        Placemark {
            name: name.map(String::from),
            street: street.map(String::from),
            city: city.map(String::from),
        }
    }

    #[test]
    fn test_label_prefers_name() {
        let p = placemark(Some("City Hall"), Some("Main St"), Some("Springfield"));
        assert_eq!(p.label().as_deref(), Some("City Hall, Springfield"));
    }

    #[test]
    fn test_label_falls_back_to_street() {
        let p = placemark(Some(""), Some("Main St"), Some("Springfield"));
        assert_eq!(p.label().as_deref(), Some("Main St, Springfield"));
    }

    #[test]
    fn test_label_without_city() {
        let p = placemark(None, Some("Main St"), None);
        assert_eq!(p.label().as_deref(), Some("Main St"));
    }

    #[test]
    fn test_label_needs_place() {
        let p = placemark(None, None, Some("Springfield"));
        assert_eq!(p.label(), None);
    }

    #[test]
    fn test_parse_reverse_response() {
        let json = r#"
{
  "place_id": 1234,
  "lat": "39.7817",
  "lon": "-89.6501",
  "category": "highway",
  "type": "residential",
  "name": "",
  "display_name": "Main Street, Springfield, Sangamon County, Illinois, United States",
  "address": {
    "road": "Main Street",
    "city": "Springfield",
    "county": "Sangamon County",
    "state": "Illinois",
    "country": "United States",
    "country_code": "us"
  }
}
"#;
        let response: ReverseResponse = serde_json::from_str(json).unwrap();
        let placemark = response.into_placemark().unwrap();
        assert_eq!(placemark.street.as_deref(), Some("Main Street"));
        assert_eq!(placemark.label().as_deref(), Some("Main Street, Springfield"));
    }

    #[test]
    fn test_parse_reverse_uses_town() {
        let json = r#"{"name":"Old Mill","address":{"town":"Millbrook"}}"#;
        let response: ReverseResponse = serde_json::from_str(json).unwrap();
        let placemark = response.into_placemark().unwrap();
        assert_eq!(placemark.label().as_deref(), Some("Old Mill, Millbrook"));
    }

    #[test]
    fn test_parse_reverse_error() {
        let json = r#"{"error":"Unable to geocode"}"#;
        let response: ReverseResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_placemark().is_none());
    }

    #[test]
    fn test_fixed_location_stamps_time() {
        let source = FixedLocation::new(Location::new(1.0, 2.0));
        let location = source.current_location().unwrap();
        assert_eq!(location.latitude, 1.0);
        assert!(location.timestamp.is_some());

        let preset = FixedLocation::new(Location::new(1.0, 2.0).with_timestamp(42));
        assert_eq!(preset.current_location().unwrap().timestamp, Some(42));
    }

    #[test]
    fn test_no_location_denied() {
        assert!(matches!(NoLocation.current_location(), Err(GeoError::PermissionDenied)));
    }
}
