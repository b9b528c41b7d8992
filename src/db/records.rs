//! Types stored in the `images` table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A geographic fix as reported by the device.
///
/// Persisted as JSON in the `location` column. Keys this type does not know
/// about are kept in `extra` so platform metadata survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    /// Horizontal accuracy in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
            timestamp: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    /// Name of the first numeric field that is NaN or infinite. JSON has no
    /// encoding for those, so such a location could never be read back.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        let optional = [
            ("altitude", self.altitude),
            ("accuracy", self.accuracy),
            ("altitudeAccuracy", self.altitude_accuracy),
            ("heading", self.heading),
            ("speed", self.speed),
        ];

        [("latitude", Some(self.latitude)), ("longitude", Some(self.longitude))]
            .into_iter()
            .chain(optional)
            .find(|(_, value)| value.is_some_and(|v| !v.is_finite()))
            .map(|(name, _)| name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// One saved capture.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub uri: String,
    pub location: Option<Location>,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_location_json() {
        let json = Location::new(1.0, 2.0).to_json().unwrap();
        assert_eq!(json, r#"{"latitude":1.0,"longitude":2.0}"#);
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let text = r#"{"latitude":51.5,"longitude":-0.12,"accuracy":5.0,"mocked":false,"provider":"gps"}"#;
        let location = Location::from_json(text).unwrap();

        assert_eq!(location.accuracy, Some(5.0));
        assert_eq!(location.extra.get("mocked"), Some(&serde_json::Value::Bool(false)));
        assert_eq!(location.extra.len(), 2);

        let again = Location::from_json(&location.to_json().unwrap()).unwrap();
        assert_eq!(again, location);
    }

    #[test]
    fn test_camel_case_fields() {
        let text = r#"{"latitude":0.0,"longitude":0.0,"altitudeAccuracy":3.5}"#;
        let location = Location::from_json(text).unwrap();
        assert_eq!(location.altitude_accuracy, Some(3.5));
        assert!(location.extra.is_empty());
    }

    #[test]
    fn test_non_finite_field() {
        assert_eq!(Location::new(1.0, 2.0).non_finite_field(), None);
        assert_eq!(Location::new(f64::NAN, 2.0).non_finite_field(), Some("latitude"));
        assert_eq!(Location::new(1.0, f64::INFINITY).non_finite_field(), Some("longitude"));

        let mut location = Location::new(1.0, 2.0);
        location.speed = Some(f64::NEG_INFINITY);
        assert_eq!(location.non_finite_field(), Some("speed"));
    }

    #[test]
    fn test_missing_coordinates_rejected() {
        assert!(Location::from_json(r#"{"latitude":1.0}"#).is_err());
    }
}
