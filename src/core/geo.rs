//! Geographic points and spherical distance helpers

use crate::core::service::ServiceError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Earth radius used for radius-to-radians conversion, in kilometres
pub const EARTH_RADIUS_KM: f64 = 6378.1;

const COORDINATES_MESSAGE: &str =
    "Coordinates must be an array of two numbers [longitude, latitude].";

/// A WGS84 point. Serialised as a GeoJSON `Point`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting out-of-range or non-finite values
    pub fn new(longitude: f64, latitude: f64) -> Option<Self> {
        let valid = longitude.is_finite()
            && latitude.is_finite()
            && (-180.0..=180.0).contains(&longitude)
            && (-90.0..=90.0).contains(&latitude);
        valid.then_some(Self {
            longitude,
            latitude,
        })
    }

    /// Parse request input.
    ///
    /// Accepts `[lng, lat]` or `{"type": "Point", "coordinates": [lng, lat]}`, with
    /// numbers or numeric strings. Empty input (`null`, `""`, `[]`, `{}`) yields
    /// `Ok(None)`, which callers treat as "no coordinates".
    pub fn from_json(value: &Value) -> Result<Option<Self>, ServiceError> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::Array(items) if items.is_empty() => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            Value::Array(items) => Self::from_pair(items).map(Some),
            Value::Object(map) => {
                if let Some(kind) = map.get("type") {
                    if kind.as_str() != Some("Point") {
                        return Err(ServiceError::Validation(
                            "Coordinates type must be \"Point\".".to_string(),
                        ));
                    }
                }
                match map.get("coordinates") {
                    Some(Value::Array(items)) if items.is_empty() => Ok(None),
                    Some(Value::Array(items)) => Self::from_pair(items).map(Some),
                    _ => Err(ServiceError::Validation(COORDINATES_MESSAGE.to_string())),
                }
            }
            _ => Err(ServiceError::Validation(COORDINATES_MESSAGE.to_string())),
        }
    }

    fn from_pair(items: &[Value]) -> Result<Self, ServiceError> {
        if items.len() != 2 {
            return Err(ServiceError::Validation(COORDINATES_MESSAGE.to_string()));
        }
        let longitude = lenient_number(&items[0]);
        let latitude = lenient_number(&items[1]);
        match (longitude, latitude) {
            (Some(lng), Some(lat)) => Self::new(lng, lat).ok_or_else(|| {
                ServiceError::Validation(
                    "Longitude must be within [-180, 180] and latitude within [-90, 90].".to_string(),
                )
            }),
            _ => Err(ServiceError::Validation(
                "Longitude and latitude must be numbers.".to_string(),
            )),
        }
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut point = serializer.serialize_struct("Point", 2)?;
        point.serialize_field("type", "Point")?;
        point.serialize_field("coordinates", &[self.longitude, self.latitude])?;
        point.end()
    }
}

fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Parse a `lat,lng` query value
pub fn parse_latlng(raw: &str) -> Option<(f64, f64)> {
    let (lat, lng) = raw.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lng = lng.trim().parse::<f64>().ok()?;
    (lat.is_finite() && lng.is_finite()).then_some((lat, lng))
}

/// Great-circle angle between two points in radians (haversine)
pub fn central_angle(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    central_angle(a, b) * EARTH_RADIUS_KM
}
