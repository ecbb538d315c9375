use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// WGS84 position in decimal degrees. Serialized with the Maps `lat`/`lng`
/// keys; `lon` is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    #[serde(rename = "lng", alias = "lon")]
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Compact polyline string as returned by the directions service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPath(String);

impl EncodedPath {
    pub fn new(points: impl Into<String>) -> Self {
        Self(points.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for EncodedPath {
    fn from(points: String) -> Self {
        Self(points)
    }
}

impl From<&str> for EncodedPath {
    fn from(points: &str) -> Self {
        Self(points.to_string())
    }
}

impl fmt::Display for EncodedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One origin-to-waypoint (or waypoint-to-destination) segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub start_address: String,
    pub end_address: String,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Fuel station returned by a nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub location: Coordinate,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
}

/// Sample-point index to the stations found around that point.
pub type StationsByLocation = BTreeMap<usize, Vec<Station>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    pub distance_km: f64,
    pub duration_min: f64,
    pub avg_speed_kph: f64,
    pub elevation_gain_m: f64,
    pub max_elevation_m: f64,
    /// Elevation gain divided by the number of elevation samples.
    pub avg_slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePolyline {
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    pub total_stations: usize,
    pub stations_by_location: StationsByLocation,
    pub encoded_polyline: EncodedPath,
}

/// Both records produced by one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFeatures {
    pub route_info: RouteInfo,
    pub route_polyline: RoutePolyline,
}

/// Address or "lat,lng" strings accepted by the directions service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub waypoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
