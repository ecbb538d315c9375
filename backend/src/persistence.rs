//! Flat CSV records for route runs, one row appended per run.

use std::{
    fs::{self, OpenOptions},
    path::Path,
};

use serde::Serialize;
use shared::{RouteInfo, RoutePolyline};

pub const ROUTE_INFO_FILE: &str = "route_info_data.csv";
pub const ROUTE_POLYLINE_FILE: &str = "route_polyline_data.csv";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to serialize stations: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct RouteInfoRow<'a> {
    origin: &'a str,
    destination: &'a str,
    waypoints: String,
    distance_km: f64,
    duration_min: f64,
    avg_speed_kph: f64,
    elevation_gain_m: f64,
    max_elevation_m: f64,
    avg_slope: f64,
}

#[derive(Debug, Serialize)]
struct RoutePolylineRow<'a> {
    origin: &'a str,
    destination: &'a str,
    waypoints: String,
    total_stations: usize,
    stations_by_location: String,
    encoded_polyline: &'a str,
}

pub fn append_route_info(path: &Path, info: &RouteInfo) -> Result<(), PersistenceError> {
    let row = RouteInfoRow {
        origin: &info.origin,
        destination: &info.destination,
        waypoints: info.waypoints.join("|"),
        distance_km: info.distance_km,
        duration_min: info.duration_min,
        avg_speed_kph: info.avg_speed_kph,
        elevation_gain_m: info.elevation_gain_m,
        max_elevation_m: info.max_elevation_m,
        avg_slope: info.avg_slope,
    };
    append_row(path, &row)
}

pub fn append_route_polyline(
    path: &Path,
    polyline: &RoutePolyline,
) -> Result<(), PersistenceError> {
    let row = RoutePolylineRow {
        origin: &polyline.origin,
        destination: &polyline.destination,
        waypoints: polyline.waypoints.join("|"),
        total_stations: polyline.total_stations,
        stations_by_location: serde_json::to_string(&polyline.stations_by_location)?,
        encoded_polyline: polyline.encoded_polyline.as_str(),
    };
    append_row(path, &row)
}

/// Appends `row`, writing the header first when the file is new or empty.
fn append_row<R: Serialize>(path: &Path, row: &R) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush().map_err(io_err)?;

    tracing::info!("Route data saved to {}", path.display());
    Ok(())
}
