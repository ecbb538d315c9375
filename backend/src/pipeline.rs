//! End-to-end route processing: directions, elevation statistics, spatial
//! sampling and station lookups, assembled into [`RouteFeatures`].

use shared::{RouteFeatures, RouteInfo, RouteLeg, RoutePolyline, RouteRequest};

use crate::executor::Transport;
use crate::maps::{AvoidList, DEFAULT_ELEVATION_SAMPLES, ElevationStats, MapsClient, MapsError};
use crate::polyline::{self, PolylineError};
use crate::sampling::{DEFAULT_DESIRED_SAMPLES, sample_route_points};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Maps(#[from] MapsError),
    #[error("malformed route path: {0}")]
    Path(#[from] PolylineError),
    #[error("directions returned a route without legs")]
    NoLegs,
    #[error("elevation service returned no samples")]
    EmptyElevationProfile,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Target number of station lookup points along the route.
    pub desired_samples: usize,
    /// Elevation samples requested along the full path.
    pub elevation_samples: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            desired_samples: DEFAULT_DESIRED_SAMPLES,
            elevation_samples: DEFAULT_ELEVATION_SAMPLES,
        }
    }
}

/// Totals derived from the directions legs.
#[derive(Debug, Clone, PartialEq)]
pub struct LegSummary {
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl LegSummary {
    pub fn from_legs(legs: &[RouteLeg]) -> Option<Self> {
        let (first, last) = (legs.first()?, legs.last()?);
        Some(Self {
            origin: first.start_address.clone(),
            destination: last.end_address.clone(),
            waypoints: legs[..legs.len() - 1]
                .iter()
                .map(|leg| leg.end_address.clone())
                .collect(),
            distance_m: legs.iter().map(|leg| leg.distance_m).sum(),
            duration_s: legs.iter().map(|leg| leg.duration_s).sum(),
        })
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    pub fn duration_min(&self) -> f64 {
        self.duration_s / 60.0
    }

    /// Zero-duration routes report 0 km/h.
    pub fn avg_speed_kph(&self) -> f64 {
        if self.duration_s > 0.0 {
            self.distance_m / self.duration_s * 3.6
        } else {
            0.0
        }
    }
}

pub struct RoutePipeline<T> {
    maps: MapsClient<T>,
    settings: PipelineSettings,
}

impl<T: Transport> RoutePipeline<T> {
    pub fn new(maps: MapsClient<T>) -> Self {
        Self {
            maps,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn maps(&self) -> &MapsClient<T> {
        &self.maps
    }

    /// Runs the pipeline and returns only the route summary.
    pub async fn run(
        &self,
        origin: &str,
        destination: &str,
        waypoints: &[String],
    ) -> Result<RouteInfo, PipelineError> {
        let features = self.run_features(origin, destination, waypoints).await?;
        Ok(features.route_info)
    }

    pub async fn run_request(&self, req: &RouteRequest) -> Result<RouteFeatures, PipelineError> {
        self.run_features(&req.origin, &req.destination, &req.waypoints)
            .await
    }

    /// All-or-nothing: the first failing fetch aborts the run.
    pub async fn run_features(
        &self,
        origin: &str,
        destination: &str,
        waypoints: &[String],
    ) -> Result<RouteFeatures, PipelineError> {
        tracing::info!("Running route pipeline {} -> {}", origin, destination);

        let directions = self
            .maps
            .get_directions(origin, destination, waypoints, &AvoidList::none())
            .await?;
        let summary = LegSummary::from_legs(&directions.legs).ok_or(PipelineError::NoLegs)?;
        tracing::info!(
            "Route {} -> {}: {:.1} km, {:.0} min over {} legs",
            summary.origin,
            summary.destination,
            summary.distance_km(),
            summary.duration_min(),
            directions.legs.len()
        );

        let elevations = self
            .maps
            .get_elevation(&directions.encoded_path, self.settings.elevation_samples)
            .await?;
        let elevation =
            ElevationStats::from_samples(&elevations).ok_or(PipelineError::EmptyElevationProfile)?;
        tracing::info!(
            "Elevation gain {:.1} m, max {:.1} m",
            elevation.gain_m,
            elevation.max_m
        );

        let path = polyline::decode(directions.encoded_path.as_str())?;
        let sample_points =
            sample_route_points(&path, summary.distance_km(), self.settings.desired_samples);
        tracing::info!(
            "Sampled {} of {} path points for station lookup",
            sample_points.len(),
            path.len()
        );

        let stations = self.maps.get_nearby_stations(&sample_points).await?;

        let route_info = RouteInfo {
            origin: summary.origin.clone(),
            destination: summary.destination.clone(),
            waypoints: summary.waypoints.clone(),
            distance_km: summary.distance_km(),
            duration_min: summary.duration_min(),
            avg_speed_kph: summary.avg_speed_kph(),
            elevation_gain_m: elevation.gain_m,
            max_elevation_m: elevation.max_m,
            avg_slope: elevation.avg_slope,
        };
        let route_polyline = RoutePolyline {
            origin: summary.origin,
            destination: summary.destination,
            waypoints: summary.waypoints,
            total_stations: stations.total,
            stations_by_location: stations.by_point,
            encoded_polyline: directions.encoded_path,
        };

        tracing::info!("Pipeline execution complete");
        Ok(RouteFeatures {
            route_info,
            route_polyline,
        })
    }
}
