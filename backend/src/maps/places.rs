use std::time::Duration;

use serde::Deserialize;
use shared::{Coordinate, Station, StationsByLocation};

use super::{MapsClient, MapsError, ensure_status};
use crate::executor::{ApiRequest, Transport};

/// Nearby-search settings applied to every sample point.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSearch {
    pub radius_m: u32,
    pub place_type: String,
    /// Courtesy pause between successive point lookups, on top of any
    /// backoff the executor applies.
    pub pause: Duration,
}

impl Default for StationSearch {
    fn default() -> Self {
        Self {
            radius_m: 5_000,
            place_type: "gas_station".to_string(),
            pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationLookup {
    pub total: usize,
    pub by_point: StationsByLocation,
}

#[derive(Debug, Deserialize)]
struct NearbySearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    name: String,
    geometry: PlaceGeometry,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceGeometry {
    location: Coordinate,
}

impl From<PlaceResult> for Station {
    fn from(place: PlaceResult) -> Self {
        Station {
            name: place.name,
            location: place.geometry.location,
            rating: place.rating,
            vicinity: place.vicinity,
            place_id: place.place_id,
        }
    }
}

impl<T: Transport> MapsClient<T> {
    /// One nearby search per point, strictly sequential.
    pub async fn get_nearby_stations(
        &self,
        points: &[Coordinate],
    ) -> Result<StationLookup, MapsError> {
        tracing::info!("Fetching stations at {} sampled points", points.len());
        let search = &self.station_search;
        let mut lookup = StationLookup::default();

        for (index, point) in points.iter().enumerate() {
            if index > 0 && !search.pause.is_zero() {
                tokio::time::sleep(search.pause).await;
            }
            tracing::debug!("Searching point {} @ {}", index, point);

            let request = ApiRequest::get(self.endpoint("place/nearbysearch/json"))
                .param("location", point)
                .param("radius", search.radius_m)
                .param("type", &search.place_type);

            let response: NearbySearchResponse =
                self.fetch_json("places", request).await?;
            ensure_status(
                "places",
                &response.status,
                response.error_message,
                &["OK", "ZERO_RESULTS"],
            )?;

            let stations: Vec<Station> = response.results.into_iter().map(Station::from).collect();
            lookup.total += stations.len();
            lookup.by_point.insert(index, stations);
        }

        tracing::info!("Found {} total stations", lookup.total);
        Ok(lookup)
    }
}
