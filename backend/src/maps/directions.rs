use serde::Deserialize;
use shared::{EncodedPath, RouteLeg};

use super::{MapsClient, MapsError, ensure_status};
use crate::executor::{ApiRequest, Transport};

/// Route features to avoid (`tolls`, `highways`, `ferries`, `indoor`),
/// normalized to an ordered token list whatever shape it arrived in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvoidList(Vec<String>);

impl AvoidList {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_param(&self) -> String {
        self.0.join("|")
    }
}

impl From<&str> for AvoidList {
    /// Accepts `"tolls,highways"` as well as the already piped `"tolls|highways"`.
    fn from(value: &str) -> Self {
        value.split([',', '|']).collect()
    }
}

impl From<Vec<String>> for AvoidList {
    fn from(tokens: Vec<String>) -> Self {
        tokens.into_iter().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AvoidList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|token| token.as_ref().trim().to_string())
                .filter(|token| !token.is_empty())
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directions {
    pub legs: Vec<RouteLeg>,
    pub encoded_path: EncodedPath,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    legs: Vec<RawLeg>,
    overview_polyline: RawPolyline,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    start_address: String,
    end_address: String,
    distance: Measured,
    duration: Measured,
}

#[derive(Debug, Deserialize)]
struct Measured {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RawPolyline {
    points: String,
}

impl<T: Transport> MapsClient<T> {
    pub async fn get_directions(
        &self,
        origin: &str,
        destination: &str,
        waypoints: &[String],
        avoid: &AvoidList,
    ) -> Result<Directions, MapsError> {
        tracing::info!(
            "Getting route from {} to {} via {:?}",
            origin,
            destination,
            waypoints
        );

        let mut request = ApiRequest::get(self.endpoint("directions/json"))
            .param("origin", origin)
            .param("destination", destination);
        if !waypoints.is_empty() {
            request = request.param("waypoints", waypoints.join("|"));
        }
        if !avoid.is_empty() {
            request = request.param("avoid", avoid.to_param());
        }

        let response: DirectionsResponse = self.fetch_json("directions", request).await?;
        ensure_status("directions", &response.status, response.error_message, &["OK"])?;

        let route = response.routes.into_iter().next().ok_or(MapsError::NoRoute)?;
        let legs = route
            .legs
            .into_iter()
            .map(|leg| RouteLeg {
                start_address: leg.start_address,
                end_address: leg.end_address,
                distance_m: leg.distance.value,
                duration_s: leg.duration.value,
            })
            .collect();

        Ok(Directions {
            legs,
            encoded_path: EncodedPath::new(route.overview_polyline.points),
        })
    }
}
