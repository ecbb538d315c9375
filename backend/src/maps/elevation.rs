use serde::Deserialize;
use shared::EncodedPath;

use super::{MapsClient, MapsError, ensure_status};
use crate::executor::{ApiRequest, Transport};

pub const DEFAULT_ELEVATION_SAMPLES: usize = 50;

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<ElevationResult>,
}

#[derive(Debug, Deserialize)]
struct ElevationResult {
    elevation: f64,
}

impl<T: Transport> MapsClient<T> {
    /// Elevations at `samples` evenly spaced positions along the whole path,
    /// in path order.
    pub async fn get_elevation(
        &self,
        path: &EncodedPath,
        samples: usize,
    ) -> Result<Vec<f64>, MapsError> {
        tracing::info!("Fetching elevation along route ({} samples)", samples);

        let request = ApiRequest::get(self.endpoint("elevation/json"))
            .param("path", format!("enc:{path}"))
            .param("samples", samples);

        let response: ElevationResponse = self.fetch_json("elevation", request).await?;
        ensure_status("elevation", &response.status, response.error_message, &["OK"])?;

        let elevations: Vec<f64> = response.results.into_iter().map(|r| r.elevation).collect();
        tracing::debug!("Fetched {} elevations", elevations.len());
        Ok(elevations)
    }
}

/// Route-level statistics derived from an elevation profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationStats {
    /// Sum of positive successive differences; descents contribute nothing.
    pub gain_m: f64,
    pub max_m: f64,
    /// `gain_m / sample_count`. Not a grade: it ignores horizontal distance.
    pub avg_slope: f64,
    pub sample_count: usize,
}

impl ElevationStats {
    /// `None` for an empty profile.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let gain_m = samples
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|diff| *diff > 0.0)
            .sum::<f64>();
        let max_m = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            gain_m,
            max_m,
            avg_slope: gain_m / samples.len() as f64,
            sample_count: samples.len(),
        })
    }
}
