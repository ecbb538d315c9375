//! Typed callers for the directions, elevation and places services.
//!
//! All three share one [`MapsClient`], which owns the retrying executor and
//! the API key. Each service module adds its request builder, response
//! schema and domain status handling.

pub mod directions;
pub mod elevation;
pub mod places;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::executor::{ApiRequest, RequestError, RequestExecutor, Transport};

pub use directions::{AvoidList, Directions};
pub use elevation::{DEFAULT_ELEVATION_SAMPLES, ElevationStats};
pub use places::{StationLookup, StationSearch};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Error)]
pub enum MapsError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(
        "{service} service reported status {status}: {}",
        .message.as_deref().unwrap_or("no details")
    )]
    Upstream {
        service: &'static str,
        status: String,
        message: Option<String>,
    },
    #[error("directions service returned no route")]
    NoRoute,
    #[error("{service} response could not be decoded: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub struct MapsClient<T> {
    executor: RequestExecutor<T>,
    api_key: String,
    base_url: String,
    station_search: StationSearch,
}

impl<T: Transport> MapsClient<T> {
    pub fn new(executor: RequestExecutor<T>, api_key: impl Into<String>) -> Self {
        Self {
            executor,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            station_search: StationSearch::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_station_search(mut self, station_search: StationSearch) -> Self {
        self.station_search = station_search;
        self
    }

    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, request: ApiRequest) -> ApiRequest {
        request.param("key", &self.api_key)
    }

    async fn fetch_json<R: DeserializeOwned>(
        &self,
        service: &'static str,
        request: ApiRequest,
    ) -> Result<R, MapsError> {
        let response = self.executor.execute(&self.authorized(request)).await?;
        serde_json::from_str(&response.body).map_err(|source| {
            tracing::error!(
                "Failed to parse {} response: {}. Body: {}",
                service,
                source,
                response.body
            );
            MapsError::Decode { service, source }
        })
    }
}

/// Accept a service-level `status` field only if it is one of `accepted`.
fn ensure_status(
    service: &'static str,
    status: &str,
    message: Option<String>,
    accepted: &[&str],
) -> Result<(), MapsError> {
    if accepted.contains(&status) {
        return Ok(());
    }
    Err(MapsError::Upstream {
        service,
        status: status.to_string(),
        message,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::client;
    use super::*;
    use crate::executor::mock::ScriptedTransport;

    #[test]
    fn upstream_error_mentions_service_and_status() {
        let err = ensure_status(
            "directions",
            "NOT_FOUND",
            Some("origin could not be geocoded".into()),
            &["OK"],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "directions service reported status NOT_FOUND: origin could not be geocoded"
        );
    }

    #[tokio::test]
    async fn fetch_json_adds_key_and_reports_bad_bodies() {
        let transport = ScriptedTransport::new().on(
            "/elevation/json",
            vec![crate::executor::mock::Scripted::Status(200, "not json".into())],
        );
        let client = client(transport);

        let err = client
            .fetch_json::<serde_json::Value>("elevation", ApiRequest::get(client.endpoint("elevation/json")))
            .await
            .unwrap_err();

        assert!(matches!(err, MapsError::Decode { service: "elevation", .. }));
        let sent = client.executor().transport().sent_to("/elevation/json");
        assert_eq!(sent[0].endpoint, "https://maps.test/elevation/json");
        assert_eq!(sent[0].param_value("key"), Some("test-key"));
    }
}
