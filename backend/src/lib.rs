pub mod config;
pub mod executor;
pub mod logging;
pub mod maps;
pub mod persistence;
pub mod pipeline;
pub mod polyline;
pub mod sampling;

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use shared::{ApiError, RouteFeatures, RouteRequest};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::executor::{HttpTransport, RequestExecutor, Transport, TransportError};
use crate::maps::MapsClient;
use crate::pipeline::{PipelineError, RoutePipeline};

pub struct AppState<T> {
    pub pipeline: Arc<RoutePipeline<T>>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

pub fn create_router<T: Transport + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .route("/api/route", post(route_handler::<T>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Pipeline wired to the real services as described by `config`.
pub fn build_pipeline(config: &Config) -> Result<RoutePipeline<HttpTransport>, TransportError> {
    let transport = HttpTransport::new(config.request_timeout)?;
    let executor = RequestExecutor::new(transport).with_max_attempts(config.max_attempts);
    let maps = MapsClient::new(executor, config.api_key.clone())
        .with_base_url(config.base_url.clone())
        .with_station_search(config.station_search());
    Ok(RoutePipeline::new(maps))
}

async fn route_handler<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteFeatures>, (StatusCode, Json<ApiError>)> {
    tracing::info!("Route request: {} -> {}", req.origin, req.destination);
    state
        .pipeline
        .run_request(&req)
        .await
        .map(Json)
        .map_err(pipeline_error)
}

fn pipeline_error(err: PipelineError) -> (StatusCode, Json<ApiError>) {
    tracing::error!("Route pipeline failed: {}", err);
    let status = match err {
        PipelineError::Maps(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
