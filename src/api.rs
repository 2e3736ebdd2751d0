// REST API with Axum - maps HTTP requests onto RewardService

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregator::AggregationScope;
use crate::error::{RewardError, ServiceError};
use crate::service::RewardService;
use crate::transaction::CustomerId;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: RewardService,
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

/// Errors a handler can return
#[derive(Debug)]
pub enum ApiError {
    NoRewards,
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NoRewards => (StatusCode::NOT_FOUND, "REWARDS_NOT_FOUND"),
            ApiError::Service(ServiceError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Service(ServiceError::Engine(RewardError::InvalidAmount { .. })) => {
                (StatusCode::BAD_REQUEST, "INVALID_AMOUNT")
            }
            ApiError::Service(ServiceError::Engine(RewardError::PointsOverflow { .. })) => {
                (StatusCode::BAD_REQUEST, "POINTS_OVERFLOW")
            }
            ApiError::Service(ServiceError::Engine(RewardError::InvalidArgument(_))) => {
                (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT")
            }
            ApiError::Service(ServiceError::Engine(RewardError::InvalidConfiguration(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_CONFIGURATION")
            }
            ApiError::Service(ServiceError::Source(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SOURCE_ERROR")
            }
        };

        let error = match self {
            ApiError::NoRewards => "Records not found for customers".to_string(),
            ApiError::Service(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(%error, code, "request failed");
        } else {
            tracing::warn!(%error, code, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            error,
            code,
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RewardsQuery {
    /// `all` (default) or `window`
    #[serde(default)]
    pub scope: Option<String>,
}

impl RewardsQuery {
    fn scope(&self) -> Result<AggregationScope, ApiError> {
        match self.scope.as_deref() {
            None | Some("all") => Ok(AggregationScope::AllHistory),
            Some("window") => Ok(AggregationScope::RollingWindow),
            Some(other) => Err(ApiError::Service(ServiceError::Engine(
                RewardError::InvalidArgument(format!(
                    "unknown scope {other:?}, expected \"all\" or \"window\""
                )),
            ))),
        }
    }
}

/// Sources may block on I/O (SQLite), so service calls stay off the async workers
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f).await.map_err(|err| {
        ServiceError::Source(anyhow::Error::new(err).context("Reward calculation task failed"))
    })?;
    Ok(result?)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/rewards - Rewards for every customer
async fn get_rewards(
    State(state): State<AppState>,
    Query(query): Query<RewardsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = query.scope()?;
    let service = state.service.clone();
    let rewards = run_blocking(move || service.all_rewards(scope)).await?;

    if rewards.is_empty() {
        return Err(ApiError::NoRewards);
    }

    Ok(Json(rewards))
}

/// GET /api/rewards/:customer_id - Rolling-window rewards for one customer
async fn get_customer_rewards(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.service.clone();
    let reward = run_blocking(move || service.customer_rewards(customer_id)).await?;
    Ok(Json(reward))
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/rewards", get(get_rewards))
        .route("/rewards/:customer_id", get(get_customer_rewards))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
