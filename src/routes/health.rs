use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{response::ApiResponse, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    /// `ok`, or `degraded` when the store cannot be reached.
    pub status: String,
    pub store: String,
    pub store_reachable: bool,
    pub auto_release_days: i32,
    pub sweep_interval_secs: u64,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "OK", body = ApiResponse<HealthData>),
    ),
        tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let store_reachable = match state.store.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                error = %err,
                store = state.store.backend(),
                "health check ping failed"
            );
            false
        }
    };

    let data = HealthData {
        status: if store_reachable { "ok" } else { "degraded" }.to_string(),
        store: state.store.backend().to_string(),
        store_reachable,
        auto_release_days: state.config.auto_release_days,
        sweep_interval_secs: state.config.sweep_interval.as_secs(),
    };

    Json(ApiResponse::single("Health check", data))
}
