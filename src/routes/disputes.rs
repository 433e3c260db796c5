use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::disputes::DisputeDetails,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::dispute_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_dispute))
}

#[utoipa::path(
    get,
    path = "/disputes/{id}",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 200, description = "Dispute with its order", body = ApiResponse<DisputeDetails>),
        (status = 404, description = "Not Found"),
    ),
    security(("user_id" = [])),
    tag = "Disputes"
)]
pub async fn get_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DisputeDetails>>> {
    let resp = dispute_service::get_dispute(&state, &user, id).await?;
    Ok(Json(resp))
}
