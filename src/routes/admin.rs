use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        disputes::{DisputeList, ResolveDisputeRequest, UpdateDisputeStatusRequest},
        orders::AdminReleaseRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::OrderAggregate,
    response::ApiResponse,
    routes::params::DisputeListQuery,
    services::{
        dispute_service,
        escrow_service::{self, EscrowOverview},
    },
    state::AppState,
    sweeper::SweepReport,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/release", post(release_funds_admin))
        .route("/escrow", get(escrow_overview))
        .route("/escrow/auto-release", post(run_auto_release))
        .route("/disputes", get(list_disputes))
        .route("/disputes/{id}/resolve", post(resolve_dispute))
        .route("/disputes/{id}/status", patch(update_dispute_status))
}

#[utoipa::path(
    post,
    path = "/admin/orders/{id}/release",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = AdminReleaseRequest,
    responses(
        (status = 200, description = "Escrow released by admin", body = ApiResponse<OrderAggregate>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Nothing to release or dispute still open"),
    ),
    security(("user_id" = [])),
    tag = "Admin"
)]
pub async fn release_funds_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<AdminReleaseRequest>>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = escrow_service::release_by_admin(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/escrow",
    responses(
        (status = 200, description = "Orders holding funds in escrow", body = ApiResponse<EscrowOverview>),
        (status = 403, description = "Forbidden"),
    ),
    security(("user_id" = [])),
    tag = "Admin"
)]
pub async fn escrow_overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<EscrowOverview>>> {
    let resp = escrow_service::escrow_overview(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/escrow/auto-release",
    responses(
        (status = 200, description = "Run one auto-release sweep now", body = ApiResponse<SweepReport>),
        (status = 403, description = "Forbidden"),
    ),
    security(("user_id" = [])),
    tag = "Admin"
)]
pub async fn run_auto_release(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SweepReport>>> {
    let resp = escrow_service::run_auto_release(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/disputes",
    params(
        ("scope" = Option<String>, Query, description = "open (default), resolved or all")
    ),
    responses(
        (status = 200, description = "Disputes, newest first", body = ApiResponse<DisputeList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("user_id" = [])),
    tag = "Admin"
)]
pub async fn list_disputes(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DisputeListQuery>,
) -> AppResult<Json<ApiResponse<DisputeList>>> {
    let resp = dispute_service::list_disputes(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/disputes/{id}/resolve",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, description = "Dispute resolved", body = ApiResponse<OrderAggregate>),
        (status = 400, description = "Missing resolution or invalid refund amount"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Dispute already resolved"),
    ),
    security(("user_id" = [])),
    tag = "Admin"
)]
pub async fn resolve_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveDisputeRequest>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = dispute_service::resolve_dispute(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/admin/disputes/{id}/status",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    request_body = UpdateDisputeStatusRequest,
    responses(
        (status = 200, description = "Dispute moved along its review workflow", body = ApiResponse<OrderAggregate>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Status change not allowed"),
    ),
    security(("user_id" = [])),
    tag = "Admin"
)]
pub async fn update_dispute_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDisputeStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = dispute_service::update_dispute_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
