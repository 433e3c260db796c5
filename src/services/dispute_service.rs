use uuid::Uuid;

use crate::{
    dispute,
    dto::disputes::{DisputeDetails, DisputeList, ResolveDisputeRequest, UpdateDisputeStatusRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::OrderAggregate,
    response::{ApiResponse, Meta},
    routes::params::{DisputeListQuery, DisputeScope},
    services::commit_with_retry,
    state::AppState,
    store::DisputeFilter,
};

pub async fn list_disputes(
    state: &AppState,
    user: &AuthUser,
    query: DisputeListQuery,
) -> AppResult<ApiResponse<DisputeList>> {
    ensure_admin(user)?;
    let filter = match query.scope.unwrap_or_default() {
        DisputeScope::Open => DisputeFilter::Open,
        DisputeScope::Resolved => DisputeFilter::Resolved,
        DisputeScope::All => DisputeFilter::All,
    };
    let items = state.store.list_disputes(filter).await?;
    let meta = Meta::complete(items.len());
    Ok(ApiResponse::success(
        "Disputes",
        DisputeList { items },
        Some(meta),
    ))
}

/// Visible to admins and to either party of the disputed order.
pub async fn get_dispute(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<DisputeDetails>> {
    let order = load_disputed_order(state, id).await?;
    if !user.is_admin() && !order.order.is_party(user.user_id) {
        return Err(AppError::NotFound);
    }
    let dispute = order.dispute.clone().ok_or(AppError::NotFound)?;
    Ok(ApiResponse::single("OK", DisputeDetails { dispute, order }))
}

pub async fn resolve_dispute(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ResolveDisputeRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    ensure_admin(user)?;
    let order_id = dispute_order_id(state, id).await?;
    let aggregate = commit_with_retry(state, order_id, |current, now| {
        dispute::resolve_dispute(current, user, &payload, now)
    })
    .await?;

    tracing::info!(
        dispute_id = %id,
        order_id = %order_id,
        outcome = %payload.outcome,
        "dispute resolved"
    );
    Ok(ApiResponse::single("Dispute resolved", aggregate))
}

pub async fn update_dispute_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateDisputeStatusRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    ensure_admin(user)?;
    let order_id = dispute_order_id(state, id).await?;
    let aggregate = commit_with_retry(state, order_id, |current, now| {
        dispute::update_dispute_status(current, user, payload.status, now)
    })
    .await?;

    Ok(ApiResponse::single("Dispute updated", aggregate))
}

async fn dispute_order_id(state: &AppState, id: Uuid) -> AppResult<Uuid> {
    state
        .store
        .load_dispute(id)
        .await?
        .map(|d| d.order_id)
        .ok_or(AppError::NotFound)
}

async fn load_disputed_order(state: &AppState, id: Uuid) -> AppResult<OrderAggregate> {
    let order_id = dispute_order_id(state, id).await?;
    state
        .store
        .load_order(order_id)
        .await?
        .ok_or(AppError::NotFound)
}
