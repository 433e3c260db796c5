use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::orders::AdminReleaseRequest,
    error::AppResult,
    escrow::{self, EscrowPosition, ReleaseTrigger},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Money, OrderAggregate},
    response::{ApiResponse, Meta},
    services::commit_with_retry,
    state::AppState,
    sweeper::{AutoReleaseSweeper, SweepReport},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct EscrowOverview {
    pub total_held: Money,
    pub currency: String,
    pub due_for_release: usize,
    pub items: Vec<EscrowPosition>,
}

pub(crate) async fn release(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    trigger: ReleaseTrigger,
) -> AppResult<OrderAggregate> {
    let aggregate = commit_with_retry(state, id, |current, now| {
        escrow::release_funds(current, actor, &trigger, now)
    })
    .await?;

    tracing::info!(
        order_id = %id,
        amount = aggregate.order.total_amount,
        trigger = ?trigger,
        "escrow released"
    );
    Ok(aggregate)
}

pub async fn release_by_buyer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = release(state, user, id, ReleaseTrigger::Buyer).await?;
    Ok(ApiResponse::single("Funds released to seller", aggregate))
}

pub async fn release_by_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AdminReleaseRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    ensure_admin(user)?;
    let trigger = ReleaseTrigger::Admin {
        notes: payload.notes,
    };
    let aggregate = release(state, user, id, trigger).await?;
    Ok(ApiResponse::single("Funds released by admin", aggregate))
}

/// Every order still holding funds, with its auto-release position.
pub async fn escrow_overview(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<EscrowOverview>> {
    ensure_admin(user)?;
    let now = state.clock.now();
    let items: Vec<EscrowPosition> = state
        .store
        .held_orders()
        .await?
        .into_iter()
        .map(|order| EscrowPosition::of(order, now))
        .collect();

    let overview = EscrowOverview {
        total_held: items.iter().map(|p| p.order.total_amount).sum(),
        currency: state.config.currency.clone(),
        due_for_release: items.iter().filter(|p| p.auto_release_due).count(),
        items,
    };
    let meta = Meta::complete(overview.items.len());
    Ok(ApiResponse::success(
        "Escrow",
        overview,
        Some(meta),
    ))
}

pub async fn run_auto_release(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SweepReport>> {
    ensure_admin(user)?;
    let report = AutoReleaseSweeper::new(state.clone()).run_once().await?;
    Ok(ApiResponse::single("Auto-release sweep finished", report))
}
