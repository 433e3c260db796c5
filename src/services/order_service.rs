use uuid::Uuid;

use crate::{
    dto::orders::{
        CancelOrderRequest, OpenDisputeRequest, OrderList, PayOrderRequest, PlaceOrderRequest,
        ShipOrderRequest,
    },
    error::{AppError, AppResult},
    machine,
    middleware::auth::AuthUser,
    models::OrderAggregate,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::commit_with_retry,
    state::AppState,
    store::OrderQuery,
};

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let listing = state
        .store
        .load_listing(payload.listing_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let aggregate = machine::place_order(
        &listing,
        user,
        &payload,
        &state.config,
        state.clock.now(),
    )?;
    state.store.insert_order(&aggregate).await?;

    tracing::info!(
        order_id = %aggregate.order.id,
        order_number = %aggregate.order.order_number,
        total = aggregate.order.total_amount,
        "order placed"
    );

    Ok(ApiResponse::single("Order created", aggregate))
}

/// Buyer, seller or admin only; anyone else gets `NotFound`.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = state
        .store
        .load_order(id)
        .await?
        .filter(|a| user.is_admin() || a.order.is_party(user.user_id))
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::single("OK", aggregate))
}

/// Orders the caller is a party to. Admins see every order.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let store_query = OrderQuery {
        party: (!user.is_admin()).then_some(user.user_id),
        status: query.status,
        newest_first: !matches!(query.sort_order, Some(SortOrder::Asc)),
        limit: limit as u64,
        offset: offset as u64,
    };

    let (orders, total) = state.store.list_orders(&store_query).await?;

    let meta = Meta::paged(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: PayOrderRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = commit_with_retry(state, id, |current, now| {
        machine::pay_order(current, user, &payload, now)
    })
    .await?;

    tracing::info!(order_id = %id, method = %payload.method, "payment recorded");
    Ok(ApiResponse::single("Payment recorded", aggregate))
}

pub async fn start_processing(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = commit_with_retry(state, id, |current, now| {
        machine::start_processing(current, user, now)
    })
    .await?;

    Ok(ApiResponse::single("Order processing", aggregate))
}

pub async fn ship_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ShipOrderRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = commit_with_retry(state, id, |current, now| {
        machine::ship_order(current, user, &payload, now)
    })
    .await?;

    tracing::info!(order_id = %id, courier = %payload.courier_service, "order shipped");
    Ok(ApiResponse::single("Order shipped", aggregate))
}

pub async fn confirm_delivery(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = commit_with_retry(state, id, |current, now| {
        machine::confirm_delivery(current, user, now)
    })
    .await?;

    Ok(ApiResponse::single("Delivery confirmed", aggregate))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = commit_with_retry(state, id, |current, now| {
        machine::cancel_order(current, user, &payload, now)
    })
    .await?;

    tracing::info!(order_id = %id, status = %aggregate.order.status, "order cancelled");
    Ok(ApiResponse::single("Order cancelled", aggregate))
}

pub async fn open_dispute(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: OpenDisputeRequest,
) -> AppResult<ApiResponse<OrderAggregate>> {
    let aggregate = commit_with_retry(state, id, |current, now| {
        machine::open_dispute(current, user, &payload, now)
    })
    .await?;

    tracing::info!(order_id = %id, "dispute opened");
    Ok(ApiResponse::single("Dispute opened", aggregate))
}
