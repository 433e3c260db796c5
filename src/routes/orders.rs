use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CancelOrderRequest, OpenDisputeRequest, OrderList, PayOrderRequest, PlaceOrderRequest,
        ShipOrderRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::OrderAggregate,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{escrow_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/{id}", get(get_order))
        .route("/{id}/pay", post(pay_order))
        .route("/{id}/process", post(start_processing))
        .route("/{id}/ship", post(ship_order))
        .route("/{id}/deliver", post(confirm_delivery))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/release", post(release_funds))
        .route("/{id}/dispute", post(open_dispute))
}

#[utoipa::path(
    post,
    path = "/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order created in Pending", body = ApiResponse<OrderAggregate>),
        (status = 400, description = "Invalid quantity, address or listing"),
        (status = 404, description = "Listing not found"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::place_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders the caller buys or sells", body = ApiResponse<OrderList>),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items, payments, history and dispute", body = ApiResponse<OrderAggregate>),
        (status = 404, description = "Not Found"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/pay",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = PayOrderRequest,
    responses(
        (status = 200, description = "Payment captured into escrow", body = ApiResponse<OrderAggregate>),
        (status = 400, description = "Amount does not match or stock ran out"),
        (status = 409, description = "Order is not awaiting payment"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn pay_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PayOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::pay_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/process",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Seller started preparing the order", body = ApiResponse<OrderAggregate>),
        (status = 409, description = "Order is not confirmed"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn start_processing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::start_processing(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/ship",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = ShipOrderRequest,
    responses(
        (status = 200, description = "Order shipped", body = ApiResponse<OrderAggregate>),
        (status = 400, description = "Tracking number or courier missing"),
        (status = 409, description = "Order cannot be shipped in current status"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn ship_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShipOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::ship_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Delivery confirmed by buyer", body = ApiResponse<OrderAggregate>),
        (status = 409, description = "Order must be shipped first"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn confirm_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::confirm_delivery(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled, refunded when already paid", body = ApiResponse<OrderAggregate>),
        (status = 409, description = "Order cannot be cancelled in current status"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::cancel_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/release",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Buyer released escrow to the seller", body = ApiResponse<OrderAggregate>),
        (status = 409, description = "Not delivered, disputed or already released"),
    ),
    security(("user_id" = [])),
    tag = "Orders"
)]
pub async fn release_funds(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = escrow_service::release_by_buyer(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/dispute",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = OpenDisputeRequest,
    responses(
        (status = 200, description = "Dispute opened", body = ApiResponse<OrderAggregate>),
        (status = 409, description = "Order already disputed or finished"),
    ),
    security(("user_id" = [])),
    tag = "Disputes"
)]
pub async fn open_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<OpenDisputeRequest>,
) -> AppResult<Json<ApiResponse<OrderAggregate>>> {
    let resp = order_service::open_dispute(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
