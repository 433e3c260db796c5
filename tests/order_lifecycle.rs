mod common;

use common::{BUYER_EMAIL, Harness, SELLER_EMAIL, data};
use marketplace_escrow::{
    config::EngineConfig,
    dto::orders::{CancelOrderRequest, PayOrderRequest, PlaceOrderRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::{ListingStatus, OrderStatus, PaymentMethod, PaymentStatus},
    routes::params::OrderListQuery,
    services::order_service,
    store::OrderStore,
};
use uuid::Uuid;

#[tokio::test]
async fn happy_path_records_one_history_entry_per_step() {
    let h = Harness::new(100_000, 3).await;

    let placed = h.place(1).await;
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert!(placed.order.funds_held);
    assert_eq!(placed.order.total_amount, 100_000);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(h.stock().await, 3, "stock is reserved at payment, not creation");

    let paid = h.pay(&placed).await;
    assert_eq!(paid.order.status, OrderStatus::Confirmed);
    assert_eq!(paid.order.payment_status, PaymentStatus::Completed);
    assert_eq!(paid.payments.len(), 1);
    assert!(paid.payments[0].is_escrow);
    assert!(paid.payments[0].transaction_id.starts_with("TXN-"));
    assert_eq!(h.stock().await, 2);

    let processing = data(
        order_service::start_processing(&h.state, &h.seller, placed.order.id)
            .await
            .unwrap(),
    );
    assert_eq!(processing.order.status, OrderStatus::Processing);

    let shipped = h.ship(placed.order.id).await;
    assert_eq!(shipped.order.status, OrderStatus::Shipped);
    assert_eq!(shipped.order.tracking_number.as_deref(), Some("TRK-100200"));
    assert!(shipped.order.shipped_at.is_some());

    let delivered = h.deliver(placed.order.id).await;
    assert_eq!(delivered.order.status, OrderStatus::Delivered);
    assert!(delivered.order.delivered_at.is_some());
    assert!(delivered.order.funds_held);

    let stored = h.reload(placed.order.id).await;
    let statuses: Vec<OrderStatus> = stored.history.entries().iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ]
    );
    let sequences: Vec<i32> = stored.history.entries().iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    assert_eq!(stored.order.version, 5);
}

#[tokio::test]
async fn tax_is_added_to_the_subtotal() {
    let h = Harness::with_config(EngineConfig::default(), 10_000, 5).await;
    let placed = h.place(2).await;
    assert_eq!(placed.order.subtotal, 20_000);
    assert_eq!(placed.order.tax_amount, 3_000);
    assert_eq!(placed.order.total_amount, 23_000);
    assert_eq!(placed.order.currency, "ZAR");
    assert!(placed.order.order_number.starts_with("ORD-20260302-"));
}

#[tokio::test]
async fn invalid_orders_are_rejected() {
    let h = Harness::new(100_000, 2).await;
    let request = |quantity: i32, address: &str| PlaceOrderRequest {
        listing_id: h.listing_id,
        quantity,
        shipping_cost: 0,
        discount_amount: 0,
        shipping_address: address.to_string(),
        buyer_notes: None,
        auto_release_days: None,
        auto_release_enabled: None,
    };

    let zero = order_service::place_order(&h.state, &h.buyer, request(0, "Cape Town")).await;
    assert!(matches!(zero, Err(AppError::Validation(_))));

    let too_many = order_service::place_order(&h.state, &h.buyer, request(3, "Cape Town")).await;
    assert!(matches!(too_many, Err(AppError::Validation(_))));

    let no_address = order_service::place_order(&h.state, &h.buyer, request(1, "   ")).await;
    assert!(matches!(no_address, Err(AppError::Validation(_))));

    let own_listing =
        order_service::place_order(&h.state, &h.seller, request(1, "Cape Town")).await;
    assert!(matches!(own_listing, Err(AppError::Validation(_))));

    let mut unknown = request(1, "Cape Town");
    unknown.listing_id = Uuid::new_v4();
    let missing = order_service::place_order(&h.state, &h.buyer, unknown).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    let mut huge_shipping = request(1, "Cape Town");
    huge_shipping.shipping_cost = i64::MAX;
    let overflow = order_service::place_order(&h.state, &h.buyer, huge_shipping).await;
    assert!(matches!(overflow, Err(AppError::Validation(_))));

    let mut huge_discount = request(1, "Cape Town");
    huge_discount.discount_amount = i64::MAX;
    let negative = order_service::place_order(&h.state, &h.buyer, huge_discount).await;
    assert!(matches!(negative, Err(AppError::Validation(_))));
    assert_eq!(h.stock().await, 2);
}

#[tokio::test]
async fn payment_must_match_total_and_happen_once() {
    let h = Harness::new(100_000, 2).await;
    let placed = h.place(1).await;

    let short = order_service::pay_order(
        &h.state,
        &h.buyer,
        placed.order.id,
        PayOrderRequest {
            method: PaymentMethod::Eft,
            amount: 99_999,
        },
    )
    .await;
    assert!(matches!(short, Err(AppError::Validation(_))));

    h.pay(&placed).await;
    let again = order_service::pay_order(
        &h.state,
        &h.buyer,
        placed.order.id,
        PayOrderRequest {
            method: PaymentMethod::Eft,
            amount: 100_000,
        },
    )
    .await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));
    assert_eq!(h.reload(placed.order.id).await.payments.len(), 1);
}

#[tokio::test]
async fn paying_for_the_last_unit_twice_is_rejected_without_side_effects() {
    let h = Harness::new(50_000, 1).await;
    let first = h.place(1).await;
    let second = h.place(1).await;

    h.pay(&first).await;
    let listing = h.store.load_listing(h.listing_id).await.unwrap().unwrap();
    assert_eq!(listing.quantity, 0);
    assert_eq!(listing.status, ListingStatus::Sold);

    let result = order_service::pay_order(
        &h.state,
        &h.buyer,
        second.order.id,
        PayOrderRequest {
            method: PaymentMethod::CreditCard,
            amount: second.order.total_amount,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let untouched = h.reload(second.order.id).await;
    assert_eq!(untouched.order.status, OrderStatus::Pending);
    assert!(untouched.payments.is_empty());
    assert_eq!(untouched.history.len(), 1);
}

#[tokio::test]
async fn cancelling_a_shipped_order_changes_nothing() {
    let h = Harness::new(100_000, 2).await;
    let shipped = h.shipped_order(1).await;
    let before = h.reload(shipped.order.id).await;

    let result = order_service::cancel_order(
        &h.state,
        &h.buyer,
        shipped.order.id,
        CancelOrderRequest {
            reason: "Changed my mind".into(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));

    let after = h.reload(shipped.order.id).await;
    assert_eq!(after.order.status, OrderStatus::Shipped);
    assert_eq!(after.order.version, before.order.version);
    assert_eq!(after.history, before.history);
    assert_eq!(h.stock().await, 1);
}

#[tokio::test]
async fn cancelling_after_payment_refunds_and_restores_stock() {
    let h = Harness::new(100_000, 2).await;
    let placed = h.place(2).await;
    h.pay(&placed).await;
    assert_eq!(h.stock().await, 0);

    let cancelled = data(
        order_service::cancel_order(
            &h.state,
            &h.seller,
            placed.order.id,
            CancelOrderRequest {
                reason: "Item damaged in storage".into(),
            },
        )
        .await
        .unwrap(),
    );

    assert_eq!(cancelled.order.status, OrderStatus::Refunded);
    assert_eq!(cancelled.order.payment_status, PaymentStatus::Refunded);
    assert_eq!(
        cancelled.order.cancellation_reason.as_deref(),
        Some("Item damaged in storage")
    );
    assert!(cancelled.order.cancelled_at.is_some());
    assert!(cancelled.payments.iter().all(|p| p.status == PaymentStatus::Refunded));

    let listing = h.store.load_listing(h.listing_id).await.unwrap().unwrap();
    assert_eq!(listing.quantity, 2);
    assert_eq!(listing.status, ListingStatus::Active);
}

#[tokio::test]
async fn cancelling_before_payment_leaves_stock_alone() {
    let h = Harness::new(100_000, 2).await;
    let placed = h.place(1).await;

    let cancelled = data(
        order_service::cancel_order(
            &h.state,
            &h.buyer,
            placed.order.id,
            CancelOrderRequest {
                reason: "Found a better deal".into(),
            },
        )
        .await
        .unwrap(),
    );
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.order.payment_status, PaymentStatus::Pending);
    assert_eq!(h.stock().await, 2);

    let last = cancelled.history.last().unwrap();
    assert_eq!(last.note, "Order cancelled. Reason: Found a better deal");
    assert_eq!(last.updated_by, Some(h.buyer.user_id));
}

#[tokio::test]
async fn only_the_seller_ships_and_only_after_payment() {
    let h = Harness::new(100_000, 2).await;
    let placed = h.place(1).await;

    let unpaid = order_service::start_processing(&h.state, &h.seller, placed.order.id).await;
    assert!(matches!(unpaid, Err(AppError::InvalidStateTransition(_))));

    h.pay(&placed).await;
    let delivered_early =
        order_service::confirm_delivery(&h.state, &h.buyer, placed.order.id).await;
    assert!(matches!(delivered_early, Err(AppError::InvalidStateTransition(_))));

    let outsider = AuthUser::user(Uuid::new_v4());
    let by_outsider = order_service::start_processing(&h.state, &outsider, placed.order.id).await;
    assert!(matches!(by_outsider, Err(AppError::NotFound)));
}

#[tokio::test]
async fn orders_are_visible_to_parties_and_admins_only() {
    let h = Harness::new(100_000, 5).await;
    let placed = h.place(1).await;
    h.place(1).await;

    assert!(order_service::get_order(&h.state, &h.buyer, placed.order.id).await.is_ok());
    assert!(order_service::get_order(&h.state, &h.seller, placed.order.id).await.is_ok());
    assert!(order_service::get_order(&h.state, &h.admin, placed.order.id).await.is_ok());

    let outsider = AuthUser::user(Uuid::new_v4());
    let hidden = order_service::get_order(&h.state, &outsider, placed.order.id).await;
    assert!(matches!(hidden, Err(AppError::NotFound)));

    let seller_view = order_service::list_orders(&h.state, &h.seller, OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(seller_view.data.unwrap().items.len(), 2);
    assert_eq!(seller_view.meta.unwrap().total, Some(2));

    let outsider_view = order_service::list_orders(&h.state, &outsider, OrderListQuery::default())
        .await
        .unwrap();
    assert!(outsider_view.data.unwrap().items.is_empty());
}

#[tokio::test]
async fn parties_are_notified_after_each_commit() {
    let h = Harness::new(100_000, 2).await;
    let placed = h.place(1).await;
    h.pay(&placed).await;

    assert_eq!(h.notifier.subjects_for(BUYER_EMAIL).await, vec!["Order Confirmation"]);
    assert_eq!(h.notifier.subjects_for(SELLER_EMAIL).await, vec!["New Order Received"]);

    h.notifier.clear().await;
    h.ship(placed.order.id).await;
    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, BUYER_EMAIL);
    assert!(sent[0].body.contains("TRK-100200"));
}

#[tokio::test]
async fn failed_notifications_do_not_undo_the_transition() {
    let h = Harness::new(100_000, 2).await;
    let placed = h.place(1).await;
    h.notifier.fail(true);

    let paid = h.pay(&placed).await;
    assert_eq!(paid.order.status, OrderStatus::Confirmed);
    assert!(h.notifier.sent().await.is_empty());

    let stored = h.reload(placed.order.id).await;
    assert_eq!(stored.order.status, OrderStatus::Confirmed);
    assert_eq!(h.stock().await, 1);
}
