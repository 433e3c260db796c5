mod common;

use common::{BUYER_EMAIL, Harness, SELLER_EMAIL, data};
use marketplace_escrow::{
    dto::{
        disputes::{ResolveDisputeRequest, UpdateDisputeStatusRequest},
        orders::{AdminReleaseRequest, OpenDisputeRequest},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{DisputeOutcome, DisputeStatus, OrderAggregate, OrderStatus, PaymentStatus},
    routes::params::{DisputeListQuery, DisputeScope},
    services::{dispute_service, escrow_service, order_service},
};
use uuid::Uuid;

fn dispute_request() -> OpenDisputeRequest {
    OpenDisputeRequest {
        reason: "Item not received".into(),
        description: "Tracking shows it stuck at the depot for two weeks".into(),
        evidence_url: Some("https://example.com/evidence/1.png".into()),
    }
}

async fn disputed(h: &Harness) -> OrderAggregate {
    let shipped = h.shipped_order(1).await;
    data(
        order_service::open_dispute(&h.state, &h.buyer, shipped.order.id, dispute_request())
            .await
            .unwrap(),
    )
}

fn resolution(outcome: DisputeOutcome, refund_amount: Option<i64>) -> ResolveDisputeRequest {
    ResolveDisputeRequest {
        outcome,
        resolution: "Reviewed courier records".into(),
        refund_amount,
    }
}

fn dispute_id(order: &OrderAggregate) -> Uuid {
    order.dispute.as_ref().unwrap().id
}

#[tokio::test]
async fn opening_a_dispute_freezes_the_order() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;

    assert_eq!(order.order.status, OrderStatus::Disputed);
    let dispute = order.dispute.as_ref().unwrap();
    assert_eq!(dispute.status, DisputeStatus::Open);
    assert_eq!(dispute.initiated_by, h.buyer.user_id);
    assert_eq!(
        order.history.last().unwrap().note,
        "Dispute opened: Item not received"
    );
    assert!(h.notifier.subjects_for(SELLER_EMAIL).await.contains(&"Dispute Opened".to_string()));

    let second =
        order_service::open_dispute(&h.state, &h.seller, order.order.id, dispute_request()).await;
    assert!(matches!(second, Err(AppError::InvalidStateTransition(_))));

    let release = escrow_service::release_by_buyer(&h.state, &h.buyer, order.order.id).await;
    assert!(matches!(release, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn finished_orders_cannot_be_disputed() {
    let h = Harness::new(100_000, 1).await;
    let delivered = h.delivered_order(1).await;
    escrow_service::release_by_buyer(&h.state, &h.buyer, delivered.order.id)
        .await
        .unwrap();

    let late =
        order_service::open_dispute(&h.state, &h.buyer, delivered.order.id, dispute_request())
            .await;
    assert!(matches!(late, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn buyer_favorable_refunds_in_full_and_restores_stock() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;
    assert_eq!(h.stock().await, 0);

    let resolved = data(
        dispute_service::resolve_dispute(
            &h.state,
            &h.admin,
            dispute_id(&order),
            resolution(DisputeOutcome::BuyerFavorable, None),
        )
        .await
        .unwrap(),
    );

    assert_eq!(resolved.order.status, OrderStatus::Refunded);
    assert_eq!(resolved.order.payment_status, PaymentStatus::Refunded);
    let dispute = resolved.dispute.as_ref().unwrap();
    assert_eq!(dispute.status, DisputeStatus::Resolved);
    let ruling = dispute.resolution.as_ref().unwrap();
    assert_eq!(ruling.outcome, DisputeOutcome::BuyerFavorable);
    assert_eq!(ruling.refund_amount, Some(resolved.order.total_amount));
    assert_eq!(ruling.resolved_by, h.admin.user_id);
    assert_eq!(h.stock().await, 1);
    assert!(
        resolved
            .history
            .last()
            .unwrap()
            .note
            .starts_with("Dispute resolved: buyer_favorable")
    );
    assert!(
        h.notifier
            .subjects_for(BUYER_EMAIL)
            .await
            .contains(&"Dispute Resolved - Refund Issued".to_string())
    );

    let again = dispute_service::resolve_dispute(
        &h.state,
        &h.admin,
        dispute_id(&order),
        resolution(DisputeOutcome::SellerFavorable, None),
    )
    .await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));
    assert_eq!(h.reload(order.order.id).await.order.status, OrderStatus::Refunded);
}

#[tokio::test]
async fn seller_favorable_releases_escrow() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;

    let resolved = data(
        dispute_service::resolve_dispute(
            &h.state,
            &h.admin,
            dispute_id(&order),
            resolution(DisputeOutcome::SellerFavorable, None),
        )
        .await
        .unwrap(),
    );
    assert_eq!(resolved.order.status, OrderStatus::Completed);
    assert!(!resolved.order.funds_held);
    assert!(resolved.order.funds_released_at.is_some());
    assert!(resolved.payments.iter().all(|p| p.is_released));
    assert_eq!(h.stock().await, 0);
}

#[tokio::test]
async fn partial_refund_keeps_the_order_disputed_until_released() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;

    let resolved = data(
        dispute_service::resolve_dispute(
            &h.state,
            &h.admin,
            dispute_id(&order),
            resolution(DisputeOutcome::PartialRefund, Some(25_000)),
        )
        .await
        .unwrap(),
    );
    assert_eq!(resolved.order.payment_status, PaymentStatus::PartiallyRefunded);
    assert_eq!(resolved.order.status, OrderStatus::Disputed);
    assert_eq!(
        resolved.dispute.as_ref().unwrap().resolution.as_ref().unwrap().refund_amount,
        Some(25_000)
    );
    assert!(resolved.order.funds_held);

    let released = data(
        escrow_service::release_by_admin(
            &h.state,
            &h.admin,
            order.order.id,
            AdminReleaseRequest {
                notes: "Remaining balance to seller".into(),
            },
        )
        .await
        .unwrap(),
    );
    assert_eq!(released.order.status, OrderStatus::Completed);
    assert_eq!(released.order.payment_status, PaymentStatus::PartiallyRefunded);
}

#[tokio::test]
async fn partial_refund_amount_is_bounded_by_the_total() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;
    let id = dispute_id(&order);

    for amount in [None, Some(0), Some(-5), Some(100_001)] {
        let result = dispute_service::resolve_dispute(
            &h.state,
            &h.admin,
            id,
            resolution(DisputeOutcome::PartialRefund, amount),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{amount:?}");
    }

    let full = dispute_service::resolve_dispute(
        &h.state,
        &h.admin,
        id,
        resolution(DisputeOutcome::PartialRefund, Some(100_000)),
    )
    .await;
    assert!(full.is_ok());
}

#[tokio::test]
async fn no_action_notifies_both_parties() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;
    h.notifier.clear().await;

    let resolved = data(
        dispute_service::resolve_dispute(
            &h.state,
            &h.admin,
            dispute_id(&order),
            resolution(DisputeOutcome::NoAction, None),
        )
        .await
        .unwrap(),
    );
    assert_eq!(resolved.order.status, OrderStatus::Disputed);
    assert_eq!(resolved.order.payment_status, PaymentStatus::Completed);

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|s| s.to == BUYER_EMAIL));
    assert!(sent.iter().any(|s| s.to == SELLER_EMAIL));
}

#[tokio::test]
async fn only_admins_resolve() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;

    let by_buyer = dispute_service::resolve_dispute(
        &h.state,
        &h.buyer,
        dispute_id(&order),
        resolution(DisputeOutcome::BuyerFavorable, None),
    )
    .await;
    assert!(matches!(by_buyer, Err(AppError::Forbidden)));

    let blank = dispute_service::resolve_dispute(
        &h.state,
        &h.admin,
        dispute_id(&order),
        ResolveDisputeRequest {
            outcome: DisputeOutcome::NoAction,
            resolution: "  ".into(),
            refund_amount: None,
        },
    )
    .await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let unknown = dispute_service::resolve_dispute(
        &h.state,
        &h.admin,
        Uuid::new_v4(),
        resolution(DisputeOutcome::NoAction, None),
    )
    .await;
    assert!(matches!(unknown, Err(AppError::NotFound)));
}

#[tokio::test]
async fn review_workflow_then_close() {
    let h = Harness::new(100_000, 1).await;
    let order = disputed(&h).await;
    let id = dispute_id(&order);
    let move_to = |status| {
        dispute_service::update_dispute_status(
            &h.state,
            &h.admin,
            id,
            UpdateDisputeStatusRequest { status },
        )
    };

    let reviewing = data(move_to(DisputeStatus::UnderReview).await.unwrap());
    assert_eq!(reviewing.dispute.as_ref().unwrap().status, DisputeStatus::UnderReview);
    assert_eq!(reviewing.history.last().unwrap().note, "Dispute moved to under_review");

    let early_close = move_to(DisputeStatus::Closed).await;
    assert!(matches!(early_close, Err(AppError::InvalidStateTransition(_))));

    let shortcut = move_to(DisputeStatus::Resolved).await;
    assert!(matches!(shortcut, Err(AppError::Validation(_))));

    let no_action = resolution(DisputeOutcome::NoAction, None);
    dispute_service::resolve_dispute(&h.state, &h.admin, id, no_action)
        .await
        .unwrap();

    let reopened = move_to(DisputeStatus::UnderReview).await;
    assert!(matches!(reopened, Err(AppError::InvalidStateTransition(_))));

    let closed = data(move_to(DisputeStatus::Closed).await.unwrap());
    assert_eq!(closed.dispute.as_ref().unwrap().status, DisputeStatus::Closed);

    let after_close = move_to(DisputeStatus::Escalated).await;
    assert!(matches!(after_close, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn listing_and_viewing_disputes() {
    let h = Harness::new(100_000, 3).await;
    let open = disputed(&h).await;
    let settled = disputed(&h).await;
    dispute_service::resolve_dispute(
        &h.state,
        &h.admin,
        dispute_id(&settled),
        resolution(DisputeOutcome::SellerFavorable, None),
    )
    .await
    .unwrap();

    let scope = |scope| DisputeListQuery { scope: Some(scope) };
    let open_list = data(
        dispute_service::list_disputes(&h.state, &h.admin, scope(DisputeScope::Open))
            .await
            .unwrap(),
    );
    assert_eq!(open_list.items.len(), 1);
    assert_eq!(open_list.items[0].id, dispute_id(&open));

    let resolved_list = data(
        dispute_service::list_disputes(&h.state, &h.admin, scope(DisputeScope::Resolved))
            .await
            .unwrap(),
    );
    assert_eq!(resolved_list.items.len(), 1);

    let all = data(
        dispute_service::list_disputes(&h.state, &h.admin, scope(DisputeScope::All))
            .await
            .unwrap(),
    );
    assert_eq!(all.items.len(), 2);

    let not_admin =
        dispute_service::list_disputes(&h.state, &h.buyer, DisputeListQuery::default()).await;
    assert!(matches!(not_admin, Err(AppError::Forbidden)));

    let details = data(
        dispute_service::get_dispute(&h.state, &h.seller, dispute_id(&open))
            .await
            .unwrap(),
    );
    assert_eq!(details.order.order.id, open.order.id);

    let outsider = AuthUser::user(Uuid::new_v4());
    let hidden = dispute_service::get_dispute(&h.state, &outsider, dispute_id(&open)).await;
    assert!(matches!(hidden, Err(AppError::NotFound)));
}
