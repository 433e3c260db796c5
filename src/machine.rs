//! Order state machine.
//!
//! ```text
//! Pending ──pay──▶ Confirmed ──▶ Processing ──ship──▶ Shipped
//!    │                 │                                  │
//!    └──cancel─────────┴──▶ Cancelled | Refunded       deliver
//!                                                         ▼
//!                              Completed ◀──release── Delivered
//!
//! non-terminal ──open dispute──▶ Disputed
//! Disputed ──resolve──▶ Completed | Refunded | (unchanged)
//! ```
//!
//! Every operation validates all guards against the loaded aggregate before
//! touching a copy of it, and returns a [`Transition`] for the store to
//! commit atomically. Each transition appends exactly one history entry.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    dto::orders::{
        CancelOrderRequest, OpenDisputeRequest, PayOrderRequest, PlaceOrderRequest,
        ShipOrderRequest,
    },
    error::{AppError, AppResult},
    history::StatusHistory,
    middleware::auth::AuthUser,
    models::{
        Dispute, DisputeStatus, Listing, ListingStatus, Money, Order, OrderAggregate, OrderItem,
        OrderStatus, Payment, PaymentStatus, StockAdjustment,
    },
    notify::Notice,
};

/// A validated state change ready to be committed.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Version the change was computed from; the commit fails if it moved.
    pub base_version: i64,
    pub at: DateTime<Utc>,
    /// Post-state, already carrying `base_version + 1`.
    pub aggregate: OrderAggregate,
    pub stock: Vec<StockAdjustment>,
    pub notices: Vec<Notice>,
}

impl Transition {
    pub(crate) fn begin(current: &OrderAggregate, at: DateTime<Utc>) -> Self {
        let mut aggregate = current.clone();
        aggregate.order.version = current.order.version + 1;
        Self {
            base_version: current.order.version,
            at,
            aggregate,
            stock: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub(crate) fn order(&mut self) -> &mut Order {
        &mut self.aggregate.order
    }

    /// Appends the single history entry of this transition, stamped with
    /// the order's current status.
    pub(crate) fn record(&mut self, actor: &AuthUser, now: DateTime<Utc>, note: impl Into<String>) {
        let order_id = self.aggregate.order.id;
        let status = self.aggregate.order.status;
        self.aggregate
            .history
            .append(order_id, status, actor.recorded_as(), now, note);
    }

    pub(crate) fn notify(&mut self, recipient: Uuid, subject: &str, body: String) {
        self.notices.push(Notice::new(recipient, subject, body));
    }

    /// Queues stock back onto every linked listing.
    pub(crate) fn restore_stock(&mut self) {
        let restored = self
            .aggregate
            .items
            .iter()
            .filter_map(|item| {
                item.listing_id.map(|listing_id| StockAdjustment {
                    listing_id,
                    delta: item.quantity,
                })
            })
            .collect::<Vec<_>>();
        self.stock.extend(restored);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    Seller,
}

/// Non-parties get `NotFound` so they cannot probe for order existence.
pub fn party_of(order: &Order, user: &AuthUser) -> AppResult<Party> {
    if order.buyer_id == user.user_id {
        Ok(Party::Buyer)
    } else if order.seller_id == user.user_id {
        Ok(Party::Seller)
    } else {
        Err(AppError::NotFound)
    }
}

pub(crate) fn require_buyer(order: &Order, user: &AuthUser) -> AppResult<()> {
    match party_of(order, user)? {
        Party::Buyer => Ok(()),
        Party::Seller => Err(AppError::NotFound),
    }
}

fn require_seller(order: &Order, user: &AuthUser) -> AppResult<()> {
    match party_of(order, user)? {
        Party::Seller => Ok(()),
        Party::Buyer => Err(AppError::NotFound),
    }
}

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn amount_too_large() -> AppError {
    AppError::validation("Order amount is too large")
}

fn tax_on(subtotal: Money, rate_bps: i64) -> AppResult<Money> {
    subtotal
        .checked_mul(rate_bps)
        .and_then(|scaled| scaled.checked_add(5_000))
        .map(|scaled| scaled / 10_000)
        .ok_or_else(amount_too_large)
}

fn build_order_number(order_id: Uuid, now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = order_id.simple().to_string().to_uppercase();
    format!("ORD-{}-{}", date, &suffix[..8])
}

fn build_transaction_id(payment_id: Uuid) -> String {
    let hex = payment_id.simple().to_string().to_uppercase();
    format!("TXN-{}", &hex[..16])
}

/// Creates a Pending order for one listing. Stock is only reserved once
/// payment completes.
pub fn place_order(
    listing: &Listing,
    buyer: &AuthUser,
    request: &PlaceOrderRequest,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> AppResult<OrderAggregate> {
    if listing.status != ListingStatus::Active {
        return Err(AppError::validation("Listing is no longer available"));
    }
    if listing.seller_id == buyer.user_id {
        return Err(AppError::validation("You cannot purchase your own listing"));
    }
    if request.quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }
    if request.quantity > listing.quantity {
        return Err(AppError::validation("Insufficient stock available"));
    }
    if request.shipping_cost < 0 || request.discount_amount < 0 {
        return Err(AppError::validation(
            "Shipping cost and discount must not be negative",
        ));
    }
    let auto_release_days = request.auto_release_days.unwrap_or(config.auto_release_days);
    if !(0..=365).contains(&auto_release_days) {
        return Err(AppError::validation(
            "Auto-release days must be between 0 and 365",
        ));
    }
    let shipping_address = required_text(&request.shipping_address, "Shipping address")?;

    let subtotal = listing
        .price
        .checked_mul(i64::from(request.quantity))
        .ok_or_else(amount_too_large)?;
    let tax_amount = tax_on(subtotal, config.tax_rate_bps)?;
    let total_amount = subtotal
        .checked_add(tax_amount)
        .and_then(|sum| sum.checked_add(request.shipping_cost))
        .and_then(|sum| sum.checked_sub(request.discount_amount))
        .ok_or_else(amount_too_large)?;
    if total_amount < 0 {
        return Err(AppError::validation("Discount exceeds order value"));
    }

    let order_id = Uuid::new_v4();
    let order = Order {
        id: order_id,
        order_number: build_order_number(order_id, now),
        buyer_id: buyer.user_id,
        seller_id: listing.seller_id,
        subtotal,
        tax_amount,
        shipping_cost: request.shipping_cost,
        discount_amount: request.discount_amount,
        total_amount,
        currency: config.currency.clone(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        shipping_address,
        tracking_number: None,
        courier_service: None,
        buyer_notes: optional_text(request.buyer_notes.as_deref()),
        cancellation_reason: None,
        funds_held: true,
        funds_released_at: None,
        auto_release_enabled: request.auto_release_enabled.unwrap_or(true),
        auto_release_days,
        created_at: now,
        paid_at: None,
        shipped_at: None,
        delivered_at: None,
        cancelled_at: None,
        version: 1,
    };

    let item = OrderItem {
        id: Uuid::new_v4(),
        order_id,
        listing_id: Some(listing.id),
        product_name: listing.title.clone(),
        product_description: listing.description.clone(),
        quantity: request.quantity,
        unit_price: listing.price,
        total_price: subtotal,
        sku: Some(format!("LST-{}", &listing.id.simple().to_string()[..8])),
    };

    let mut history = StatusHistory::new();
    history.append(
        order_id,
        OrderStatus::Pending,
        buyer.recorded_as(),
        now,
        "Order created",
    );

    Ok(OrderAggregate {
        order,
        items: vec![item],
        payments: Vec::new(),
        history,
        dispute: None,
    })
}

/// Records a (simulated) completed escrow payment and reserves stock.
pub fn pay_order(
    current: &OrderAggregate,
    user: &AuthUser,
    request: &PayOrderRequest,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    let order = &current.order;
    require_buyer(order, user)?;
    if order.payment_status != PaymentStatus::Pending {
        return Err(AppError::invalid_transition("Payment already processed"));
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::invalid_transition(format!(
            "Order cannot be paid while {}",
            order.status
        )));
    }
    if request.amount != order.total_amount {
        return Err(AppError::validation(
            "Payment amount does not match order total",
        ));
    }

    let mut t = Transition::begin(current, now);
    let payment_id = Uuid::new_v4();
    t.aggregate.payments.push(Payment {
        id: payment_id,
        order_id: order.id,
        amount: request.amount,
        currency: order.currency.clone(),
        method: request.method,
        transaction_id: build_transaction_id(payment_id),
        gateway_reference: None,
        gateway_response: Some("Simulated successful payment".to_string()),
        status: PaymentStatus::Completed,
        created_at: now,
        processed_at: Some(now),
        is_escrow: true,
        is_released: false,
        escrow_released_at: None,
    });

    let o = t.order();
    o.status = OrderStatus::Confirmed;
    o.payment_status = PaymentStatus::Completed;
    o.paid_at = Some(now);
    let (number, buyer_id, seller_id) = (o.order_number.clone(), o.buyer_id, o.seller_id);

    let reserved = current
        .items
        .iter()
        .filter_map(|item| {
            item.listing_id.map(|listing_id| StockAdjustment {
                listing_id,
                delta: -item.quantity,
            })
        })
        .collect::<Vec<_>>();
    t.stock.extend(reserved);

    t.record(user, now, format!("Payment completed via {}", request.method));
    t.notify(
        buyer_id,
        "Order Confirmation",
        format!("Your order #{number} has been confirmed and payment received."),
    );
    t.notify(
        seller_id,
        "New Order Received",
        format!("You have received a new order #{number}. Please prepare for shipment."),
    );
    Ok(t)
}

pub fn start_processing(
    current: &OrderAggregate,
    user: &AuthUser,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    let order = &current.order;
    require_seller(order, user)?;
    if order.status != OrderStatus::Confirmed {
        return Err(AppError::invalid_transition(format!(
            "Order cannot move to processing while {}",
            order.status
        )));
    }
    if order.payment_status != PaymentStatus::Completed {
        return Err(AppError::invalid_transition("Payment not completed"));
    }

    let mut t = Transition::begin(current, now);
    t.order().status = OrderStatus::Processing;
    t.record(user, now, "Seller is preparing the order");
    Ok(t)
}

pub fn ship_order(
    current: &OrderAggregate,
    user: &AuthUser,
    request: &ShipOrderRequest,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    let order = &current.order;
    require_seller(order, user)?;
    if !matches!(order.status, OrderStatus::Confirmed | OrderStatus::Processing) {
        return Err(AppError::invalid_transition(
            "Order cannot be shipped in current status",
        ));
    }
    if order.payment_status != PaymentStatus::Completed {
        return Err(AppError::invalid_transition("Payment not completed"));
    }
    let tracking = required_text(&request.tracking_number, "Tracking number")?;
    let courier = required_text(&request.courier_service, "Courier service")?;

    let mut t = Transition::begin(current, now);
    let o = t.order();
    o.status = OrderStatus::Shipped;
    o.shipped_at = Some(now);
    o.tracking_number = Some(tracking.clone());
    o.courier_service = Some(courier.clone());
    let (number, buyer_id) = (o.order_number.clone(), o.buyer_id);

    t.record(
        user,
        now,
        format!("Order shipped via {courier}. Tracking: {tracking}"),
    );
    t.notify(
        buyer_id,
        "Order Shipped",
        format!("Your order #{number} has been shipped. Tracking number: {tracking}"),
    );
    Ok(t)
}

pub fn confirm_delivery(
    current: &OrderAggregate,
    user: &AuthUser,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    let order = &current.order;
    require_buyer(order, user)?;
    if order.status != OrderStatus::Shipped {
        return Err(AppError::invalid_transition("Order must be shipped first"));
    }

    let mut t = Transition::begin(current, now);
    let o = t.order();
    o.status = OrderStatus::Delivered;
    o.delivered_at = Some(now);
    let body = if o.auto_release_enabled {
        format!(
            "Order #{} has been confirmed as delivered. Funds will be released in {} days unless disputed.",
            o.order_number, o.auto_release_days
        )
    } else {
        format!(
            "Order #{} has been confirmed as delivered. Funds will be released once the buyer or an administrator approves.",
            o.order_number
        )
    };
    let seller_id = o.seller_id;

    t.record(user, now, "Delivery confirmed by buyer");
    t.notify(seller_id, "Delivery Confirmed", body);
    Ok(t)
}

/// Cancels a Pending or Confirmed order. A captured payment turns the
/// cancellation into a full refund with stock restored.
pub fn cancel_order(
    current: &OrderAggregate,
    user: &AuthUser,
    request: &CancelOrderRequest,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    let order = &current.order;
    party_of(order, user)?;
    if !order.status.can_cancel() {
        return Err(AppError::invalid_transition(
            "Order cannot be cancelled in current status",
        ));
    }
    let reason = required_text(&request.reason, "Cancellation reason")?;
    let refund = order.payment_status == PaymentStatus::Completed;

    let mut t = Transition::begin(current, now);
    let o = t.order();
    o.status = OrderStatus::Cancelled;
    o.cancelled_at = Some(now);
    o.cancellation_reason = Some(reason.clone());
    if refund {
        o.payment_status = PaymentStatus::Refunded;
        o.status = OrderStatus::Refunded;
    }
    let number = o.order_number.clone();
    let other_party = o.other_party(user.user_id);

    if refund {
        for payment in &mut t.aggregate.payments {
            payment.status = PaymentStatus::Refunded;
        }
        t.restore_stock();
    }

    t.record(user, now, format!("Order cancelled. Reason: {reason}"));
    t.notify(
        other_party,
        "Order Cancelled",
        format!("Order #{number} has been cancelled. Reason: {reason}"),
    );
    Ok(t)
}

/// Opens the order's one and only dispute.
pub fn open_dispute(
    current: &OrderAggregate,
    user: &AuthUser,
    request: &OpenDisputeRequest,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    let order = &current.order;
    party_of(order, user)?;
    if current.dispute.is_some() {
        return Err(AppError::invalid_transition(
            "A dispute already exists for this order",
        ));
    }
    if order.status.is_terminal() {
        return Err(AppError::invalid_transition(format!(
            "Order is {} and can no longer be disputed",
            order.status
        )));
    }
    let reason = required_text(&request.reason, "Dispute reason")?;
    let description = required_text(&request.description, "Dispute description")?;

    let mut t = Transition::begin(current, now);
    t.aggregate.dispute = Some(Dispute {
        id: Uuid::new_v4(),
        order_id: order.id,
        initiated_by: user.user_id,
        reason: reason.clone(),
        description,
        evidence_url: optional_text(request.evidence_url.as_deref()),
        status: DisputeStatus::Open,
        created_at: now,
        resolution: None,
    });
    let o = t.order();
    o.status = OrderStatus::Disputed;
    let number = o.order_number.clone();
    let other_party = o.other_party(user.user_id);

    t.record(user, now, format!("Dispute opened: {reason}"));
    t.notify(
        other_party,
        "Dispute Opened",
        format!("A dispute has been opened on order #{number}: {reason}"),
    );
    Ok(t)
}
