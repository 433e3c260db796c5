//! Escrow release policy.
//!
//! Funds collected at payment stay held until one of three triggers releases
//! them to the seller: the buyer after delivery, an administrator at any
//! time (audited as an override when the order is not yet delivered), or the
//! automatic grace-period rule evaluated by the sweeper.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    machine::{Transition, require_buyer},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderAggregate, OrderStatus},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseTrigger {
    Buyer,
    Admin { notes: String },
    Auto,
}

/// Instant from which the order is due for auto-release, if it ever will be.
pub fn auto_release_eligible_at(order: &Order) -> Option<DateTime<Utc>> {
    if !order.auto_release_enabled {
        return None;
    }
    order
        .delivered_at
        .map(|delivered| delivered + Duration::days(i64::from(order.auto_release_days)))
}

/// Whole days elapsed since delivery.
pub fn days_since_delivery(order: &Order, now: DateTime<Utc>) -> Option<i64> {
    order.delivered_at.map(|d| (now - d).num_days())
}

pub fn auto_release_due(order: &Order, now: DateTime<Utc>) -> bool {
    order.funds_released_at.is_none()
        && auto_release_eligible_at(order).is_some_and(|eligible| now >= eligible)
}

/// Moves held funds to the seller and completes the order. Only escrow
/// payments not yet released are touched.
pub(crate) fn apply_release(aggregate: &mut OrderAggregate, now: DateTime<Utc>) {
    let order = &mut aggregate.order;
    order.funds_held = false;
    order.funds_released_at = Some(now);
    order.status = OrderStatus::Completed;

    for payment in aggregate
        .payments
        .iter_mut()
        .filter(|p| p.is_escrow && !p.is_released)
    {
        payment.is_released = true;
        payment.escrow_released_at = Some(now);
    }
}

fn check_releasable(
    current: &OrderAggregate,
    trigger: &ReleaseTrigger,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let order = &current.order;
    if !order.funds_held || order.funds_released_at.is_some() {
        return Err(AppError::invalid_transition("Funds already released"));
    }
    if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
        return Err(AppError::invalid_transition(format!(
            "Order is {}; there are no funds to release",
            order.status
        )));
    }
    if !order.payment_status.is_captured() {
        return Err(AppError::invalid_transition("Payment not completed"));
    }

    let dispute_open = current
        .dispute
        .as_ref()
        .is_some_and(|d| d.status.is_active());
    match trigger {
        ReleaseTrigger::Buyer => {
            if order.status != OrderStatus::Delivered {
                return Err(AppError::invalid_transition("Order must be delivered first"));
            }
        }
        ReleaseTrigger::Admin { .. } => {
            if dispute_open {
                return Err(AppError::invalid_transition(
                    "Order has an unresolved dispute; resolve it instead",
                ));
            }
        }
        ReleaseTrigger::Auto => {
            if order.status == OrderStatus::Disputed || dispute_open {
                return Err(AppError::invalid_transition("Order is under dispute"));
            }
            if !auto_release_due(order, now) {
                return Err(AppError::invalid_transition(
                    "Auto-release period has not elapsed",
                ));
            }
        }
    }
    Ok(())
}

pub fn release_funds(
    current: &OrderAggregate,
    actor: &AuthUser,
    trigger: &ReleaseTrigger,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    match trigger {
        ReleaseTrigger::Buyer => require_buyer(&current.order, actor)?,
        ReleaseTrigger::Admin { .. } => ensure_admin(actor)?,
        ReleaseTrigger::Auto => {}
    }
    check_releasable(current, trigger, now)?;

    let prior_status = current.order.status;
    let mut t = Transition::begin(current, now);
    apply_release(&mut t.aggregate, now);

    let note = match trigger {
        ReleaseTrigger::Buyer => "Funds released to seller by buyer".to_string(),
        ReleaseTrigger::Admin { notes } if prior_status == OrderStatus::Delivered => {
            format!("Funds released by admin. {}", notes.trim())
        }
        ReleaseTrigger::Admin { notes } => format!(
            "Funds released by admin override before delivery (order was {prior_status}). {}",
            notes.trim()
        ),
        ReleaseTrigger::Auto => "Funds auto-released after delivery period".to_string(),
    };
    t.record(actor, now, note.trim_end());

    let order = &t.aggregate.order;
    let body = match trigger {
        ReleaseTrigger::Auto => format!(
            "Funds for order #{} have been automatically released.",
            order.order_number
        ),
        _ => format!(
            "Funds for order #{} have been released to your account.",
            order.order_number
        ),
    };
    let seller_id = order.seller_id;
    t.notify(seller_id, "Payment Released", body);
    Ok(t)
}

/// Held-funds view for administrators.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EscrowPosition {
    pub order: Order,
    pub days_since_delivery: Option<i64>,
    pub auto_release_eligible_at: Option<DateTime<Utc>>,
    pub auto_release_due: bool,
}

impl EscrowPosition {
    pub fn of(order: Order, now: DateTime<Utc>) -> Self {
        let due = order.status != OrderStatus::Disputed && auto_release_due(&order, now);
        Self {
            days_since_delivery: days_since_delivery(&order, now),
            auto_release_eligible_at: auto_release_eligible_at(&order),
            auto_release_due: due,
            order,
        }
    }
}
