//! Dispute resolution.
//!
//! A dispute is resolved exactly once by an administrator with one of four
//! outcomes. Only a buyer-favorable ruling restores catalog stock. A partial
//! refund changes the payment status but leaves the order status where it
//! was (normally Disputed); the remaining escrow can then be released by an
//! administrator.

use chrono::{DateTime, Utc};

use crate::{
    dto::disputes::ResolveDisputeRequest,
    error::{AppError, AppResult},
    escrow::apply_release,
    machine::Transition,
    middleware::auth::{AuthUser, ensure_admin},
    models::{
        DisputeOutcome, DisputeResolution, DisputeStatus, OrderAggregate, OrderStatus,
        PaymentStatus, format_money,
    },
};

fn active_dispute_guard(current: &OrderAggregate) -> AppResult<()> {
    let dispute = current.dispute.as_ref().ok_or(AppError::NotFound)?;
    if !dispute.status.is_active() {
        return Err(AppError::invalid_transition("Dispute already resolved"));
    }
    Ok(())
}

pub fn resolve_dispute(
    current: &OrderAggregate,
    admin: &AuthUser,
    request: &ResolveDisputeRequest,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    ensure_admin(admin)?;
    active_dispute_guard(current)?;

    let order = &current.order;
    let resolution = request.resolution.trim().to_string();
    if resolution.is_empty() {
        return Err(AppError::validation("Resolution text is required"));
    }

    let refund_amount = match request.outcome {
        DisputeOutcome::BuyerFavorable => Some(order.total_amount),
        DisputeOutcome::PartialRefund => {
            let amount = request.refund_amount.ok_or_else(|| {
                AppError::validation("Refund amount is required for a partial refund")
            })?;
            if amount <= 0 || amount > order.total_amount {
                return Err(AppError::validation(format!(
                    "Refund amount must be between 0.01 and {}",
                    format_money(order.total_amount, &order.currency)
                )));
            }
            if !order.payment_status.is_captured() {
                return Err(AppError::invalid_transition("No captured payment to refund"));
            }
            Some(amount)
        }
        DisputeOutcome::SellerFavorable => {
            if !order.payment_status.is_captured() || !order.funds_held {
                return Err(AppError::invalid_transition("No held funds to release"));
            }
            None
        }
        DisputeOutcome::NoAction => None,
    };

    let mut t = Transition::begin(current, now);
    let number = order.order_number.clone();
    let (buyer_id, seller_id) = (order.buyer_id, order.seller_id);
    let currency = order.currency.clone();

    match request.outcome {
        DisputeOutcome::BuyerFavorable => {
            let stock_reserved = order.paid_at.is_some();
            let o = t.order();
            o.status = OrderStatus::Refunded;
            o.payment_status = PaymentStatus::Refunded;
            for payment in &mut t.aggregate.payments {
                payment.status = PaymentStatus::Refunded;
            }
            if stock_reserved {
                t.restore_stock();
            }
            t.notify(
                buyer_id,
                "Dispute Resolved - Refund Issued",
                format!(
                    "Your dispute for order #{number} has been resolved in your favor. Full refund issued."
                ),
            );
        }
        DisputeOutcome::SellerFavorable => {
            apply_release(&mut t.aggregate, now);
            t.notify(
                seller_id,
                "Dispute Resolved - Funds Released",
                format!(
                    "The dispute for order #{number} has been resolved in your favor. Funds released."
                ),
            );
        }
        DisputeOutcome::PartialRefund => {
            t.order().payment_status = PaymentStatus::PartiallyRefunded;
            let amount = format_money(refund_amount.unwrap_or_default(), &currency);
            t.notify(
                buyer_id,
                "Dispute Resolved - Partial Refund",
                format!(
                    "Dispute for order #{number} resolved. Partial refund of {amount} issued."
                ),
            );
        }
        DisputeOutcome::NoAction => {
            for party in [buyer_id, seller_id] {
                t.notify(
                    party,
                    "Dispute Resolved",
                    format!(
                        "The dispute for order #{number} was closed without changes: {resolution}"
                    ),
                );
            }
        }
    }

    if let Some(dispute) = t.aggregate.dispute.as_mut() {
        dispute.status = DisputeStatus::Resolved;
        dispute.resolution = Some(DisputeResolution {
            resolved_by: admin.user_id,
            resolved_at: now,
            outcome: request.outcome,
            resolution: resolution.clone(),
            refund_amount,
        });
    }

    t.record(
        admin,
        now,
        format!("Dispute resolved: {}. {resolution}", request.outcome),
    );
    Ok(t)
}

/// Moves a dispute along its review workflow. Resolution itself goes
/// through [`resolve_dispute`]; afterwards the only step left is Closed.
pub fn update_dispute_status(
    current: &OrderAggregate,
    admin: &AuthUser,
    status: DisputeStatus,
    now: DateTime<Utc>,
) -> AppResult<Transition> {
    ensure_admin(admin)?;
    let dispute = current.dispute.as_ref().ok_or(AppError::NotFound)?;

    if dispute.status == status {
        return Err(AppError::invalid_transition(format!(
            "Dispute is already {status}"
        )));
    }
    match (dispute.status, status) {
        (_, DisputeStatus::Resolved) => {
            return Err(AppError::validation(
                "Use the resolve operation to resolve a dispute",
            ));
        }
        (DisputeStatus::Closed, _) => {
            return Err(AppError::invalid_transition("Dispute is closed"));
        }
        (DisputeStatus::Resolved, DisputeStatus::Closed) => {}
        (DisputeStatus::Resolved, _) => {
            return Err(AppError::invalid_transition("Dispute already resolved"));
        }
        (_, DisputeStatus::Closed) => {
            return Err(AppError::invalid_transition(
                "Dispute must be resolved before it is closed",
            ));
        }
        (_, DisputeStatus::Open) => {
            return Err(AppError::invalid_transition("Dispute cannot be reopened"));
        }
        (
            _,
            DisputeStatus::UnderReview | DisputeStatus::AwaitingEvidence | DisputeStatus::Escalated,
        ) => {}
    }

    let mut t = Transition::begin(current, now);
    if let Some(dispute) = t.aggregate.dispute.as_mut() {
        dispute.status = status;
    }
    t.record(admin, now, format!("Dispute moved to {status}"));
    Ok(t)
}
