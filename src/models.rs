use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    history::StatusHistory,
};

/// Monetary amount in minor units (cents).
pub type Money = i64;

/// Generates `as_str`, `Display` and `FromStr` for a status enum whose
/// variants are stored as snake_case strings.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::Internal(anyhow::anyhow!(
                        concat!("unknown ", stringify!($name), " value `{}`"),
                        other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
    Disputed,
}

string_enum!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
    Refunded => "refunded",
    Disputed => "disputed",
});

impl OrderStatus {
    /// Completed, Cancelled and Refunded accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

string_enum!(PaymentStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
    PartiallyRefunded => "partially_refunded",
});

impl PaymentStatus {
    /// Whether buyer money has been captured and is (at least partly) still in escrow.
    pub fn is_captured(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Eft,
    PayFast,
    PayPal,
    Stripe,
    CashOnDelivery,
}

string_enum!(PaymentMethod {
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Eft => "eft",
    PayFast => "pay_fast",
    PayPal => "pay_pal",
    Stripe => "stripe",
    CashOnDelivery => "cash_on_delivery",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    AwaitingEvidence,
    Resolved,
    Closed,
    Escalated,
}

string_enum!(DisputeStatus {
    Open => "open",
    UnderReview => "under_review",
    AwaitingEvidence => "awaiting_evidence",
    Resolved => "resolved",
    Closed => "closed",
    Escalated => "escalated",
});

impl DisputeStatus {
    /// Still awaiting a ruling.
    pub fn is_active(&self) -> bool {
        !matches!(self, DisputeStatus::Resolved | DisputeStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    BuyerFavorable,
    SellerFavorable,
    PartialRefund,
    NoAction,
}

string_enum!(DisputeOutcome {
    BuyerFavorable => "buyer_favorable",
    SellerFavorable => "seller_favorable",
    PartialRefund => "partial_refund",
    NoAction => "no_action",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    PendingApproval,
    Active,
    Sold,
    Expired,
    Suspended,
    Deleted,
}

string_enum!(ListingStatus {
    Draft => "draft",
    PendingApproval => "pending_approval",
    Active => "active",
    Sold => "sold",
    Expired => "expired",
    Suspended => "suspended",
    Deleted => "deleted",
});

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub courier_service: Option<String>,
    pub buyer_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub funds_held: bool,
    pub funds_released_at: Option<DateTime<Utc>>,
    pub auto_release_enabled: bool,
    pub auto_release_days: i32,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Order {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// The counterparty of `user_id`, assuming `user_id` is a party.
    pub fn other_party(&self, user_id: Uuid) -> Uuid {
        if self.buyer_id == user_id {
            self.seller_id
        } else {
            self.buyer_id
        }
    }
}

/// Line snapshot taken at purchase time. `listing_id` is only followed for
/// stock adjustments.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub product_name: String,
    pub product_description: Option<String>,
    pub quantity: i32,
    pub unit_price: Money,
    pub total_price: Money,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub gateway_reference: Option<String>,
    pub gateway_response: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub is_escrow: bool,
    pub is_released: bool,
    pub escrow_released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sequence: i32,
    pub status: OrderStatus,
    /// `None` when the change was made by the system (e.g. auto-release).
    pub updated_by: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DisputeResolution {
    pub resolved_by: Uuid,
    pub resolved_at: DateTime<Utc>,
    pub outcome: DisputeOutcome,
    pub resolution: String,
    pub refund_amount: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dispute {
    pub id: Uuid,
    pub order_id: Uuid,
    pub initiated_by: Uuid,
    pub reason: String,
    pub description: String,
    pub evidence_url: Option<String>,
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
    pub resolution: Option<DisputeResolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Money,
    pub quantity: i32,
    pub status: ListingStatus,
    pub sold_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Applies a stock movement. Reaching zero marks the listing Sold;
    /// restoring stock to a Sold listing makes it Active again.
    pub fn apply_stock_delta(&mut self, delta: i32, now: DateTime<Utc>) -> AppResult<()> {
        let quantity = self.quantity + delta;
        if quantity < 0 {
            return Err(AppError::Validation(format!(
                "Insufficient stock for listing {}",
                self.id
            )));
        }
        self.quantity = quantity;
        if quantity == 0 && delta < 0 {
            self.status = ListingStatus::Sold;
            self.sold_at = Some(now);
        } else if delta > 0 && self.status == ListingStatus::Sold {
            self.status = ListingStatus::Active;
            self.sold_at = None;
        }
        Ok(())
    }
}

/// Stock movement against a catalog listing, committed with the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub listing_id: Uuid,
    pub delta: i32,
}

/// An order with everything it owns, loaded and committed as one unit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderAggregate {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    #[schema(value_type = Vec<StatusHistoryEntry>)]
    pub history: StatusHistory,
    pub dispute: Option<Dispute>,
}

/// Formats minor units as `1000.00 ZAR`.
pub fn format_money(amount: Money, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02} {currency}", abs / 100, abs % 100)
}
