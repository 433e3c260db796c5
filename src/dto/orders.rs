use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Money, Order, PaymentMethod};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub listing_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub shipping_cost: Money,
    #[serde(default)]
    pub discount_amount: Money,
    pub shipping_address: String,
    pub buyer_notes: Option<String>,
    /// Defaults to the engine's configured grace period.
    pub auto_release_days: Option<i32>,
    pub auto_release_enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PayOrderRequest {
    pub method: PaymentMethod,
    pub amount: Money,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShipOrderRequest {
    pub tracking_number: String,
    pub courier_service: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OpenDisputeRequest {
    pub reason: String,
    pub description: String,
    pub evidence_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AdminReleaseRequest {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
