use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Dispute, DisputeOutcome, DisputeStatus, Money, OrderAggregate};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResolveDisputeRequest {
    pub outcome: DisputeOutcome,
    pub resolution: String,
    /// Required for `partial_refund`, ignored otherwise.
    pub refund_amount: Option<Money>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateDisputeStatusRequest {
    pub status: DisputeStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisputeList {
    pub items: Vec<Dispute>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisputeDetails {
    pub dispute: Dispute,
    pub order: OrderAggregate,
}
