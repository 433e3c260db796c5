//! Persistence collaborator.
//!
//! The engine loads an [`OrderAggregate`], computes a [`Transition`] and
//! hands it back to [`OrderStore::commit`]. A commit is all-or-nothing and
//! is rejected with [`AppError::Conflict`](crate::error::AppError::Conflict)
//! when the stored order version no longer matches the version the
//! transition was computed from.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    machine::Transition,
    models::{Dispute, Listing, Order, OrderAggregate, OrderStatus},
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::SeaOrmStore;

#[derive(Debug, Clone)]
pub struct OrderQuery {
    /// Restrict to orders where this user is buyer or seller.
    pub party: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub newest_first: bool,
    pub limit: u64,
    pub offset: u64,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            party: None,
            status: None,
            newest_first: true,
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeFilter {
    /// Every dispute still awaiting a ruling.
    Open,
    Resolved,
    All,
}

impl DisputeFilter {
    pub fn matches(&self, dispute: &Dispute) -> bool {
        match self {
            DisputeFilter::Open => dispute.status.is_active(),
            DisputeFilter::Resolved => !dispute.status.is_active(),
            DisputeFilter::All => true,
        }
    }
}

/// Checks a transition against the currently stored aggregate.
pub(crate) fn check_commit(stored: &OrderAggregate, transition: &Transition) -> AppResult<()> {
    if stored.order.version != transition.base_version {
        return Err(AppError::Conflict);
    }
    let next = &transition.aggregate;
    if !next.history.extends(&stored.history) {
        return Err(AppError::Internal(anyhow::anyhow!(
            "status history of order {} would be rewritten",
            stored.order.id
        )));
    }
    if let (Some(existing), Some(dispute)) = (&stored.dispute, &next.dispute) {
        if existing.id != dispute.id {
            return Err(AppError::invalid_transition(
                "A dispute already exists for this order",
            ));
        }
    }
    Ok(())
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    /// Cheap round-trip proving the backend is reachable.
    async fn ping(&self) -> AppResult<()>;

    async fn insert_order(&self, aggregate: &OrderAggregate) -> AppResult<()>;

    /// Loads the order with its items, payments, history and dispute.
    async fn load_order(&self, id: Uuid) -> AppResult<Option<OrderAggregate>>;

    async fn commit(&self, transition: &Transition) -> AppResult<()>;

    /// Page of orders plus the total number matching.
    async fn list_orders(&self, query: &OrderQuery) -> AppResult<(Vec<Order>, u64)>;

    /// Orders still holding a completed payment in escrow.
    async fn held_orders(&self) -> AppResult<Vec<Order>>;

    /// Ids of held, delivered orders with auto-release enabled. The policy
    /// is re-checked per order at commit time.
    async fn auto_release_candidates(&self) -> AppResult<Vec<Uuid>>;

    async fn load_dispute(&self, id: Uuid) -> AppResult<Option<Dispute>>;

    async fn list_disputes(&self, filter: DisputeFilter) -> AppResult<Vec<Dispute>>;

    async fn load_listing(&self, id: Uuid) -> AppResult<Option<Listing>>;

    /// Where notifications for a user are delivered.
    async fn contact_address(&self, user_id: Uuid) -> AppResult<Option<String>>;
}
