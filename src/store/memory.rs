use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    machine::Transition,
    models::{Dispute, Listing, Order, OrderAggregate, PaymentStatus},
    store::{DisputeFilter, OrderQuery, OrderStore, check_commit},
};

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<Uuid, OrderAggregate>,
    listings: HashMap<Uuid, Listing>,
    contacts: HashMap<Uuid, String>,
}

/// Process-local store. All commits are serialized behind one lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_listing(&self, listing: Listing) {
        self.tables
            .lock()
            .await
            .listings
            .insert(listing.id, listing);
    }

    pub async fn put_contact(&self, user_id: Uuid, address: impl Into<String>) {
        self.tables
            .lock()
            .await
            .contacts
            .insert(user_id, address.into());
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "in-memory"
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn insert_order(&self, aggregate: &OrderAggregate) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.orders.contains_key(&aggregate.order.id) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "order {} already exists",
                aggregate.order.id
            )));
        }
        tables.orders.insert(aggregate.order.id, aggregate.clone());
        Ok(())
    }

    async fn load_order(&self, id: Uuid) -> AppResult<Option<OrderAggregate>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn commit(&self, transition: &Transition) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let order_id = transition.aggregate.order.id;
        let stored = tables.orders.get(&order_id).ok_or(AppError::NotFound)?;
        check_commit(stored, transition)?;

        // Stage listing changes so a failing adjustment leaves nothing behind.
        let mut staged: HashMap<Uuid, Listing> = HashMap::new();
        for adjustment in &transition.stock {
            if !staged.contains_key(&adjustment.listing_id) {
                let Some(listing) = tables.listings.get(&adjustment.listing_id) else {
                    tracing::warn!(
                        listing_id = %adjustment.listing_id,
                        "listing missing, stock not adjusted"
                    );
                    continue;
                };
                staged.insert(adjustment.listing_id, listing.clone());
            }
            if let Some(listing) = staged.get_mut(&adjustment.listing_id) {
                listing.apply_stock_delta(adjustment.delta, transition.at)?;
            }
        }

        tables.listings.extend(staged);
        tables
            .orders
            .insert(order_id, transition.aggregate.clone());
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> AppResult<(Vec<Order>, u64)> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .map(|a| &a.order)
            .filter(|o| query.party.is_none_or(|user| o.is_party(user)))
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        if query.newest_first {
            orders.reverse();
        }
        let total = orders.len() as u64;
        let page = orders
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn held_orders(&self) -> AppResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .map(|a| &a.order)
            .filter(|o| o.funds_held && o.payment_status == PaymentStatus::Completed)
            .cloned()
            .collect())
    }

    async fn auto_release_candidates(&self) -> AppResult<Vec<Uuid>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .map(|a| &a.order)
            .filter(|o| {
                o.funds_held
                    && o.auto_release_enabled
                    && o.delivered_at.is_some()
                    && o.payment_status == PaymentStatus::Completed
            })
            .map(|o| o.id)
            .collect())
    }

    async fn load_dispute(&self, id: Uuid) -> AppResult<Option<Dispute>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .filter_map(|a| a.dispute.as_ref())
            .find(|d| d.id == id)
            .cloned())
    }

    async fn list_disputes(&self, filter: DisputeFilter) -> AppResult<Vec<Dispute>> {
        let tables = self.tables.lock().await;
        let mut disputes: Vec<Dispute> = tables
            .orders
            .values()
            .filter_map(|a| a.dispute.as_ref())
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        disputes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(disputes)
    }

    async fn load_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        Ok(self.tables.lock().await.listings.get(&id).cloned())
    }

    async fn contact_address(&self, user_id: Uuid) -> AppResult<Option<String>> {
        Ok(self.tables.lock().await.contacts.get(&user_id).cloned())
    }
}
