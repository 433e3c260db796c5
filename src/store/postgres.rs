//! Postgres-backed store on SeaORM.
//!
//! A commit runs in one database transaction. The order row is locked with
//! `FOR UPDATE` first, so concurrent commits for the same order queue behind
//! each other and the loser sees the bumped version.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    entity::{
        disputes::{
            ActiveModel as DisputeActive, Column as DisputeCol, Entity as Disputes,
            Model as DisputeModel,
        },
        listings::{ActiveModel as ListingActive, Entity as Listings, Model as ListingModel},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        order_status_history::{
            ActiveModel as HistoryActive, Column as HistoryCol, Entity as OrderStatusHistory,
            Model as HistoryModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    history::StatusHistory,
    machine::Transition,
    models::{
        Dispute, DisputeResolution, Listing, Order, OrderAggregate, OrderItem, Payment,
        PaymentStatus, StatusHistoryEntry,
    },
    store::{DisputeFilter, OrderQuery, OrderStore, check_commit},
};

#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

fn utc(dt: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

async fn load_aggregate<C: ConnectionTrait>(
    db: &C,
    order: OrderModel,
) -> AppResult<OrderAggregate> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(db)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let payments = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_asc(PaymentCol::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let entries = OrderStatusHistory::find()
        .filter(HistoryCol::OrderId.eq(order.id))
        .order_by_asc(HistoryCol::Sequence)
        .all(db)
        .await?
        .into_iter()
        .map(history_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let dispute = Disputes::find()
        .filter(DisputeCol::OrderId.eq(order.id))
        .one(db)
        .await?
        .map(dispute_from_entity)
        .transpose()?;

    Ok(OrderAggregate {
        order: order_from_entity(order)?,
        items,
        payments,
        history: StatusHistory::from_entries(entries)?,
        dispute,
    })
}

fn map_dispute_insert(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::invalid_transition("A dispute already exists for this order")
        }
        _ => AppError::OrmError(err),
    }
}

#[async_trait]
impl OrderStore for SeaOrmStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> AppResult<()> {
        self.conn.ping().await?;
        Ok(())
    }

    async fn insert_order(&self, aggregate: &OrderAggregate) -> AppResult<()> {
        let txn = self.conn.begin().await?;

        order_active(&aggregate.order).insert(&txn).await?;
        for item in &aggregate.items {
            order_item_active(item).insert(&txn).await?;
        }
        for payment in &aggregate.payments {
            payment_active(payment).insert(&txn).await?;
        }
        for entry in aggregate.history.entries() {
            history_active(entry).insert(&txn).await?;
        }
        if let Some(dispute) = &aggregate.dispute {
            dispute_active(dispute)
                .insert(&txn)
                .await
                .map_err(map_dispute_insert)?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn load_order(&self, id: Uuid) -> AppResult<Option<OrderAggregate>> {
        let Some(order) = Orders::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };
        load_aggregate(&self.conn, order).await.map(Some)
    }

    async fn commit(&self, transition: &Transition) -> AppResult<()> {
        let next = &transition.aggregate;
        let txn = self.conn.begin().await?;

        let locked = Orders::find_by_id(next.order.id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;
        let stored = load_aggregate(&txn, locked).await?;
        check_commit(&stored, transition)?;

        order_active(&next.order).update(&txn).await?;

        for payment in &next.payments {
            let active = payment_active(payment);
            if stored.payments.iter().any(|p| p.id == payment.id) {
                active.update(&txn).await?;
            } else {
                active.insert(&txn).await?;
            }
        }

        for entry in next.history.since(stored.history.last_sequence()) {
            history_active(entry).insert(&txn).await?;
        }

        match (&stored.dispute, &next.dispute) {
            (None, Some(dispute)) => {
                dispute_active(dispute)
                    .insert(&txn)
                    .await
                    .map_err(map_dispute_insert)?;
            }
            (Some(_), Some(dispute)) => {
                dispute_active(dispute).update(&txn).await?;
            }
            _ => {}
        }

        for adjustment in &transition.stock {
            let Some(model) = Listings::find_by_id(adjustment.listing_id)
                .lock(LockType::Update)
                .one(&txn)
                .await?
            else {
                tracing::warn!(
                    listing_id = %adjustment.listing_id,
                    "listing missing, stock not adjusted"
                );
                continue;
            };
            let mut listing = listing_from_entity(model)?;
            listing.apply_stock_delta(adjustment.delta, transition.at)?;

            ListingActive {
                id: Set(listing.id),
                quantity: Set(listing.quantity),
                status: Set(listing.status.to_string()),
                sold_at: Set(listing.sold_at.map(Into::into)),
                ..Default::default()
            }
            .update(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> AppResult<(Vec<Order>, u64)> {
        let mut condition = Condition::all();
        if let Some(user) = query.party {
            condition = condition.add(
                Condition::any()
                    .add(OrderCol::BuyerId.eq(user))
                    .add(OrderCol::SellerId.eq(user)),
            );
        }
        if let Some(status) = query.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }

        let mut finder = Orders::find().filter(condition);
        finder = if query.newest_first {
            finder.order_by_desc(OrderCol::CreatedAt)
        } else {
            finder.order_by_asc(OrderCol::CreatedAt)
        };

        let total = finder.clone().count(&self.conn).await?;
        let orders = finder
            .limit(query.limit)
            .offset(query.offset)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((orders, total))
    }

    async fn held_orders(&self) -> AppResult<Vec<Order>> {
        Orders::find()
            .filter(OrderCol::FundsHeld.eq(true))
            .filter(OrderCol::PaymentStatus.eq(PaymentStatus::Completed.as_str()))
            .order_by_asc(OrderCol::DeliveredAt)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect()
    }

    async fn auto_release_candidates(&self) -> AppResult<Vec<Uuid>> {
        let ids = Orders::find()
            .select_only()
            .column(OrderCol::Id)
            .filter(OrderCol::FundsHeld.eq(true))
            .filter(OrderCol::AutoReleaseEnabled.eq(true))
            .filter(OrderCol::DeliveredAt.is_not_null())
            .filter(OrderCol::PaymentStatus.eq(PaymentStatus::Completed.as_str()))
            .into_tuple::<Uuid>()
            .all(&self.conn)
            .await?;
        Ok(ids)
    }

    async fn load_dispute(&self, id: Uuid) -> AppResult<Option<Dispute>> {
        Disputes::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(dispute_from_entity)
            .transpose()
    }

    async fn list_disputes(&self, filter: DisputeFilter) -> AppResult<Vec<Dispute>> {
        let settled = ["resolved", "closed"];
        let finder = match filter {
            DisputeFilter::Open => Disputes::find().filter(DisputeCol::Status.is_not_in(settled)),
            DisputeFilter::Resolved => Disputes::find().filter(DisputeCol::Status.is_in(settled)),
            DisputeFilter::All => Disputes::find(),
        };
        finder
            .order_by_desc(DisputeCol::CreatedAt)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(dispute_from_entity)
            .collect()
    }

    async fn load_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        Listings::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(listing_from_entity)
            .transpose()
    }

    async fn contact_address(&self, user_id: Uuid) -> AppResult<Option<String>> {
        Ok(Users::find_by_id(user_id)
            .one(&self.conn)
            .await?
            .map(|user| user.email))
    }
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        order_number: model.order_number,
        buyer_id: model.buyer_id,
        seller_id: model.seller_id,
        subtotal: model.subtotal,
        tax_amount: model.tax_amount,
        shipping_cost: model.shipping_cost,
        discount_amount: model.discount_amount,
        total_amount: model.total_amount,
        currency: model.currency,
        status: model.status.parse()?,
        payment_status: model.payment_status.parse()?,
        shipping_address: model.shipping_address,
        tracking_number: model.tracking_number,
        courier_service: model.courier_service,
        buyer_notes: model.buyer_notes,
        cancellation_reason: model.cancellation_reason,
        funds_held: model.funds_held,
        funds_released_at: model.funds_released_at.map(utc),
        auto_release_enabled: model.auto_release_enabled,
        auto_release_days: model.auto_release_days,
        created_at: utc(model.created_at),
        paid_at: model.paid_at.map(utc),
        shipped_at: model.shipped_at.map(utc),
        delivered_at: model.delivered_at.map(utc),
        cancelled_at: model.cancelled_at.map(utc),
        version: model.version,
    })
}

fn order_active(order: &Order) -> OrderActive {
    OrderActive {
        id: Set(order.id),
        order_number: Set(order.order_number.clone()),
        buyer_id: Set(order.buyer_id),
        seller_id: Set(order.seller_id),
        subtotal: Set(order.subtotal),
        tax_amount: Set(order.tax_amount),
        shipping_cost: Set(order.shipping_cost),
        discount_amount: Set(order.discount_amount),
        total_amount: Set(order.total_amount),
        currency: Set(order.currency.clone()),
        status: Set(order.status.to_string()),
        payment_status: Set(order.payment_status.to_string()),
        shipping_address: Set(order.shipping_address.clone()),
        tracking_number: Set(order.tracking_number.clone()),
        courier_service: Set(order.courier_service.clone()),
        buyer_notes: Set(order.buyer_notes.clone()),
        cancellation_reason: Set(order.cancellation_reason.clone()),
        funds_held: Set(order.funds_held),
        funds_released_at: Set(order.funds_released_at.map(Into::into)),
        auto_release_enabled: Set(order.auto_release_enabled),
        auto_release_days: Set(order.auto_release_days),
        created_at: Set(order.created_at.into()),
        paid_at: Set(order.paid_at.map(Into::into)),
        shipped_at: Set(order.shipped_at.map(Into::into)),
        delivered_at: Set(order.delivered_at.map(Into::into)),
        cancelled_at: Set(order.cancelled_at.map(Into::into)),
        version: Set(order.version),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        listing_id: model.listing_id,
        product_name: model.product_name,
        product_description: model.product_description,
        quantity: model.quantity,
        unit_price: model.unit_price,
        total_price: model.total_price,
        sku: model.sku,
    }
}

fn order_item_active(item: &OrderItem) -> OrderItemActive {
    OrderItemActive {
        id: Set(item.id),
        order_id: Set(item.order_id),
        listing_id: Set(item.listing_id),
        product_name: Set(item.product_name.clone()),
        product_description: Set(item.product_description.clone()),
        quantity: Set(item.quantity),
        unit_price: Set(item.unit_price),
        total_price: Set(item.total_price),
        sku: Set(item.sku.clone()),
    }
}

fn payment_from_entity(model: PaymentModel) -> AppResult<Payment> {
    Ok(Payment {
        id: model.id,
        order_id: model.order_id,
        amount: model.amount,
        currency: model.currency,
        method: model.method.parse()?,
        transaction_id: model.transaction_id,
        gateway_reference: model.gateway_reference,
        gateway_response: model.gateway_response,
        status: model.status.parse()?,
        created_at: utc(model.created_at),
        processed_at: model.processed_at.map(utc),
        is_escrow: model.is_escrow,
        is_released: model.is_released,
        escrow_released_at: model.escrow_released_at.map(utc),
    })
}

fn payment_active(payment: &Payment) -> PaymentActive {
    PaymentActive {
        id: Set(payment.id),
        order_id: Set(payment.order_id),
        amount: Set(payment.amount),
        currency: Set(payment.currency.clone()),
        method: Set(payment.method.to_string()),
        transaction_id: Set(payment.transaction_id.clone()),
        gateway_reference: Set(payment.gateway_reference.clone()),
        gateway_response: Set(payment.gateway_response.clone()),
        status: Set(payment.status.to_string()),
        created_at: Set(payment.created_at.into()),
        processed_at: Set(payment.processed_at.map(Into::into)),
        is_escrow: Set(payment.is_escrow),
        is_released: Set(payment.is_released),
        escrow_released_at: Set(payment.escrow_released_at.map(Into::into)),
    }
}

fn history_from_entity(model: HistoryModel) -> AppResult<StatusHistoryEntry> {
    Ok(StatusHistoryEntry {
        id: model.id,
        order_id: model.order_id,
        sequence: model.sequence,
        status: model.status.parse()?,
        updated_by: model.updated_by,
        recorded_at: utc(model.recorded_at),
        note: model.note,
    })
}

fn history_active(entry: &StatusHistoryEntry) -> HistoryActive {
    HistoryActive {
        id: Set(entry.id),
        order_id: Set(entry.order_id),
        sequence: Set(entry.sequence),
        status: Set(entry.status.to_string()),
        updated_by: Set(entry.updated_by),
        recorded_at: Set(entry.recorded_at.into()),
        note: Set(entry.note.clone()),
    }
}

fn dispute_from_entity(model: DisputeModel) -> AppResult<Dispute> {
    let resolution = match (model.resolved_by, model.resolved_at, model.outcome, model.resolution) {
        (Some(resolved_by), Some(resolved_at), Some(outcome), Some(resolution)) => {
            Some(DisputeResolution {
                resolved_by,
                resolved_at: utc(resolved_at),
                outcome: outcome.parse()?,
                resolution,
                refund_amount: model.refund_amount,
            })
        }
        _ => None,
    };
    Ok(Dispute {
        id: model.id,
        order_id: model.order_id,
        initiated_by: model.initiated_by,
        reason: model.reason,
        description: model.description,
        evidence_url: model.evidence_url,
        status: model.status.parse()?,
        created_at: utc(model.created_at),
        resolution,
    })
}

fn dispute_active(dispute: &Dispute) -> DisputeActive {
    let resolution = dispute.resolution.as_ref();
    DisputeActive {
        id: Set(dispute.id),
        order_id: Set(dispute.order_id),
        initiated_by: Set(dispute.initiated_by),
        reason: Set(dispute.reason.clone()),
        description: Set(dispute.description.clone()),
        evidence_url: Set(dispute.evidence_url.clone()),
        status: Set(dispute.status.to_string()),
        created_at: Set(dispute.created_at.into()),
        resolved_by: Set(resolution.map(|r| r.resolved_by)),
        resolved_at: Set(resolution.map(|r| r.resolved_at.into())),
        outcome: Set(resolution.map(|r| r.outcome.to_string())),
        resolution: Set(resolution.map(|r| r.resolution.clone())),
        refund_amount: Set(resolution.and_then(|r| r.refund_amount)),
    }
}

fn listing_from_entity(model: ListingModel) -> AppResult<Listing> {
    Ok(Listing {
        id: model.id,
        seller_id: model.seller_id,
        title: model.title,
        description: model.description,
        price: model.price,
        quantity: model.quantity,
        status: model.status.parse()?,
        sold_at: model.sold_at.map(utc),
    })
}
