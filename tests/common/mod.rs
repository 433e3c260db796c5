#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use marketplace_escrow::{
    clock::{Clock, ManualClock},
    config::EngineConfig,
    dto::orders::{PayOrderRequest, PlaceOrderRequest, ShipOrderRequest},
    middleware::auth::AuthUser,
    error::{AppError, AppResult},
    machine::Transition,
    models::{Dispute, Listing, ListingStatus, Money, Order, OrderAggregate, PaymentMethod},
    notify::Notifier,
    response::ApiResponse,
    services::order_service,
    state::AppState,
    store::{DisputeFilter, InMemoryStore, OrderQuery, OrderStore},
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every notification; can be switched to fail on demand.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    pub async fn subjects_for(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| s.to == to)
            .map(|s| s.subject.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        recipient_address: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("smtp relay unavailable");
        }
        self.sent.lock().await.push(Sent {
            to: recipient_address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Delegates to an [`InMemoryStore`] but refuses to commit one order, as a
/// database would when a row is stuck behind a failing constraint.
pub struct BrokenOrderStore {
    inner: Arc<InMemoryStore>,
    broken: Uuid,
}

impl BrokenOrderStore {
    pub fn new(inner: Arc<InMemoryStore>, broken: Uuid) -> Self {
        Self { inner, broken }
    }
}

#[async_trait]
impl OrderStore for BrokenOrderStore {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }

    async fn insert_order(&self, aggregate: &OrderAggregate) -> AppResult<()> {
        self.inner.insert_order(aggregate).await
    }

    async fn load_order(&self, id: Uuid) -> AppResult<Option<OrderAggregate>> {
        self.inner.load_order(id).await
    }

    async fn commit(&self, transition: &Transition) -> AppResult<()> {
        if transition.aggregate.order.id == self.broken {
            return Err(AppError::Internal(anyhow::anyhow!(
                "storage rejected order {}",
                self.broken
            )));
        }
        self.inner.commit(transition).await
    }

    async fn list_orders(&self, query: &OrderQuery) -> AppResult<(Vec<Order>, u64)> {
        self.inner.list_orders(query).await
    }

    async fn held_orders(&self) -> AppResult<Vec<Order>> {
        self.inner.held_orders().await
    }

    async fn auto_release_candidates(&self) -> AppResult<Vec<Uuid>> {
        self.inner.auto_release_candidates().await
    }

    async fn load_dispute(&self, id: Uuid) -> AppResult<Option<Dispute>> {
        self.inner.load_dispute(id).await
    }

    async fn list_disputes(&self, filter: DisputeFilter) -> AppResult<Vec<Dispute>> {
        self.inner.list_disputes(filter).await
    }

    async fn load_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        self.inner.load_listing(id).await
    }

    async fn contact_address(&self, user_id: Uuid) -> AppResult<Option<String>> {
        self.inner.contact_address(user_id).await
    }
}

pub const BUYER_EMAIL: &str = "buyer@example.com";
pub const SELLER_EMAIL: &str = "seller@example.com";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub buyer: AuthUser,
    pub seller: AuthUser,
    pub admin: AuthUser,
    pub listing_id: Uuid,
}

impl Harness {
    /// No tax, so order totals equal `price * quantity`.
    pub async fn new(price: Money, stock: i32) -> Self {
        let config = EngineConfig {
            tax_rate_bps: 0,
            ..EngineConfig::default()
        };
        Self::with_config(config, price, stock).await
    }

    pub async fn with_config(config: EngineConfig, price: Money, stock: i32) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let notifier = Arc::new(RecordingNotifier::default());

        let buyer = AuthUser::user(Uuid::new_v4());
        let seller = AuthUser::user(Uuid::new_v4());
        let admin = AuthUser::admin(Uuid::new_v4());

        let listing_id = Uuid::new_v4();
        store
            .put_listing(Listing {
                id: listing_id,
                seller_id: seller.user_id,
                title: "Mirrorless Camera".into(),
                description: Some("24MP body, two batteries".into()),
                price,
                quantity: stock,
                status: ListingStatus::Active,
                sold_at: None,
            })
            .await;
        store.put_contact(buyer.user_id, BUYER_EMAIL).await;
        store.put_contact(seller.user_id, SELLER_EMAIL).await;

        let state = AppState::new(store.clone(), config)
            .with_notifier(notifier.clone())
            .with_clock(clock.clone());

        Self {
            state,
            store,
            clock,
            notifier,
            buyer,
            seller,
            admin,
            listing_id,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn order_request(&self, quantity: i32) -> PlaceOrderRequest {
        PlaceOrderRequest {
            listing_id: self.listing_id,
            quantity,
            shipping_cost: 0,
            discount_amount: 0,
            shipping_address: "12 Long Street, Cape Town".into(),
            buyer_notes: None,
            auto_release_days: None,
            auto_release_enabled: None,
        }
    }

    pub async fn place_with(&self, request: PlaceOrderRequest) -> OrderAggregate {
        data(
            order_service::place_order(&self.state, &self.buyer, request)
                .await
                .expect("place order"),
        )
    }

    pub async fn place(&self, quantity: i32) -> OrderAggregate {
        self.place_with(self.order_request(quantity)).await
    }

    pub async fn pay(&self, order: &OrderAggregate) -> OrderAggregate {
        data(
            order_service::pay_order(
                &self.state,
                &self.buyer,
                order.order.id,
                PayOrderRequest {
                    method: PaymentMethod::CreditCard,
                    amount: order.order.total_amount,
                },
            )
            .await
            .expect("pay order"),
        )
    }

    pub async fn ship(&self, id: Uuid) -> OrderAggregate {
        data(
            order_service::ship_order(
                &self.state,
                &self.seller,
                id,
                ShipOrderRequest {
                    tracking_number: "TRK-100200".into(),
                    courier_service: "The Courier Guy".into(),
                },
            )
            .await
            .expect("ship order"),
        )
    }

    pub async fn deliver(&self, id: Uuid) -> OrderAggregate {
        data(
            order_service::confirm_delivery(&self.state, &self.buyer, id)
                .await
                .expect("confirm delivery"),
        )
    }

    /// Places, pays and ships an order.
    pub async fn shipped_order(&self, quantity: i32) -> OrderAggregate {
        let placed = self.place(quantity).await;
        self.pay(&placed).await;
        self.ship(placed.order.id).await
    }

    /// Places, pays, ships and delivers an order at the current clock time.
    pub async fn delivered_order(&self, quantity: i32) -> OrderAggregate {
        let shipped = self.shipped_order(quantity).await;
        self.deliver(shipped.order.id).await
    }

    pub async fn reload(&self, id: Uuid) -> OrderAggregate {
        self.store
            .load_order(id)
            .await
            .expect("load order")
            .expect("order exists")
    }

    pub async fn stock(&self) -> i32 {
        self.store
            .load_listing(self.listing_id)
            .await
            .expect("load listing")
            .expect("listing exists")
            .quantity
    }
}

pub fn data<T>(resp: ApiResponse<T>) -> T {
    resp.data.expect("response data")
}
