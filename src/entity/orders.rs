use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub shipping_cost: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub courier_service: Option<String>,
    pub buyer_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub funds_held: bool,
    pub funds_released_at: Option<DateTimeWithTimeZone>,
    pub auto_release_enabled: bool,
    pub auto_release_days: i32,
    pub created_at: DateTimeWithTimeZone,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub shipped_at: Option<DateTimeWithTimeZone>,
    pub delivered_at: Option<DateTimeWithTimeZone>,
    pub cancelled_at: Option<DateTimeWithTimeZone>,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_one = "super::disputes::Entity")]
    Disputes,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::disputes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Disputes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
