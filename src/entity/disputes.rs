use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "disputes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub initiated_by: Uuid,
    pub reason: String,
    pub description: String,
    pub evidence_url: Option<String>,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub outcome: Option<String>,
    pub resolution: Option<String>,
    pub refund_amount: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
