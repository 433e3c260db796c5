use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::OrderStatus;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeScope {
    #[default]
    Open,
    Resolved,
    All,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DisputeListQuery {
    /// `open` (default), `resolved` or `all`.
    pub scope: Option<DisputeScope>,
}
