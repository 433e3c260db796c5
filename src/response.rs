use serde::Serialize;
use utoipa::ToSchema;

/// Paging details for list responses. Empty for single-resource responses.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

fn count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl Meta {
    /// One page of a store query that matched `total` rows.
    pub fn paged(page: i64, per_page: i64, total: u64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(count(total)),
        }
    }

    /// A list returned in full, such as the dispute queue or held escrow.
    pub fn complete(len: usize) -> Self {
        let total = count(len as u64);
        Self {
            page: Some(1),
            per_page: Some(total),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }

    /// Response carrying a single order, dispute or report.
    pub fn single(message: impl Into<String>, data: T) -> Self {
        Self::success(message, data, Some(Meta::empty()))
    }
}
