use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing entity, or one the caller is not a party to.
    #[error("Not Found")]
    NotFound,

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden")]
    Forbidden,

    /// The order changed between load and commit.
    #[error("Concurrent modification, please retry")]
    Conflict,

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_transition(reason: impl Into<String>) -> Self {
        AppError::InvalidStateTransition(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        AppError::Validation(reason.into())
    }

    /// Transient collaborator failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict | AppError::OrmError(_))
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::OrmError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
