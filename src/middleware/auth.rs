use std::str::FromStr;

use axum::{extract::FromRequestParts, http::HeaderMap};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    /// Background jobs such as the auto-release sweeper.
    System,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::validation(format!("Unknown role `{s}`"))),
        }
    }
}

/// Caller identity, already authenticated upstream.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::User,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn system() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: Role::System,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Identity recorded in status history; `None` for the system actor.
    pub fn recorded_as(&self) -> Option<Uuid> {
        match self.role {
            Role::System => None,
            Role::User | Role::Admin => Some(self.user_id),
        }
    }
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .ok_or_else(|| AppError::validation(format!("Missing {name} header")))?
        .to_str()
        .map_err(|_| AppError::validation(format!("Invalid {name} header")))
}

/// Reads the identity forwarded by the authenticating gateway.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user_id = Uuid::parse_str(header(&parts.headers, USER_ID_HEADER)?)
            .map_err(|_| AppError::validation("Invalid user id"))?;
        let role = header(&parts.headers, USER_ROLE_HEADER)?.parse::<Role>()?;

        Ok(AuthUser { user_id, role })
    }
}
