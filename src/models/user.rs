use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::CreditsSummary;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub email: String,
    pub nickname: String,
    pub avatar_url: String,
    /// Assigned by the store on first insert.
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(email: impl Into<String>, nickname: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            nickname: nickname.into(),
            avatar_url: avatar_url.into(),
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserInfoResponse {
    #[serde(flatten)]
    pub user: User,
    pub credits: CreditsSummary,
}
