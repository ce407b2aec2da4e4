use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub const MONTHLY_PLAN: &str = "monthly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending = 1,
    Paid = 2,
}

impl OrderStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub order_no: String,
    pub created_at: DateTime<Utc>,
    pub user_email: String,
    pub amount: i32,
    pub plan: String,
    pub expired_at: DateTime<Utc>,
    pub order_status: i32,
    pub paied_at: Option<DateTime<Utc>>,
    pub stripe_session_id: Option<String>,
    pub credits: i32,
}

impl Order {
    pub fn is_monthly(&self) -> bool {
        self.plan == MONTHLY_PLAN
    }

    pub fn is_paid(&self) -> bool {
        self.order_status == OrderStatus::Paid.code()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: String,
    pub created_at: DateTime<Utc>,
    pub user_email: String,
    pub amount: i32,
    pub plan: String,
    pub expired_at: DateTime<Utc>,
    pub credits: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub plan: String,
    pub amount: i32,
    pub credits: i32,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_no: String,
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaySuccessRequest {
    pub session_id: String,
}
