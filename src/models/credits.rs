use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreditsSummary {
    pub one_time_credits: i64,
    pub monthly_credits: i64,
    pub total_credits: i64,
    pub used_credits: i64,
    pub left_credits: i64,
}
