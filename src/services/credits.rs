use chrono::{DateTime, Utc};

use crate::{
    database::Repository,
    models::{CreditsSummary, Order},
};

pub const BASE_ONE_TIME_CREDITS: i64 = 1;
pub const BASE_MONTHLY_CREDITS: i64 = 2;

impl CreditsSummary {
    /// Allowance every user has before buying anything.
    pub fn baseline() -> Self {
        let total = BASE_ONE_TIME_CREDITS + BASE_MONTHLY_CREDITS;
        Self {
            one_time_credits: BASE_ONE_TIME_CREDITS,
            monthly_credits: BASE_MONTHLY_CREDITS,
            total_credits: total,
            used_credits: 0,
            left_credits: total,
        }
    }
}

/// Adds the credits of paid, unexpired orders to the baseline and charges
/// one credit per generated wallpaper.
pub fn summarize(orders: &[Order], used_credits: i64, now: DateTime<Utc>) -> CreditsSummary {
    let mut credits = CreditsSummary::baseline();

    for order in orders.iter().filter(|o| o.is_paid() && o.expired_at >= now) {
        let amount = i64::from(order.credits);
        if order.is_monthly() {
            credits.monthly_credits += amount;
        } else {
            credits.one_time_credits += amount;
        }
        credits.total_credits += amount;
    }

    credits.used_credits = used_credits;
    credits.left_credits = credits.total_credits - used_credits;
    credits
}

/// Never fails: a store error yields the baseline summary.
pub async fn get_user_credits(db: &dyn Repository, user_email: &str, now: DateTime<Utc>) -> CreditsSummary {
    let used = match db.count_user_wallpapers(user_email).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(user_email, "Failed to count wallpapers, using baseline credits: {}", e);
            return CreditsSummary::baseline();
        }
    };

    match db.get_user_paid_orders(user_email, now).await {
        Ok(orders) => summarize(&orders, used, now),
        Err(e) => {
            tracing::warn!(user_email, "Failed to load orders, using baseline credits: {}", e);
            CreditsSummary::baseline()
        }
    }
}
