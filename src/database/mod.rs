use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::errors::Result;
use crate::models::{NewOrder, NewWallpaper, Order, OrderStatus, User, Wallpaper};

pub mod memory;
pub mod queries;

pub use memory::MemoryDatabase;
use queries::{OrderQueries, UserQueries, WallpaperQueries};

/// Persistence operations over the `users`, `orders` and `wallpapers` tables.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Inserts the user unless the email is taken, then returns the stored
    /// row. The store assigns `created_at`.
    async fn insert_user(&self, user: &User) -> Result<User>;

    async fn insert_order(&self, order: &NewOrder) -> Result<Order>;

    async fn find_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>>;

    async fn update_order_status(
        &self,
        order_no: &str,
        status: OrderStatus,
        paied_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn update_order_session(&self, order_no: &str, stripe_session_id: &str) -> Result<()>;

    /// Paid orders of `user_email` whose `expired_at` is not before `now`.
    async fn get_user_paid_orders(&self, user_email: &str, now: DateTime<Utc>) -> Result<Vec<Order>>;

    async fn insert_wallpaper(&self, wallpaper: &NewWallpaper) -> Result<Wallpaper>;

    async fn count_user_wallpapers(&self, user_email: &str) -> Result<i64>;

    /// Newest first, each joined with its owner's public fields when present.
    async fn list_wallpapers(&self, limit: i64, offset: i64) -> Result<Vec<Wallpaper>>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl Repository for Database {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserQueries::find_by_email(&self.pool, email).await
    }

    async fn insert_user(&self, user: &User) -> Result<User> {
        UserQueries::insert(&self.pool, user).await
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<Order> {
        OrderQueries::insert(&self.pool, order).await
    }

    async fn find_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>> {
        OrderQueries::find_by_order_no(&self.pool, order_no).await
    }

    async fn update_order_status(
        &self,
        order_no: &str,
        status: OrderStatus,
        paied_at: DateTime<Utc>,
    ) -> Result<()> {
        OrderQueries::update_status(&self.pool, order_no, status, paied_at).await
    }

    async fn update_order_session(&self, order_no: &str, stripe_session_id: &str) -> Result<()> {
        OrderQueries::update_session(&self.pool, order_no, stripe_session_id).await
    }

    async fn get_user_paid_orders(&self, user_email: &str, now: DateTime<Utc>) -> Result<Vec<Order>> {
        OrderQueries::list_paid_unexpired(&self.pool, user_email, now).await
    }

    async fn insert_wallpaper(&self, wallpaper: &NewWallpaper) -> Result<Wallpaper> {
        WallpaperQueries::insert(&self.pool, wallpaper).await
    }

    async fn count_user_wallpapers(&self, user_email: &str) -> Result<i64> {
        WallpaperQueries::count_by_user(&self.pool, user_email).await
    }

    async fn list_wallpapers(&self, limit: i64, offset: i64) -> Result<Vec<Wallpaper>> {
        WallpaperQueries::list_page(&self.pool, limit, offset).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
