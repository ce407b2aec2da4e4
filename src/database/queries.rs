use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::{AppError, Result};
use crate::models::*;

const ORDER_COLUMNS: &str = "order_no, created_at, user_email, amount, plan, expired_at, \
     order_status, paied_at, stripe_session_id, credits";

pub struct UserQueries;

impl UserQueries {
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT email, nickname, avatar_url, created_at FROM users WHERE email = $1 LIMIT 1",
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Concurrent first requests for one email both land here; the loser's
    /// insert is a no-op and both read back the winning row.
    pub async fn insert(pool: &PgPool, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (email, nickname, avatar_url, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&user.email)
        .bind(&user.nickname)
        .bind(&user.avatar_url)
        .execute(pool)
        .await?;

        Self::find_by_email(pool, &user.email)
            .await?
            .ok_or(AppError::NotFound)
    }
}

pub struct OrderQueries;

impl OrderQueries {
    pub async fn insert(pool: &PgPool, order: &NewOrder) -> Result<Order> {
        let sql = format!(
            r#"
            INSERT INTO orders (order_no, created_at, user_email, amount, plan, expired_at, order_status, credits)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(&order.order_no)
            .bind(order.created_at)
            .bind(&order.user_email)
            .bind(order.amount)
            .bind(&order.plan)
            .bind(order.expired_at)
            .bind(OrderStatus::Pending.code())
            .bind(order.credits)
            .fetch_one(pool)
            .await?;

        Ok(order)
    }

    pub async fn find_by_order_no(pool: &PgPool, order_no: &str) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = $1 LIMIT 1");

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_no)
            .fetch_optional(pool)
            .await?;

        Ok(order)
    }

    pub async fn update_status(
        pool: &PgPool,
        order_no: &str,
        status: OrderStatus,
        paied_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET order_status = $1, paied_at = $2 WHERE order_no = $3")
            .bind(status.code())
            .bind(paied_at)
            .bind(order_no)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn update_session(pool: &PgPool, order_no: &str, stripe_session_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET stripe_session_id = $1 WHERE order_no = $2")
            .bind(stripe_session_id)
            .bind(order_no)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn list_paid_unexpired(
        pool: &PgPool,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_email = $1 AND order_status = $2 AND expired_at >= $3
            ORDER BY created_at
            "#
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_email)
            .bind(OrderStatus::Paid.code())
            .bind(now)
            .fetch_all(pool)
            .await?;

        Ok(orders)
    }
}

pub struct WallpaperQueries;

impl WallpaperQueries {
    pub async fn insert(pool: &PgPool, wallpaper: &NewWallpaper) -> Result<Wallpaper> {
        let row = sqlx::query_as::<_, WallpaperRow>(
            r#"
            WITH inserted AS (
                INSERT INTO wallpapers (user_email, img_description, img_size, img_url, llm_name, llm_params, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, user_email, img_description, img_size, img_url, llm_name, llm_params, created_at
            )
            SELECT w.id, w.user_email, w.img_description, w.img_size, w.img_url, w.llm_name, w.llm_params, w.created_at,
                   u.email AS owner_email, u.nickname AS owner_nickname, u.avatar_url AS owner_avatar_url
            FROM inserted w
            LEFT JOIN users u ON u.email = w.user_email
            "#,
        )
        .bind(&wallpaper.user_email)
        .bind(&wallpaper.img_description)
        .bind(&wallpaper.img_size)
        .bind(&wallpaper.img_url)
        .bind(&wallpaper.llm_name)
        .bind(&wallpaper.llm_params)
        .bind(wallpaper.created_at)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }

    pub async fn count_by_user(pool: &PgPool, user_email: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallpapers WHERE user_email = $1")
            .bind(user_email)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn list_page(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Wallpaper>> {
        let rows = sqlx::query_as::<_, WallpaperRow>(
            r#"
            SELECT w.id, w.user_email, w.img_description, w.img_size, w.img_url, w.llm_name, w.llm_params, w.created_at,
                   u.email AS owner_email, u.nickname AS owner_nickname, u.avatar_url AS owner_avatar_url
            FROM wallpapers w
            LEFT JOIN users u ON u.email = w.user_email
            ORDER BY w.created_at DESC, w.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Wallpaper::from).collect())
    }
}
