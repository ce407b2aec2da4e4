use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::database::Repository;
use crate::errors::{AppError, Result};
use crate::models::{NewOrder, NewWallpaper, Order, OrderStatus, User, Wallpaper, WallpaperOwner};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    orders: Vec<Order>,
    wallpapers: Vec<Wallpaper>,
    next_wallpaper_id: i64,
}

/// In-process store with the same semantics as the Postgres tables.
/// Used by tests and for running the server without a database.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    pub async fn wallpaper_count(&self) -> usize {
        self.tables.lock().await.wallpapers.len()
    }
}

fn owner_of(users: &HashMap<String, User>, email: &str) -> Option<WallpaperOwner> {
    users.get(email).map(|user| WallpaperOwner {
        email: user.email.clone(),
        nickname: user.nickname.clone(),
        avatar_url: user.avatar_url.clone(),
    })
}

#[async_trait]
impl Repository for MemoryDatabase {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.users.get(&user.email) {
            return Ok(existing.clone());
        }

        let stored = User {
            created_at: Some(Utc::now()),
            ..user.clone()
        };
        tables.users.insert(stored.email.clone(), stored.clone());
        Ok(stored)
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        if tables.orders.iter().any(|o| o.order_no == order.order_no) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "duplicate key value violates unique constraint \"orders_order_no_key\""
            )));
        }

        let stored = Order {
            order_no: order.order_no.clone(),
            created_at: order.created_at,
            user_email: order.user_email.clone(),
            amount: order.amount,
            plan: order.plan.clone(),
            expired_at: order.expired_at,
            order_status: OrderStatus::Pending.code(),
            paied_at: None,
            stripe_session_id: None,
            credits: order.credits,
        };
        tables.orders.push(stored.clone());
        Ok(stored)
    }

    async fn find_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.order_no == order_no).cloned())
    }

    async fn update_order_status(
        &self,
        order_no: &str,
        status: OrderStatus,
        paied_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.order_no == order_no)
            .ok_or(AppError::NotFound)?;
        order.order_status = status.code();
        order.paied_at = Some(paied_at);
        Ok(())
    }

    async fn update_order_session(&self, order_no: &str, stripe_session_id: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.order_no == order_no)
            .ok_or(AppError::NotFound)?;
        order.stripe_session_id = Some(stripe_session_id.to_string());
        Ok(())
    }

    async fn get_user_paid_orders(&self, user_email: &str, now: DateTime<Utc>) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.user_email == user_email && o.is_paid() && o.expired_at >= now)
            .cloned()
            .collect())
    }

    async fn insert_wallpaper(&self, wallpaper: &NewWallpaper) -> Result<Wallpaper> {
        let mut tables = self.tables.lock().await;
        tables.next_wallpaper_id += 1;

        let stored = Wallpaper {
            id: tables.next_wallpaper_id,
            user_email: wallpaper.user_email.clone(),
            img_description: wallpaper.img_description.clone(),
            img_size: wallpaper.img_size.clone(),
            img_url: wallpaper.img_url.clone(),
            llm_name: wallpaper.llm_name.clone(),
            llm_params: wallpaper.llm_params.clone(),
            created_at: wallpaper.created_at,
            created_user: owner_of(&tables.users, &wallpaper.user_email),
        };
        tables.wallpapers.push(stored.clone());
        Ok(stored)
    }

    async fn count_user_wallpapers(&self, user_email: &str) -> Result<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .wallpapers
            .iter()
            .filter(|w| w.user_email == user_email)
            .count() as i64)
    }

    async fn list_wallpapers(&self, limit: i64, offset: i64) -> Result<Vec<Wallpaper>> {
        let tables = self.tables.lock().await;

        let mut rows: Vec<&Wallpaper> = tables.wallpapers.iter().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|w| Wallpaper {
                created_user: owner_of(&tables.users, &w.user_email),
                ..w.clone()
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_wallpaper(email: &str, description: &str, created_at: DateTime<Utc>) -> NewWallpaper {
        NewWallpaper {
            user_email: email.to_string(),
            img_description: description.to_string(),
            img_size: "1792x1024".to_string(),
            img_url: format!("https://assets.test/wallpapers/{}.png", description),
            llm_name: "dall-e-3".to_string(),
            llm_params: "{}".to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_with_owner() {
        let db = MemoryDatabase::new();
        db.insert_user(&User::new("a@example.com", "Ann", "https://img.test/a.png"))
            .await
            .unwrap();

        let base = Utc::now();
        db.insert_wallpaper(&new_wallpaper("a@example.com", "old", base)).await.unwrap();
        db.insert_wallpaper(&new_wallpaper("ghost@example.com", "new", base + Duration::seconds(5)))
            .await
            .unwrap();

        let page = db.list_wallpapers(10, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].img_description, "new");
        assert!(page[0].created_user.is_none());
        assert_eq!(page[1].created_user.as_ref().unwrap().nickname, "Ann");
    }

    #[tokio::test]
    async fn test_paid_orders_filter_status_and_expiry() {
        let db = MemoryDatabase::new();
        let now = Utc::now();

        for (no, expired_at) in [("live", now + Duration::days(3)), ("stale", now - Duration::days(1))] {
            db.insert_order(&NewOrder {
                order_no: no.to_string(),
                created_at: now,
                user_email: "a@example.com".to_string(),
                amount: 990,
                plan: "monthly".to_string(),
                expired_at,
                credits: 30,
            })
            .await
            .unwrap();
            db.update_order_status(no, OrderStatus::Paid, now).await.unwrap();
        }

        db.insert_order(&NewOrder {
            order_no: "pending".to_string(),
            created_at: now,
            user_email: "a@example.com".to_string(),
            amount: 990,
            plan: "one-time".to_string(),
            expired_at: now + Duration::days(3),
            credits: 10,
        })
        .await
        .unwrap();

        let orders = db.get_user_paid_orders("a@example.com", now).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_no, "live");
    }

    #[tokio::test]
    async fn test_insert_existing_user_returns_stored_row() {
        let db = MemoryDatabase::new();
        let first = db
            .insert_user(&User::new("a@example.com", "Ann", "https://img.test/a.png"))
            .await
            .unwrap();

        let second = db
            .insert_user(&User::new("a@example.com", "Other", ""))
            .await
            .unwrap();

        assert_eq!(second, first);
        assert_eq!(db.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let db = MemoryDatabase::new();
        let result = db.update_order_session("nope", "cs_test").await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
