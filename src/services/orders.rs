use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    database::Repository,
    errors::{AppError, Result},
    models::{CheckoutRequest, CheckoutResponse, NewOrder, OrderStatus, User, MONTHLY_PLAN},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub order_no: String,
    pub customer_email: String,
    pub plan: String,
    pub amount: i32,
    pub currency: String,
    pub credits: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn order_no(&self) -> Option<&str> {
        self.metadata
            .get("order_no")
            .map(String::as_str)
            .filter(|no| !no.is_empty())
    }
}

/// Hosted payment gateway holding checkout state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession>;
}

pub struct StripeGateway {
    client: Client,
    api_url: String,
    secret_key: String,
    web_base_url: String,
}

impl StripeGateway {
    pub fn new(client: Client, api_url: &str, secret_key: &str, web_base_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            web_base_url: web_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn checkout_form(&self, request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let monthly = request.plan == MONTHLY_PLAN;
        let mut form = vec![
            ("mode".to_string(), if monthly { "subscription" } else { "payment" }.to_string()),
            ("customer_email".to_string(), request.customer_email.clone()),
            (
                "success_url".to_string(),
                format!("{}/pay-success/{{CHECKOUT_SESSION_ID}}", self.web_base_url),
            ),
            ("cancel_url".to_string(), format!("{}/pricing", self.web_base_url)),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), request.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), request.amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                format!("{} wallpaper credits", request.credits),
            ),
            ("metadata[order_no]".to_string(), request.order_no.clone()),
            ("metadata[user_email]".to_string(), request.customer_email.clone()),
            ("metadata[credits]".to_string(), request.credits.to_string()),
        ];

        if monthly {
            form.push((
                "line_items[0][price_data][recurring][interval]".to_string(),
                "month".to_string(),
            ));
        }

        form
    }

    async fn parse_session(response: reqwest::Response) -> Result<CheckoutSession> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Payment(format!("Stripe returned status {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("Failed to parse checkout session: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .form(&self.checkout_form(request))
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Checkout session request failed: {}", e)))?;

        Self::parse_session(response).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        let response = self
            .client
            .get(format!(
                "{}/checkout/sessions/{}",
                self.api_url,
                urlencoding::encode(session_id)
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Checkout session lookup failed: {}", e)))?;

        Self::parse_session(response).await
    }
}

/// Monthly grants last a month, anything else a year.
pub fn order_expiry(plan: &str, created_at: DateTime<Utc>) -> DateTime<Utc> {
    let months = if plan == MONTHLY_PLAN { 1 } else { 12 };
    created_at
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Records a pending order and opens a checkout session for it.
pub async fn create_checkout(
    db: &dyn Repository,
    gateway: &dyn PaymentGateway,
    user: &User,
    request: &CheckoutRequest,
) -> Result<CheckoutResponse> {
    if request.plan.is_empty() || request.amount <= 0 || request.credits <= 0 {
        return Err(AppError::InvalidParams);
    }

    let created_at = Utc::now();
    let order = db
        .insert_order(&NewOrder {
            order_no: Uuid::new_v4().simple().to_string(),
            created_at,
            user_email: user.email.clone(),
            amount: request.amount,
            plan: request.plan.clone(),
            expired_at: order_expiry(&request.plan, created_at),
            credits: request.credits,
        })
        .await?;

    let session = gateway
        .create_checkout_session(&CheckoutSessionRequest {
            order_no: order.order_no.clone(),
            customer_email: user.email.clone(),
            plan: order.plan.clone(),
            amount: order.amount,
            currency: request.currency.clone(),
            credits: order.credits,
        })
        .await
        .map_err(|e| {
            // The order stays pending with no session and never grants credits.
            tracing::warn!(order_no = %order.order_no, "Checkout session not created, order left pending");
            e
        })?;

    db.update_order_session(&order.order_no, &session.id).await?;

    tracing::info!(order_no = %order.order_no, session_id = %session.id, "Created checkout session");

    Ok(CheckoutResponse {
        order_no: order.order_no,
        session_id: session.id,
        url: session.url,
    })
}

/// Marks the order behind a completed checkout session as paid.
pub async fn handle_order_session(
    db: &dyn Repository,
    gateway: &dyn PaymentGateway,
    session_id: &str,
) -> Result<()> {
    if session_id.is_empty() {
        return Err(AppError::InvalidParams);
    }

    let session = gateway.retrieve_checkout_session(session_id).await?;
    let order_no = session
        .order_no()
        .ok_or_else(|| AppError::Payment(format!("Checkout session {} has no order_no", session_id)))?;

    db.update_order_status(order_no, OrderStatus::Paid, Utc::now()).await?;

    tracing::info!(order_no, session_id, "Order paid");
    Ok(())
}
