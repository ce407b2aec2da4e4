use std::{sync::Arc, time::Duration};

use crate::{
    auth::{IdentityProvider, RetryPolicy},
    config::Config,
    database::Repository,
    services::{generator::ImageGenerator, metrics::MetricsService, orders::PaymentGateway},
    storage::ObjectStorage,
};

pub mod docs;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod user;
pub mod wallpapers;

/// Collaborators shared by every request. Holds no per-request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<dyn Repository>,
    pub identity: Arc<dyn IdentityProvider>,
    pub generator: Arc<dyn ImageGenerator>,
    pub storage: Arc<dyn ObjectStorage>,
    pub payments: Arc<dyn PaymentGateway>,
    pub http: reqwest::Client,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn identity_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.identity_retries,
            Duration::from_millis(self.config.identity_retry_backoff_ms),
        )
    }
}
