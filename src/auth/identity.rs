use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    auth::{
        jwt::SessionVerifier,
        retry::{with_retry, RetryPolicy},
    },
    errors::{AppError, Result},
    models::User,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub image_url: Option<String>,
}

/// Hosted identity provider: sessions resolve to a user id, user ids to a profile.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the session is missing, expired or forged.
    async fn resolve_session(&self, token: &str) -> Result<Option<String>>;

    async fn fetch_profile(&self, user_id: &str) -> Result<IdentityProfile>;
}

#[derive(Debug, Deserialize)]
struct ClerkEmailAddress {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct ClerkUser {
    id: String,
    #[serde(default)]
    email_addresses: Vec<ClerkEmailAddress>,
    first_name: Option<String>,
    image_url: Option<String>,
}

pub struct ClerkIdentity {
    client: Client,
    api_url: String,
    secret_key: String,
    verifier: SessionVerifier,
}

impl ClerkIdentity {
    pub fn new(client: Client, api_url: &str, secret_key: &str, verifier: SessionVerifier) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            verifier,
        }
    }
}

#[async_trait]
impl IdentityProvider for ClerkIdentity {
    async fn resolve_session(&self, token: &str) -> Result<Option<String>> {
        match self.verifier.verify(token) {
            Ok(claims) => Ok(Some(claims.sub)),
            Err(AppError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<IdentityProfile> {
        let url = format!("{}/users/{}", self.api_url, urlencoding::encode(user_id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("User lookup request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Identity(format!(
                "User lookup returned status {}",
                response.status()
            )));
        }

        let user: ClerkUser = response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("Failed to parse user: {}", e)))?;

        Ok(IdentityProfile {
            user_id: user.id,
            email: user.email_addresses.into_iter().next().map(|e| e.email_address),
            first_name: user.first_name,
            image_url: user.image_url,
        })
    }
}

/// Resolves a session token to the request's user. The profile lookup is
/// the only collaborator call in the service that is retried.
pub async fn authenticate(
    provider: &dyn IdentityProvider,
    token: Option<&str>,
    policy: RetryPolicy,
) -> Result<User> {
    let token = token.filter(|t| !t.is_empty()).ok_or(AppError::Unauthorized)?;

    let user_id = provider
        .resolve_session(token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let profile = with_retry(policy, "identity profile lookup", || provider.fetch_profile(&user_id)).await?;

    let email = profile
        .email
        .filter(|email| !email.is_empty())
        .ok_or(AppError::EmailNotVerified)?;

    Ok(User::new(
        email,
        profile.first_name.unwrap_or_default(),
        profile.image_url.unwrap_or_default(),
    ))
}
