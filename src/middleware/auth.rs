use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::{
    auth::authenticate,
    errors::AppError,
    handlers::AppState,
    models::User,
};

const SESSION_COOKIE: &str = "__session";

/// The identity behind the request, resolved once per request and handed
/// to the handler explicitly.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Session token from `Authorization: Bearer` or the `__session` cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers);

        let user = authenticate(
            state.identity.as_ref(),
            token.as_deref(),
            state.identity_retry_policy(),
        )
        .await?;

        Ok(AuthenticatedUser(user))
    }
}
