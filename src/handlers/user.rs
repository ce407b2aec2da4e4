use axum::{extract::State, Json};
use chrono::Utc;

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::auth::AuthenticatedUser,
    models::{ApiResponse, UserInfoResponse},
    services::{credits::get_user_credits, users::save_user},
};

#[utoipa::path(
    post,
    path = "/api/get-user-info",
    responses(
        (status = 200, description = "Current user with credits", body = UserInfoResponse),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "user"
)]
pub async fn get_user_info(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ApiResponse<UserInfoResponse>>> {
    let user = save_user(state.database.as_ref(), &user).await?;
    let credits = get_user_credits(state.database.as_ref(), &user.email, Utc::now()).await;

    Ok(ApiResponse::ok(UserInfoResponse { user, credits }))
}
