use axum::{extract::State, Json};

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::auth::AuthenticatedUser,
    models::{ApiResponse, CheckoutRequest, CheckoutResponse, PaySuccessRequest},
    services::{
        orders::{create_checkout, handle_order_session},
        users::save_user,
    },
};

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session for a new pending order", body = CheckoutResponse),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutResponse>>> {
    let user = save_user(state.database.as_ref(), &user).await?;
    let response = create_checkout(
        state.database.as_ref(),
        state.payments.as_ref(),
        &user,
        &request,
    )
    .await?;

    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    post,
    path = "/api/pay-success",
    request_body = PaySuccessRequest,
    responses(
        (status = 200, description = "Order behind the session marked as paid")
    ),
    tag = "orders"
)]
pub async fn pay_success(
    State(state): State<AppState>,
    Json(request): Json<PaySuccessRequest>,
) -> Result<Json<ApiResponse<()>>> {
    handle_order_session(
        state.database.as_ref(),
        state.payments.as_ref(),
        &request.session_id,
    )
    .await?;

    Ok(ApiResponse::ok(()))
}
