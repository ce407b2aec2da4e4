use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::wallpapers::gen_wallpaper,
        crate::handlers::wallpapers::get_wallpapers,
        crate::handlers::user::get_user_info,
        crate::handlers::orders::checkout,
        crate::handlers::orders::pay_success,
    ),
    components(
        schemas(
            crate::models::Wallpaper,
            crate::models::WallpaperOwner,
            crate::models::GenerateWallpaperRequest,
            crate::models::GalleryRequest,
            crate::models::User,
            crate::models::UserInfoResponse,
            crate::models::CreditsSummary,
            crate::models::CheckoutRequest,
            crate::models::CheckoutResponse,
            crate::models::PaySuccessRequest,
        )
    ),
    tags(
        (name = "wallpapers", description = "Wallpaper generation and gallery"),
        (name = "user", description = "Signed-in user and credits"),
        (name = "orders", description = "Credit purchases")
    ),
    info(
        title = "Wallpaper API",
        version = "1.0.0",
        description = "Generates AI wallpapers from text descriptions"
    )
)]
pub struct ApiDoc;

pub fn create_docs_router() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
