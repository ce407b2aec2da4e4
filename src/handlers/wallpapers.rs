use axum::{extract::State, Json};

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::auth::AuthenticatedUser,
    models::{ApiResponse, GalleryRequest, GenerateWallpaperRequest, Wallpaper},
    services::{
        metrics::generation_outcome,
        wallpapers::{generate_wallpaper, list_gallery},
    },
};

#[utoipa::path(
    post,
    path = "/api/protected/gen-wallpaper",
    request_body = GenerateWallpaperRequest,
    responses(
        (status = 200, description = "Generated wallpaper, or a business error envelope", body = Wallpaper),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "wallpapers"
)]
pub async fn gen_wallpaper(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<GenerateWallpaperRequest>,
) -> Result<Json<ApiResponse<Wallpaper>>> {
    let result = generate_wallpaper(&state, &user, &request.description).await;
    state.metrics.record_generation(generation_outcome(&result));

    Ok(ApiResponse::ok(result?))
}

#[utoipa::path(
    post,
    path = "/api/get-wallpapers",
    request_body = GalleryRequest,
    responses(
        (status = 200, description = "Newest wallpapers first", body = [Wallpaper])
    ),
    tag = "wallpapers"
)]
pub async fn get_wallpapers(
    State(state): State<AppState>,
    Json(request): Json<GalleryRequest>,
) -> Json<ApiResponse<Vec<Wallpaper>>> {
    let wallpapers = list_gallery(state.database.as_ref(), request.page, request.limit).await;
    ApiResponse::ok(wallpapers)
}
