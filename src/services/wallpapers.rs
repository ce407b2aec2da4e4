use chrono::Utc;

use crate::{
    database::Repository,
    errors::{AppError, Result},
    handlers::AppState,
    models::{NewWallpaper, User, Wallpaper},
    services::{
        credits::get_user_credits,
        generator::{ImageGenerateParams, IMG_SIZE, LLM_NAME},
        users::save_user,
    },
    storage::{transfer_from_url, wallpaper_key},
};

pub const MAX_PAGE_SIZE: i64 = 100;

/// Runs one generation request for an authenticated user. Steps run in
/// order and the first failure ends the request; the row is written only
/// after the asset is stored.
///
/// Credits are checked, not reserved: concurrent requests from the same
/// user can all pass the check before any of them writes its row.
pub async fn generate_wallpaper(state: &AppState, user: &User, description: &str) -> Result<Wallpaper> {
    let user = save_user(state.database.as_ref(), user).await?;

    let credits = get_user_credits(state.database.as_ref(), &user.email, Utc::now()).await;
    if credits.left_credits < 1 {
        tracing::info!(email = %user.email, left = credits.left_credits, "Not enough credits");
        return Err(AppError::InsufficientCredits);
    }

    let description = description.trim();
    if description.is_empty() {
        return Err(AppError::InvalidParams);
    }

    let params = ImageGenerateParams::wallpaper(description);
    let created_at = Utc::now();

    let raw_img_url = state
        .generator
        .generate(&params)
        .await?
        .ok_or_else(|| AppError::Generation("No image url returned".to_string()))?;

    let img_url = transfer_from_url(
        &state.http,
        state.storage.as_ref(),
        &raw_img_url,
        &wallpaper_key(description),
    )
    .await?;

    let llm_params = serde_json::to_string(&params).map_err(|e| AppError::Internal(e.into()))?;

    let mut wallpaper = state
        .database
        .insert_wallpaper(&NewWallpaper {
            user_email: user.email.clone(),
            img_description: description.to_string(),
            img_size: IMG_SIZE.to_string(),
            img_url,
            llm_name: LLM_NAME.to_string(),
            llm_params,
            created_at,
        })
        .await?;

    if wallpaper.created_user.is_none() {
        wallpaper.created_user = Some(crate::models::WallpaperOwner {
            email: user.email.clone(),
            nickname: user.nickname.clone(),
            avatar_url: user.avatar_url.clone(),
        });
    }

    tracing::info!(id = wallpaper.id, email = %user.email, "Wallpaper generated");
    Ok(wallpaper)
}

/// Row offset of a 1-based page; out-of-range inputs are clamped to 1.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1) * limit.max(1)
}

/// Newest-first page of the public gallery. Read failures give an empty page.
pub async fn list_gallery(db: &dyn Repository, page: i64, limit: i64) -> Vec<Wallpaper> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let offset = page_offset(page, limit);

    match db.list_wallpapers(limit, offset).await {
        Ok(wallpapers) => wallpapers,
        Err(e) => {
            tracing::error!(page, limit, "Failed to list wallpapers: {}", e);
            Vec::new()
        }
    }
}
