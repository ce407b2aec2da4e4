use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WallpaperOwner {
    pub email: String,
    pub nickname: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Wallpaper {
    pub id: i64,
    pub user_email: String,
    pub img_description: String,
    pub img_size: String,
    pub img_url: String,
    pub llm_name: String,
    /// Generation parameters as sent to the model, serialized JSON.
    pub llm_params: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_user: Option<WallpaperOwner>,
}

#[derive(Debug, Clone)]
pub struct NewWallpaper {
    pub user_email: String,
    pub img_description: String,
    pub img_size: String,
    pub img_url: String,
    pub llm_name: String,
    pub llm_params: String,
    pub created_at: DateTime<Utc>,
}

/// A wallpaper row left-joined with its owner's public fields.
#[derive(Debug, FromRow)]
pub struct WallpaperRow {
    pub id: i64,
    pub user_email: String,
    pub img_description: String,
    pub img_size: String,
    pub img_url: String,
    pub llm_name: String,
    pub llm_params: String,
    pub created_at: DateTime<Utc>,
    pub owner_email: Option<String>,
    pub owner_nickname: Option<String>,
    pub owner_avatar_url: Option<String>,
}

impl From<WallpaperRow> for Wallpaper {
    fn from(row: WallpaperRow) -> Self {
        let created_user = row.owner_email.map(|email| WallpaperOwner {
            email,
            nickname: row.owner_nickname.unwrap_or_default(),
            avatar_url: row.owner_avatar_url.unwrap_or_default(),
        });

        Wallpaper {
            id: row.id,
            user_email: row.user_email,
            img_description: row.img_description,
            img_size: row.img_size,
            img_url: row.img_url,
            llm_name: row.llm_name,
            llm_params: row.llm_params,
            created_at: row.created_at,
            created_user,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateWallpaperRequest {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GalleryRequest {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    50
}
