use anyhow::Result;
use std::{env, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            other => anyhow::bail!("Unsupported storage backend: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,

    pub clerk_secret_key: String,
    pub clerk_api_url: String,
    pub clerk_jwt_key: Option<String>,
    pub identity_retries: u32,
    pub identity_retry_backoff_ms: u64,

    pub openai_api_key: String,
    pub openai_api_url: String,

    pub storage_backend: StorageBackend,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_bucket: String,
    pub local_storage_dir: String,
    /// Public host the stored assets are served from, without a trailing slash.
    pub image_host: String,

    pub stripe_private_key: String,
    pub stripe_api_url: String,
    pub web_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "postgresql://localhost/wallpapers".to_string(),
            database_max_connections: 20,
            clerk_secret_key: String::new(),
            clerk_api_url: "https://api.clerk.com/v1".to_string(),
            clerk_jwt_key: None,
            identity_retries: 3,
            identity_retry_backoff_ms: 1000,
            openai_api_key: String::new(),
            openai_api_url: "https://api.openai.com/v1".to_string(),
            storage_backend: StorageBackend::S3,
            s3_endpoint: None,
            s3_region: "auto".to_string(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            s3_bucket: "trysai".to_string(),
            local_storage_dir: "./uploads".to_string(),
            image_host: "http://localhost:3000/assets".to_string(),
            stripe_private_key: String::new(),
            stripe_api_url: "https://api.stripe.com/v1".to_string(),
            web_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| defaults.database_max_connections.to_string())
                .parse()?,
            clerk_secret_key: env::var("CLERK_SECRET_KEY").unwrap_or_default(),
            clerk_api_url: env::var("CLERK_API_URL").unwrap_or(defaults.clerk_api_url),
            clerk_jwt_key: env::var("CLERK_JWT_KEY").ok(),
            identity_retries: env::var("IDENTITY_RETRIES")
                .unwrap_or_else(|_| defaults.identity_retries.to_string())
                .parse()?,
            identity_retry_backoff_ms: env::var("IDENTITY_RETRY_BACKOFF_MS")
                .unwrap_or_else(|_| defaults.identity_retry_backoff_ms.to_string())
                .parse()?,
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_api_url: env::var("OPENAI_API_URL").unwrap_or(defaults.openai_api_url),
            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "s3".to_string())
                .parse()?,
            s3_endpoint: env::var("CF_R2_ENDPOINT").ok(),
            s3_region: env::var("AWS_REGION").unwrap_or(defaults.s3_region),
            s3_access_key: env::var("AWS_AK").unwrap_or_default(),
            s3_secret_key: env::var("AWS_SK").unwrap_or_default(),
            s3_bucket: env::var("AWS_BUCKET").unwrap_or(defaults.s3_bucket),
            local_storage_dir: env::var("LOCAL_STORAGE_DIR").unwrap_or(defaults.local_storage_dir),
            image_host: env::var("IMAGE_R2_HOST")
                .map(|host| host.trim_end_matches('/').to_string())
                .unwrap_or(defaults.image_host),
            stripe_private_key: env::var("STRIPE_PRIVATE_KEY").unwrap_or_default(),
            stripe_api_url: env::var("STRIPE_API_URL").unwrap_or(defaults.stripe_api_url),
            web_base_url: env::var("WEB_BASE_URL").unwrap_or(defaults.web_base_url),
        })
    }
}
