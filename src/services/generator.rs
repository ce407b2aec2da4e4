use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

pub const LLM_NAME: &str = "dall-e-3";
pub const IMG_SIZE: &str = "1792x1024";

/// Request body of the image generation call; stored verbatim as `llm_params`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGenerateParams {
    pub prompt: String,
    pub model: String,
    pub n: u32,
    pub quality: String,
    pub response_format: String,
    pub size: String,
    pub style: String,
}

impl ImageGenerateParams {
    pub fn wallpaper(description: &str) -> Self {
        Self {
            prompt: format!("generate desktop wallpaper image about {}", description),
            model: LLM_NAME.to_string(),
            n: 1,
            quality: "hd".to_string(),
            response_format: "url".to_string(),
            size: IMG_SIZE.to_string(),
            style: "vivid".to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// URL of the first generated image, `None` when the model returned none.
    async fn generate(&self, params: &ImageGenerateParams) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

pub struct OpenAiGenerator {
    client: Client,
    api_url: String,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(client: Client, api_url: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiGenerator {
    async fn generate(&self, params: &ImageGenerateParams) -> Result<Option<String>> {
        let response = self
            .client
            .post(format!("{}/images/generations", self.api_url))
            .bearer_auth(&self.api_key)
            .json(params)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Image generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "Image generation returned status {}: {}",
                status, body
            )));
        }

        let generated: GenerationResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse generation response: {}", e)))?;

        Ok(generated.data.into_iter().next().and_then(|image| image.url))
    }
}
