use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

const ENGINE_PATH: &str = "/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
    weight: u32,
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    steps: u32,
    width: u32,
    height: u32,
    cfg_scale: u32,
    samples: u32,
    text_prompts: [TextPrompt<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    base64: String,
}

/// Stability text-to-image client. Returns images as PNG data URIs.
pub struct ImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ImageClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ProxyError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProxyError::MissingApiKey("stability"))?;

        let body = GenerationRequest {
            steps: 30,
            width: 1024,
            height: 1024,
            cfg_scale: 7,
            samples: 1,
            text_prompts: [TextPrompt { text: prompt, weight: 1 }],
        };

        let response = self
            .http
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), ENGINE_PATH))
            .header(ACCEPT, "application/json")
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProxyError::ResponseError(format!("{}: {}", status, text)));
        }

        let data: GenerationResponse = response.json().await?;
        let artifact = data
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| ProxyError::ResponseError("No image returned from Stability API.".into()))?;

        Ok(format!("data:image/png;base64,{}", artifact.base64))
    }
}
