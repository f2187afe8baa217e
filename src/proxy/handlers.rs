use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ImageResponse {
    Image { image_base64: String },
    Error { error: String },
}

pub async fn chat(req: web::Json<ChatRequest>, state: web::Data<AppState>) -> HttpResponse {
    let reply = state.chat.reply(&req.prompt).await;
    HttpResponse::Ok().json(ChatResponse { reply })
}

pub async fn generate_image(req: web::Json<ImageRequest>, state: web::Data<AppState>) -> HttpResponse {
    let body = match state.images.generate(&req.prompt).await {
        Ok(image_base64) => {
            info!("Generated image for prompt of {} chars", req.prompt.len());
            ImageResponse::Image { image_base64 }
        }
        Err(e) => {
            warn!("Image generation failed: {}", e);
            ImageResponse::Error { error: e.to_string() }
        }
    };
    HttpResponse::Ok().json(body)
}
