//! Proxy module for MiniChat server
//!
//! Outbound calls to market-data, completion and image providers. Every
//! failure here is absorbed into a fallback answer rather than an error.

pub mod chat;
pub mod completion;
pub mod handlers;
pub mod image;
pub mod market;

use std::time::Duration;

use crate::config::ProvidersConfig;
use crate::error::{AppError, ProxyError};

pub use chat::ChatService;
pub use completion::CompletionClient;
pub use image::ImageClient;
pub use market::MarketDataClient;

/// Builds the chat service and image client sharing one HTTP client.
pub fn build_clients(config: &ProvidersConfig) -> Result<(ChatService, ImageClient), AppError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .build()
        .map_err(ProxyError::from)?;

    let market = MarketDataClient::new(
        http.clone(),
        config.exchangerate_base_url.clone(),
        config.exchangerate_api_key.clone(),
        config.binance_base_url.clone(),
    );
    let completion = CompletionClient::new(
        http.clone(),
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_max_tokens,
    );
    let images = ImageClient::new(
        http,
        config.stability_base_url.clone(),
        config.stability_api_key.clone(),
    );

    Ok((ChatService::new(market, completion), images))
}
