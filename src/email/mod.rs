//! Verification email delivery.
//!
//! Sending is fire-and-forget from the caller's point of view: a failed
//! delivery is logged and the signup still succeeds.

use async_trait::async_trait;
use tracing::info;
use url::Url;

use crate::config::EmailConfig;
use crate::error::AppError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(
        &self,
        email: &str,
        display_name: &str,
        token: &str,
    ) -> Result<(), AppError>;
}

/// Builds the link the user follows to confirm their address.
pub fn verification_link(base: &str, token: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::ConfigError(format!("invalid verification url {}: {}", base, e)))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

/// Records deliveries in the log instead of talking to a mail server.
pub struct LogMailer {
    verification_url: String,
    sender: String,
}

impl LogMailer {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            verification_url: config.verification_url.clone(),
            sender: config.sender.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(
        &self,
        email: &str,
        display_name: &str,
        token: &str,
    ) -> Result<(), AppError> {
        let mut link = verification_link(&self.verification_url, token)?;
        // The query carries a live access token
        link.set_query(None);
        info!(
            from = %self.sender,
            to = %email,
            "Verification email for {}: {}",
            display_name,
            link
        );
        Ok(())
    }
}
