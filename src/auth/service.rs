use std::sync::Arc;
use tracing::{error, info, warn};

use super::password::hash_password;
use super::token::{Claims, TokenService};
use crate::db::{User, UserStore};
use crate::email::Mailer;
use crate::error::{AppError, AuthError, DatabaseError};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signup, verification and login flows on top of the token service.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    mailer: Arc<dyn Mailer>,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        mailer: Arc<dyn Mailer>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            bcrypt_cost,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Creates an unverified account and mails a verification token.
    pub async fn signup(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken.into());
        }

        let password_hash = hash_password(password, self.bcrypt_cost)?;
        let user = match self.users.create_user(&User::new(email, password_hash)).await {
            Ok(user) => user,
            // Lost a race with a concurrent signup for the same address
            Err(DatabaseError::Duplicate) => return Err(AuthError::EmailTaken.into()),
            Err(e) => return Err(e.into()),
        };

        let token = self
            .tokens
            .issue_access(&Claims::new(user.id).with_email(user.email.clone()))?;

        if let Err(e) = self
            .mailer
            .send_verification(&user.email, user.display_name(), &token)
            .await
        {
            error!("Could not send verification email to {}: {}", user.email, e);
        }

        info!("New signup: {}", user.email);
        Ok(user)
    }

    /// Marks the token's subject as verified. Verifying twice is not an error.
    pub async fn verify_email(&self, token: &str) -> Result<User, AppError> {
        let claims = self.tokens.verify_access(token)?;

        let mut user = self
            .users
            .find_user_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_verified {
            if !self.users.mark_verified(user.id).await? {
                return Err(AuthError::UserNotFound.into());
            }
            user.is_verified = true;
            info!("User verified: {}", user.email);
        }

        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, AppError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = match self.users.verify_credentials(&email, password).await? {
            Some(user) => user,
            None => {
                warn!("Failed login for {}", email);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !user.is_verified {
            warn!("Login attempt before verification for {}", email);
            return Err(AuthError::EmailNotVerified.into());
        }

        let claims = Claims::new(user.id).with_email(user.email.clone());
        Ok(SessionTokens {
            access_token: self.tokens.issue_access(&claims)?,
            refresh_token: self.tokens.issue_refresh(&claims)?,
        })
    }

    /// Exchanges a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        self.tokens.issue_access(&claims)
    }

    /// Resolves a verified access token to its user.
    pub async fn current_user(&self, claims: &Claims) -> Result<User, AppError> {
        self.users
            .find_user_by_id(claims.sub)
            .await?
            .ok_or_else(|| AuthError::UserNotFound.into())
    }
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AppError::ValidationError("Invalid email address".into()))
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
