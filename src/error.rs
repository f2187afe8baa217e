use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

use crate::auth::TokenKind;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Token error: {0}")]
    TokenError(#[from] TokenError),

    #[error("Proxy error: {0}")]
    ProxyError(#[from] ProxyError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Unique violations surface as duplicates so signup can report a taken email
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::MigrationError(err.to_string()))
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::InternalError(format!("password hashing failed: {}", err))
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProxyError::ResponseError(err.to_string())
        } else {
            ProxyError::RequestFailed(err.to_string())
        }
    }
}

// Implement actix_web::ResponseError for AppError
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            // Token and auth failures are reported without the wrapper prefix
            AppError::AuthError(e) => e.to_string(),
            AppError::TokenError(e) => e.to_string(),
            AppError::ValidationError(m) => m.clone(),
            // Internal details stay in the logs
            AppError::DatabaseError(DatabaseError::NotFound) => self.to_string(),
            AppError::DatabaseError(DatabaseError::Duplicate) => self.to_string(),
            AppError::DatabaseError(_) | AppError::InternalError(_) | AppError::ConfigError(_) => {
                "Internal server error".to_string()
            }
            AppError::ProxyError(e) => e.to_string(),
        };
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": message
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::EmailNotVerified => StatusCode::FORBIDDEN,
                AuthError::EmailTaken => StatusCode::BAD_REQUEST,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            },
            AppError::TokenError(_) => StatusCode::UNAUTHORIZED,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ProxyError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No authorization token provided")]
    MissingToken,

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    #[error("Email already exists")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Too many requests")]
    RateLimited,
}

/// Outcome of a failed token verification.
///
/// `Expired` is only produced once the signature has been checked; every other
/// failure (bad signature, wrong algorithm, wrong kind, garbage input) collapses
/// into `Invalid` so callers cannot learn which part was wrong.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("{0} token expired")]
    Expired(TokenKind),

    #[error("invalid {0} token")]
    Invalid(TokenKind),
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API key not configured for {0}")]
    MissingApiKey(&'static str),

    #[error("API response error: {0}")]
    ResponseError(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}
