use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::extractor::Authenticated;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TokenRefreshResponse {
    pub status: &'static str,
    pub access_token: String,
    pub token_type: &'static str,
}

pub async fn signup(
    req: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received signup request for email: {}", req.email);
    match state.auth_service.signup(&req.email, &req.password).await {
        Ok(_) => Ok(HttpResponse::Ok().json(StatusResponse {
            status: "success",
            message: "User registered. Check your email to verify.",
        })),
        Err(e) => {
            error!("Signup failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn verify_email(
    query: web::Query<VerifyEmailQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.verify_email(&query.token).await?;
    Ok(HttpResponse::Ok().json(StatusResponse {
        status: "success",
        message: "Email verified",
    }))
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);
    match state.auth_service.login(&req.email, &req.password).await {
        Ok(session) => {
            info!("Login successful for email: {}", req.email);
            Ok(HttpResponse::Ok().json(LoginResponse {
                status: "success",
                message: "Login successful",
                access_token: session.access_token,
                refresh_token: session.refresh_token,
                token_type: "bearer",
            }))
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn refresh_token(
    req: web::Json<TokenRefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let access_token = state.auth_service.refresh(&req.refresh_token)?;
    Ok(HttpResponse::Ok().json(TokenRefreshResponse {
        status: "success",
        access_token,
        token_type: "bearer",
    }))
}

pub async fn me(
    auth: Authenticated,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state.auth_service.current_user(&auth.0).await?;
    Ok(HttpResponse::Ok().json(user))
}
