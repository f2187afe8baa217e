use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use super::token::Claims;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Claims of a caller that presented a valid `Authorization: Bearer` access token.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequest for Authenticated {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = (|| -> Result<Self, AppError> {
            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or_else(|| AppError::InternalError("application state missing".into()))?;
            let token = bearer_token(req).ok_or(AuthError::MissingToken)?;
            let claims = state.auth_service.tokens().verify_access(token)?;
            Ok(Authenticated(claims))
        })();

        ready(result)
    }
}
