use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::auth::jwt;
use crate::entities::user;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Use as an extractor in handler parameters to require authentication:
/// ```ignore
/// async fn handler(AuthUser(user): AuthUser) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header.".to_string()))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid authorization header format.".to_string())
        })?;

        let user_model = authenticate(&state.db, token, &state.config.jwt_secret).await?;
        Ok(Self(user_model))
    }
}

/// Resolve a raw access token to its user.
///
/// # Errors
///
/// `Unauthorized` for a bad token or an unknown user, `Internal` on database failure.
pub async fn authenticate(
    db: &DatabaseConnection,
    token: &str,
    secret: &str,
) -> Result<user::Model, AppError> {
    let claims = jwt::validate_access_token(token, secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

    let user_id = claims
        .user_id()
        .map_err(|_| AppError::Unauthorized("Invalid token subject.".to_string()))?;

    user::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .ok_or_else(|| AppError::Unauthorized("User not found.".to_string()))
}
