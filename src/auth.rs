use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    repository::RepositoryState,
};

/// Claims
///
/// The payload expected inside a bearer JWT (HS256, signed with `JWT_SECRET`).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the console user.
    pub sub: Uuid,
    /// Expiration Time (exp): the token is rejected after this timestamp.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. `role` is the user's
/// ENVIRONMENT-scope role, used by the permission checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: String,
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local`, a known user id in `x-user-id` is accepted.
/// 2. Bearer token extraction and JWT decoding (expiry is always validated).
/// 3. User lookup, so tokens of deleted users stop working.
///
/// Rejection: 401 with the JSON error body.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id| Uuid::parse_str(id).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.find_user(user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.environment_role,
                    });
                }
                tracing::debug!(%user_id, "x-user-id bypass: unknown user");
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("expired token"),
                other => tracing::debug!(error = ?other, "invalid token"),
            }
            ApiError::Unauthorized
        })?;

        let user = repo
            .find_user(token_data.claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            role: user.environment_role,
        })
    }
}
