//! Autenticación JWT
//!
//! Verifica el bearer token (HS256) y expone la organización del llamante
//! como extractor de axum. La emisión de tokens queda fuera de este servicio.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{models::OrganizationId, state::AppState, utils::errors::AppError};

/// Claims del JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub organization_id: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Organización autenticada de la request
#[derive(Debug, Clone, Copy)]
pub struct OrganizationContext {
    pub organization_id: OrganizationId,
}

impl OrganizationContext {
    pub fn from_token(token: &str, jwt_secret: &str) -> Result<Self, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt_secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            log::warn!("🔒 Token rechazado: {}", e);
            AppError::Unauthorized("Invalid token".to_string())
        })?;

        Ok(Self {
            organization_id: OrganizationId::new(token_data.claims.organization_id),
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OrganizationContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|auth_str| auth_str.to_str().ok())
            .and_then(|auth_str| auth_str.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Authorization token required".to_string()))?;

        Self::from_token(token.trim(), &state.config.jwt_secret)
    }
}
