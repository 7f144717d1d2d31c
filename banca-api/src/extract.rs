//! Request extractors that report failures as JSON [`ApiError`]s.

use crate::error::ApiError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use banca_core::{Claims, CoreError};

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// The caller behind a verified bearer token.
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn require(&self, permission: &str) -> Result<&Claims, ApiError> {
        self.0.require(permission)?;
        Ok(&self.0)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| CoreError::unauthorized("missing bearer token"))?;
        let claims = state.office.verify_token(token).await?;
        Ok(AuthUser(claims))
    }
}
