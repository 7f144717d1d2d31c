use crate::error::ApiResult;
use crate::extract::{ApiJson, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use banca_core::backoffice::{LoginRequest, LoginResponse};
use banca_core::Claims;

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(state.office.authenticate(request).await?))
}

pub async fn me(AuthUser(claims): AuthUser) -> Json<Claims> {
    Json(claims)
}
