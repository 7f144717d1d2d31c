use super::parse_ids;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::backoffice::{
    CreateHotNumberLimit, HotNumbers, UpdateHotNumberLimit, UpdateHotNumbers,
};
use banca_core::permissions::MANAGE_LIMITS;
use banca_core::storage::HotNumberLimit;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitListQuery {
    /// Comma-separated draw ids.
    draw_ids: Option<String>,
}

pub async fn get_hot_numbers(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<HotNumbers>> {
    Ok(Json(state.office.get_hot_numbers().await?))
}

pub async fn update_hot_numbers(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<UpdateHotNumbers>,
) -> ApiResult<Json<HotNumbers>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.office.update_hot_numbers(request).await?))
}

pub async fn list_limits(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<LimitListQuery>,
) -> ApiResult<Json<Vec<HotNumberLimit>>> {
    let draw_ids = parse_ids(query.draw_ids.as_deref(), "drawIds")?;
    Ok(Json(state.office.list_hot_number_limits(&draw_ids).await?))
}

pub async fn create_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateHotNumberLimit>,
) -> ApiResult<(StatusCode, Json<HotNumberLimit>)> {
    user.require(MANAGE_LIMITS)?;
    Ok((StatusCode::CREATED, Json(state.office.create_hot_number_limit(request).await?)))
}

pub async fn delete_all_limits(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    user.require(MANAGE_LIMITS)?;
    let removed = state.office.delete_all_hot_number_limits().await?;
    Ok(Json(json!({ "deleted": removed })))
}

pub async fn get_limit(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<HotNumberLimit>> {
    Ok(Json(state.office.get_hot_number_limit(id).await?))
}

pub async fn update_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateHotNumberLimit>,
) -> ApiResult<Json<HotNumberLimit>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.office.update_hot_number_limit(id, request).await?))
}

pub async fn delete_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    user.require(MANAGE_LIMITS)?;
    state.office.delete_hot_number_limit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
