use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::backoffice::{CreateDraw, CreateLottery, UpdateDraw, UpdateLottery};
use banca_core::permissions::MANAGE_LOTTERIES;
use banca_core::storage::{Draw, Lottery};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryListQuery {
    is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawListQuery {
    lottery_id: Option<i64>,
    is_active: Option<bool>,
}

pub async fn list_lotteries(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<LotteryListQuery>,
) -> ApiResult<Json<Vec<Lottery>>> {
    Ok(Json(state.office.list_lotteries(query.is_active).await?))
}

pub async fn create_lottery(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateLottery>,
) -> ApiResult<(StatusCode, Json<Lottery>)> {
    user.require(MANAGE_LOTTERIES)?;
    Ok((StatusCode::CREATED, Json(state.office.create_lottery(request).await?)))
}

pub async fn get_lottery(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Lottery>> {
    Ok(Json(state.office.get_lottery(id).await?))
}

pub async fn update_lottery(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateLottery>,
) -> ApiResult<Json<Lottery>> {
    user.require(MANAGE_LOTTERIES)?;
    Ok(Json(state.office.update_lottery(id, request).await?))
}

pub async fn list_draws(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<DrawListQuery>,
) -> ApiResult<Json<Vec<Draw>>> {
    Ok(Json(state.office.list_draws(query.lottery_id, query.is_active).await?))
}

pub async fn create_draw(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateDraw>,
) -> ApiResult<(StatusCode, Json<Draw>)> {
    user.require(MANAGE_LOTTERIES)?;
    Ok((StatusCode::CREATED, Json(state.office.create_draw(request).await?)))
}

pub async fn get_draw(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Draw>> {
    Ok(Json(state.office.get_draw(id).await?))
}

pub async fn update_draw(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateDraw>,
) -> ApiResult<Json<Draw>> {
    user.require(MANAGE_LOTTERIES)?;
    Ok(Json(state.office.update_draw(id, request).await?))
}

pub async fn deactivate_draw(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Draw>> {
    user.require(MANAGE_LOTTERIES)?;
    Ok(Json(state.office.deactivate_draw(id).await?))
}
