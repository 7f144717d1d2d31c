use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::backoffice::{
    BatchDrawPrizes, BatchDrawPrizesOutcome, CreatePool, PoolQuery, ResolvedPrize, SaveDrawPrizes,
    SavedDrawPrizes, UpdatePool, UpsertPoolDraw, UpsertPrize,
};
use banca_core::permissions::MANAGE_BETTING_POOLS;
use banca_core::storage::{BettingPool, DrawPrize, PoolConfig, PoolDraw, PoolPrize};
use banca_core::Page;
use serde_json::{json, Value};

pub async fn list_pools(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<PoolQuery>,
) -> ApiResult<Json<Page<BettingPool>>> {
    Ok(Json(state.office.list_pools(query).await?))
}

pub async fn create_pool(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreatePool>,
) -> ApiResult<(StatusCode, Json<BettingPool>)> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok((StatusCode::CREATED, Json(state.office.create_pool(request).await?)))
}

pub async fn next_code(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    user.require(MANAGE_BETTING_POOLS)?;
    let code = state.office.next_pool_code().await?;
    Ok(Json(json!({ "code": code })))
}

pub async fn get_pool(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<BettingPool>> {
    Ok(Json(state.office.get_pool(id).await?))
}

pub async fn update_pool(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdatePool>,
) -> ApiResult<Json<BettingPool>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.update_pool(id, request).await?))
}

pub async fn deactivate_pool(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<BettingPool>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.deactivate_pool(id).await?))
}

pub async fn get_config(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<PoolConfig>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.get_pool_config(id).await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(config): ApiJson<PoolConfig>,
) -> ApiResult<Json<PoolConfig>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.update_pool_config(id, config).await?))
}

pub async fn list_prizes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<PoolPrize>>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.list_pool_prizes(id).await?))
}

pub async fn upsert_prize(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpsertPrize>,
) -> ApiResult<Json<PoolPrize>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.upsert_pool_prize(id, request).await?))
}

pub async fn list_draws(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<PoolDraw>>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.list_pool_draws(id).await?))
}

pub async fn upsert_draw(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpsertPoolDraw>,
) -> ApiResult<Json<PoolDraw>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.upsert_pool_draw(id, request).await?))
}

pub async fn list_draw_prizes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, draw_id)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<Vec<DrawPrize>>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.list_draw_prizes(id, draw_id).await?))
}

pub async fn save_draw_prizes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, draw_id)): ApiPath<(i64, i64)>,
    ApiJson(request): ApiJson<SaveDrawPrizes>,
) -> ApiResult<Json<SavedDrawPrizes>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.save_draw_prizes(id, draw_id, request).await?))
}

pub async fn delete_draw_prizes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, draw_id)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<Value>> {
    user.require(MANAGE_BETTING_POOLS)?;
    let removed = state.office.delete_draw_prizes(id, draw_id).await?;
    Ok(Json(json!({ "deleted": removed })))
}

pub async fn resolved_draw_prizes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, draw_id)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<Vec<ResolvedPrize>>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.resolved_draw_prizes(id, draw_id).await?))
}

pub async fn batch_draw_prizes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<BatchDrawPrizes>,
) -> ApiResult<Json<BatchDrawPrizesOutcome>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.save_draw_prizes_batch(id, request).await?))
}
