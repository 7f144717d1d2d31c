use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::permissions::{MANAGE_LIMITS, TICKET_CREATE};
use banca_core::storage::LimitRule;
use banca_core::Page;
use banca_lottery::desk::{
    LimitConsumption, LimitQuery, LimitRuleRequest, RandomBlockOutcome, RandomBlockRequest,
    ReleaseOutcome, ReserveLimit, ReserveOutcome,
};
use banca_lottery::AutomaticLimitConfig;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionQuery {
    draw_id: i64,
    date: Option<NaiveDate>,
}

pub async fn list_limits(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Page<LimitRule>>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.list_limits(query).await?))
}

pub async fn create_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<LimitRuleRequest>,
) -> ApiResult<(StatusCode, Json<LimitRule>)> {
    let claims = user.require(MANAGE_LIMITS)?;
    Ok((StatusCode::CREATED, Json(state.desk.create_limit(request, claims).await?)))
}

pub async fn get_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<LimitRule>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.get_limit(id).await?))
}

pub async fn update_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<LimitRuleRequest>,
) -> ApiResult<Json<LimitRule>> {
    let claims = user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.update_limit(id, request, claims).await?))
}

pub async fn delete_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    user.require(MANAGE_LIMITS)?;
    state.desk.delete_limit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_limit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<LimitRule>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.toggle_limit(id).await?))
}

pub async fn consumption(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ConsumptionQuery>,
) -> ApiResult<Json<Vec<LimitConsumption>>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.limit_consumption(query.draw_id, query.date).await?))
}

pub async fn reserve(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<ReserveLimit>,
) -> ApiResult<Json<ReserveOutcome>> {
    let claims = user.require(TICKET_CREATE)?;
    Ok(Json(state.desk.reserve_limit(request, claims).await?))
}

pub async fn release(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ReleaseOutcome>> {
    user.require(TICKET_CREATE)?;
    Ok(Json(state.desk.release_reservation(id).await?))
}

pub async fn get_automatic(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AutomaticLimitConfig>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.get_automatic_limits().await?))
}

pub async fn save_automatic(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(config): ApiJson<AutomaticLimitConfig>,
) -> ApiResult<Json<AutomaticLimitConfig>> {
    user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.save_automatic_limits(config).await?))
}

pub async fn random_block(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<RandomBlockRequest>,
) -> ApiResult<Json<RandomBlockOutcome>> {
    let claims = user.require(MANAGE_LIMITS)?;
    Ok(Json(state.desk.execute_random_block(request, claims).await?))
}

pub async fn reset_automatic(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    user.require(MANAGE_LIMITS)?;
    state.desk.reset_automatic_limits().await?;
    Ok(StatusCode::NO_CONTENT)
}
