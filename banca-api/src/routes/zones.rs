use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::backoffice::{CreateZone, UpdateZone, ZoneQuery};
use banca_core::permissions::MANAGE_ZONES;
use banca_core::storage::Zone;
use banca_core::Page;

pub async fn list_zones(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ZoneQuery>,
) -> ApiResult<Json<Page<Zone>>> {
    Ok(Json(state.office.list_zones(query).await?))
}

pub async fn create_zone(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateZone>,
) -> ApiResult<(StatusCode, Json<Zone>)> {
    user.require(MANAGE_ZONES)?;
    Ok((StatusCode::CREATED, Json(state.office.create_zone(request).await?)))
}

pub async fn get_zone(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Zone>> {
    Ok(Json(state.office.get_zone(id).await?))
}

pub async fn update_zone(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateZone>,
) -> ApiResult<Json<Zone>> {
    user.require(MANAGE_ZONES)?;
    Ok(Json(state.office.update_zone(id, request).await?))
}

pub async fn deactivate_zone(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    user.require(MANAGE_ZONES)?;
    state.office.deactivate_zone(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
