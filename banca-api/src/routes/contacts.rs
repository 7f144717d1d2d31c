use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::backoffice::{ContactQuery, CreateContact, UpdateContact};
use banca_core::permissions::MANAGE_BETTING_POOLS;
use banca_core::storage::Contact;
use banca_core::Page;
use serde_json::{json, Value};

pub async fn list_contacts(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ContactQuery>,
) -> ApiResult<Json<Page<Contact>>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.list_contacts(query).await?))
}

pub async fn create_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateContact>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok((StatusCode::CREATED, Json(state.office.create_contact(request).await?)))
}

pub async fn update_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateContact>,
) -> ApiResult<Json<Contact>> {
    user.require(MANAGE_BETTING_POOLS)?;
    Ok(Json(state.office.update_contact(id, request).await?))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    user.require(MANAGE_BETTING_POOLS)?;
    state.office.delete_contact(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_pool_contacts(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(pool_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    user.require(MANAGE_BETTING_POOLS)?;
    let removed = state.office.delete_pool_contacts(pool_id).await?;
    Ok(Json(json!({ "deleted": removed })))
}
