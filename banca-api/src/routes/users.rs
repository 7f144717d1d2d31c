use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::backoffice::{ChangePassword, CreateUser, UpdateUser, UserQuery};
use banca_core::permissions::MANAGE_USERS;
use banca_core::storage::User;
use banca_core::Page;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PermissionList {
    permissions: Vec<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Page<User>>> {
    user.require(MANAGE_USERS)?;
    Ok(Json(state.office.list_users(query).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    user.require(MANAGE_USERS)?;
    Ok((StatusCode::CREATED, Json(state.office.create_user(request).await?)))
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<User>> {
    if claims.user_id() != id {
        claims.require(MANAGE_USERS)?;
    }
    Ok(Json(state.office.get_user(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateUser>,
) -> ApiResult<Json<User>> {
    user.require(MANAGE_USERS)?;
    Ok(Json(state.office.update_user(id, request).await?))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<User>> {
    user.require(MANAGE_USERS)?;
    Ok(Json(state.office.deactivate_user(id).await?))
}

pub async fn set_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<PermissionList>,
) -> ApiResult<Json<User>> {
    user.require(MANAGE_USERS)?;
    Ok(Json(state.office.set_user_permissions(id, request.permissions).await?))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<ChangePassword>,
) -> ApiResult<StatusCode> {
    state.office.change_password(id, request, &claims).await?;
    Ok(StatusCode::NO_CONTENT)
}
