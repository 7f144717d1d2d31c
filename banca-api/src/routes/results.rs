use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::permissions::MANAGE_RESULTS;
use banca_core::storage::DrawResult;
use banca_lottery::desk::{PublishOutcome, PublishResult, ResultQuery};

pub async fn list_results(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ResultQuery>,
) -> ApiResult<Json<Vec<DrawResult>>> {
    Ok(Json(state.desk.list_results(query).await?))
}

pub async fn publish_result(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<PublishResult>,
) -> ApiResult<(StatusCode, Json<PublishOutcome>)> {
    let claims = user.require(MANAGE_RESULTS)?;
    Ok((StatusCode::CREATED, Json(state.desk.publish_result(request, claims).await?)))
}
