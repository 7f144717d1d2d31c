use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::backoffice::{NewTransaction, TransactionQuery, TransactionReport};
use banca_core::permissions::MANAGE_TRANSACTIONS;
use banca_core::storage::AccountTransaction;

pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> ApiResult<Json<TransactionReport>> {
    user.require(MANAGE_TRANSACTIONS)?;
    Ok(Json(state.office.list_transactions(query).await?))
}

pub async fn record_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<NewTransaction>,
) -> ApiResult<(StatusCode, Json<AccountTransaction>)> {
    let claims = user.require(MANAGE_TRANSACTIONS)?;
    let transaction = state.office.record_transaction(request, claims.user_id()).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
