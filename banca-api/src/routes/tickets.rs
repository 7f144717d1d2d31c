use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use banca_core::permissions::{TICKET_CANCEL, TICKET_CREATE, TICKET_PAY};
use banca_core::storage::Ticket;
use banca_lottery::desk::{CancelTicket, CreateTicket, PayTicket, TicketFilter, TicketPage};
use banca_lottery::{expand_plays as expand, ParsedPlay};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ExpandPlays {
    plays: Vec<String>,
}

pub async fn create_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateTicket>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let claims = user.require(TICKET_CREATE)?;
    let ticket = state.desk.create_ticket(request, claims).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn filter_tickets(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(filter): ApiJson<TicketFilter>,
) -> ApiResult<Json<TicketPage>> {
    Ok(Json(state.desk.filter_tickets(filter, &claims).await?))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.desk.get_ticket(id, &claims).await?))
}

pub async fn get_by_barcode(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(barcode): ApiPath<String>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.desk.get_by_barcode(&barcode, &claims).await?))
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    request: Option<ApiJson<CancelTicket>>,
) -> ApiResult<Json<Ticket>> {
    let claims = user.require(TICKET_CANCEL)?;
    let request = request.map(|ApiJson(r)| r).unwrap_or_default();
    Ok(Json(state.desk.cancel_ticket(id, request, claims).await?))
}

pub async fn pay_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<PayTicket>,
) -> ApiResult<Json<Ticket>> {
    let claims = user.require(TICKET_PAY)?;
    Ok(Json(state.desk.pay_ticket(id, request, claims).await?))
}

pub async fn expand_plays(
    _user: AuthUser,
    ApiJson(request): ApiJson<ExpandPlays>,
) -> ApiResult<Json<Vec<ParsedPlay>>> {
    let parsed = expand(request.plays.iter().map(String::as_str)).map_err(banca_lottery::LotteryError::from)?;
    Ok(Json(parsed))
}
