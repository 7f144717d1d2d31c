use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, AuthUser};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use super::parse_ids;
use banca_core::backoffice::{
    DailySummary, SalesFilter, SalesReport, WinningPlayFilter, WinningPlayParams, WinningPlaysReport,
    ZoneSalesReport,
};
use banca_core::permissions::VIEW_REPORTS;
use banca_lottery::schedule::business_today;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningPlaysQuery {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    draw_id: Option<i64>,
    /// Comma-separated zone ids.
    zone_ids: Option<String>,
    betting_pool_id: Option<i64>,
    is_paid: Option<bool>,
    page: Option<u32>,
    page_size: Option<u32>,
}

pub async fn by_betting_pool(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(filter): ApiJson<SalesFilter>,
) -> ApiResult<Json<SalesReport>> {
    user.require(VIEW_REPORTS)?;
    Ok(Json(state.office.sales_by_betting_pool(&filter).await?))
}

pub async fn by_zone(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(filter): ApiJson<SalesFilter>,
) -> ApiResult<Json<ZoneSalesReport>> {
    user.require(VIEW_REPORTS)?;
    Ok(Json(state.office.sales_by_zone(&filter).await?))
}

pub async fn daily_summary(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> ApiResult<Json<DailySummary>> {
    user.require(VIEW_REPORTS)?;
    let date = query
        .date
        .unwrap_or_else(|| business_today(Utc::now(), state.office.config().business_utc_offset_minutes));
    Ok(Json(state.office.daily_summary(date).await?))
}

/// Users bound to a pool only see that pool's plays.
pub async fn winning_plays(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<WinningPlaysQuery>,
) -> ApiResult<Json<WinningPlaysReport>> {
    let claims = user.require(VIEW_REPORTS)?;
    let betting_pool_id = match (claims.admin, claims.pool) {
        (false, Some(pool)) => Some(pool),
        _ => query.betting_pool_id,
    };
    let filter = WinningPlayFilter {
        start_date: query.start_date,
        end_date: query.end_date,
        draw_id: query.draw_id,
        zone_ids: parse_ids(query.zone_ids.as_deref(), "zoneIds")?,
        betting_pool_id,
        is_paid: query.is_paid,
        page: query.page,
        page_size: query.page_size,
    };
    Ok(Json(state.office.winning_plays(filter).await?))
}

pub async fn winning_play_params(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<WinningPlayParams>> {
    user.require(VIEW_REPORTS)?;
    Ok(Json(state.office.winning_play_params().await?))
}
