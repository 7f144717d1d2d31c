//! Winning plays report: every graded winning line of live tickets in a
//! draw-date range, with sale and prize totals.

use super::Backoffice;
use crate::clock::local_date;
use crate::error::{CoreError, Result};
use crate::storage::{
    Draw, LotteryStore, TicketStore, WinningPlay, WinningPlayQuery, Zone, ZoneStore,
};
use crate::types::{Money, Page, PageRequest};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningPlayFilter {
    /// Both dates default to the current business day.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub draw_id: Option<i64>,
    #[serde(default)]
    pub zone_ids: Vec<i64>,
    pub betting_pool_id: Option<i64>,
    pub is_paid: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningPlaysReport {
    #[serde(flatten)]
    pub page: Page<WinningPlay>,
    pub total_sales: Money,
    pub total_prizes: Money,
    /// Prizes minus sales.
    pub grand_total: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningPlayParams {
    pub draws: Vec<Draw>,
    pub zones: Vec<Zone>,
}

impl Backoffice {
    pub async fn winning_plays(&self, filter: WinningPlayFilter) -> Result<WinningPlaysReport> {
        let paging = PageRequest::from_parts(filter.page, filter.page_size);
        paging.validate()?;

        let today = local_date(Utc::now(), self.config.business_utc_offset_minutes);
        let start_date = filter.start_date.unwrap_or(today);
        let end_date = filter.end_date.unwrap_or(today);
        if end_date < start_date {
            return Err(CoreError::invalid("endDate", "must not be before startDate"));
        }

        let query = WinningPlayQuery {
            start_date,
            end_date,
            draw_id: filter.draw_id,
            zone_ids: filter.zone_ids,
            betting_pool_id: filter.betting_pool_id,
            is_paid: filter.is_paid,
        };
        tracing::debug!("Winning plays query: {:?}", query);

        let conn = self.storage.get_connection().await;
        let (plays, total, totals) = TicketStore::new(&conn).winning_plays(&query, paging)?;
        Ok(WinningPlaysReport {
            page: Page::new(plays, paging, total),
            total_sales: totals.total_sales,
            total_prizes: totals.total_prizes,
            grand_total: totals.total_prizes - totals.total_sales,
        })
    }

    /// Active draws and zones for the report's filter controls.
    pub async fn winning_play_params(&self) -> Result<WinningPlayParams> {
        let conn = self.storage.get_connection().await;
        Ok(WinningPlayParams {
            draws: LotteryStore::new(&conn).list_draws(None, Some(true))?,
            zones: ZoneStore::new(&conn).active()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::testing;

    #[tokio::test]
    async fn test_empty_report_and_reversed_range() {
        let office = testing::backoffice().await;
        let report = office.winning_plays(WinningPlayFilter::default()).await.unwrap();
        assert_eq!(report.page.total_count, 0);
        assert_eq!(report.grand_total, Money::ZERO);

        let reversed = office
            .winning_plays(WinningPlayFilter {
                start_date: NaiveDate::from_ymd_opt(2025, 3, 2),
                end_date: NaiveDate::from_ymd_opt(2025, 3, 1),
                ..WinningPlayFilter::default()
            })
            .await;
        assert!(matches!(reversed, Err(CoreError::Validation(_))));

        let params = office.winning_play_params().await.unwrap();
        assert!(params.draws.is_empty() && params.zones.is_empty());
    }
}
