//! Sales aggregation by betting pool, zone and draw.
//!
//! Every figure excludes cancelled tickets. Date ranges are inclusive on
//! both ends and compare against the ticket's business date.

use super::Backoffice;
use crate::error::{CoreError, Result};
use crate::storage::{PoolConfig, PoolSalesAggregate, PoolStore, SalesQuery, TicketStore};
use crate::types::{FallType, Money};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub zone_ids: Vec<i64>,
    #[serde(default)]
    pub draw_ids: Vec<i64>,
    #[serde(default)]
    pub betting_pool_ids: Vec<i64>,
}

impl SalesFilter {
    pub fn for_day(date: NaiveDate) -> Self {
        Self {
            start_date: date,
            end_date: date,
            zone_ids: Vec::new(),
            draw_ids: Vec::new(),
            betting_pool_ids: Vec::new(),
        }
    }

    fn to_query(&self) -> Result<SalesQuery> {
        if self.end_date < self.start_date {
            return Err(CoreError::invalid("endDate", "must not be before startDate"));
        }
        Ok(SalesQuery {
            start_date: self.start_date,
            end_date: self.end_date,
            zone_ids: self.zone_ids.clone(),
            draw_ids: self.draw_ids.clone(),
            betting_pool_ids: self.betting_pool_ids.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSalesRow {
    pub betting_pool_id: i64,
    pub code: String,
    pub name: String,
    pub zone_id: i64,
    pub zone_name: Option<String>,
    pub ticket_count: i64,
    pub sold: Money,
    pub commissions: Money,
    pub discounts: Money,
    pub prizes: Money,
    pub net: Money,
    pub fall: Money,
    #[serde(rename = "final")]
    pub final_amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub ticket_count: i64,
    pub sold: Money,
    pub commissions: Money,
    pub discounts: Money,
    pub prizes: Money,
    pub net: Money,
    pub fall: Money,
    #[serde(rename = "final")]
    pub final_amount: Money,
}

impl SalesSummary {
    fn add(&mut self, row: &PoolSalesRow) {
        self.ticket_count += row.ticket_count;
        self.sold += row.sold;
        self.commissions += row.commissions;
        self.discounts += row.discounts;
        self.prizes += row.prizes;
        self.net += row.net;
        self.fall += row.fall;
        self.final_amount += row.final_amount;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: Vec<PoolSalesRow>,
    pub summary: SalesSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSalesRow {
    pub zone_id: i64,
    pub zone_name: Option<String>,
    pub betting_pool_count: i64,
    #[serde(flatten)]
    pub totals: SalesSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSalesReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: Vec<ZoneSalesRow>,
    pub summary: SalesSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawSalesRow {
    pub draw_id: i64,
    pub draw_name: String,
    pub line_count: i64,
    pub sold: Money,
    pub commissions: Money,
    pub prizes: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub cancelled_count: i64,
    pub betting_pools_with_sales: usize,
    pub totals: SalesSummary,
    pub draws: Vec<DrawSalesRow>,
}

/// Fall (caída) owed on a net result. Only positive results fall.
pub fn fall_amount(config: &PoolConfig, net: Money) -> Money {
    if config.fall_type == FallType::Off || !net.is_positive() {
        return Money::ZERO;
    }
    net.percent(config.fall_percentage)
}

fn pool_row(aggregate: PoolSalesAggregate, config: &PoolConfig) -> PoolSalesRow {
    let net = aggregate.sold - aggregate.commissions - aggregate.prizes;
    let fall = fall_amount(config, net);
    PoolSalesRow {
        betting_pool_id: aggregate.betting_pool_id,
        code: aggregate.code,
        name: aggregate.name,
        zone_id: aggregate.zone_id,
        zone_name: aggregate.zone_name,
        ticket_count: aggregate.ticket_count,
        sold: aggregate.sold,
        commissions: aggregate.commissions,
        discounts: aggregate.discounts,
        prizes: aggregate.prizes,
        net,
        fall,
        final_amount: net - fall,
    }
}

impl Backoffice {
    /// Per-pool sales for the range. Pools without sales are omitted and rows
    /// are ordered by pool code.
    pub async fn sales_by_betting_pool(&self, filter: &SalesFilter) -> Result<SalesReport> {
        let query = filter.to_query()?;

        let conn = self.storage.get_connection().await;
        let aggregates = TicketStore::new(&conn).sales_by_pool(&query)?;
        let pools = PoolStore::new(&conn);

        let mut rows = Vec::with_capacity(aggregates.len());
        let mut summary = SalesSummary::default();
        for aggregate in aggregates {
            let config = pools.get_config(aggregate.betting_pool_id)?;
            let row = pool_row(aggregate, &config);
            summary.add(&row);
            rows.push(row);
        }

        tracing::debug!(
            "Sales report {}..{}: {} pools, sold {}",
            filter.start_date,
            filter.end_date,
            rows.len(),
            summary.sold
        );
        Ok(SalesReport {
            start_date: filter.start_date,
            end_date: filter.end_date,
            rows,
            summary,
        })
    }

    pub async fn sales_by_zone(&self, filter: &SalesFilter) -> Result<ZoneSalesReport> {
        let report = self.sales_by_betting_pool(filter).await?;

        let mut zones: BTreeMap<i64, ZoneSalesRow> = BTreeMap::new();
        for row in &report.rows {
            let entry = zones.entry(row.zone_id).or_insert_with(|| ZoneSalesRow {
                zone_id: row.zone_id,
                zone_name: row.zone_name.clone(),
                betting_pool_count: 0,
                totals: SalesSummary::default(),
            });
            entry.betting_pool_count += 1;
            entry.totals.add(row);
        }

        let mut rows: Vec<ZoneSalesRow> = zones.into_values().collect();
        rows.sort_by(|a, b| a.zone_name.cmp(&b.zone_name));

        Ok(ZoneSalesReport {
            start_date: report.start_date,
            end_date: report.end_date,
            rows,
            summary: report.summary,
        })
    }

    pub async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary> {
        let filter = SalesFilter::for_day(date);
        let report = self.sales_by_betting_pool(&filter).await?;

        let query = filter.to_query()?;
        let conn = self.storage.get_connection().await;
        let tickets = TicketStore::new(&conn);
        let draws = tickets
            .sales_by_draw(&query)?
            .into_iter()
            .map(|d| DrawSalesRow {
                draw_id: d.draw_id,
                draw_name: d.draw_name,
                line_count: d.line_count,
                sold: d.sold,
                commissions: d.commissions,
                prizes: d.prizes,
            })
            .collect();

        Ok(DailySummary {
            date,
            cancelled_count: tickets.cancelled_count(date, date)?,
            betting_pools_with_sales: report.rows.len(),
            totals: report.summary,
            draws,
        })
    }
}
