use super::{
    date_to_sql, from_timestamp, parse_date, parse_enum, parse_json, secs_to_time, time_to_secs,
    to_timestamp, SqlFilter,
};
use crate::catalog::BetType;
use crate::error::Result;
use crate::types::{LineStatus, Money, PageRequest, TicketStatus};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketLine {
    pub id: i64,
    pub ticket_id: i64,
    pub line_number: u32,
    pub draw_id: i64,
    pub lottery_id: i64,
    pub draw_date: NaiveDate,
    pub bet_number: String,
    pub bet_type: BetType,
    pub bet_amount: Money,
    pub multiplier: u32,
    pub subtotal: Money,
    pub total_with_multiplier: Money,
    pub commission_percentage: f64,
    pub commission_amount: Money,
    pub net_amount: Money,
    pub prize_amount: Money,
    pub is_winner: bool,
    pub winning_position: Option<u8>,
    pub status: LineStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub code: String,
    pub barcode: String,
    pub betting_pool_id: i64,
    pub user_id: i64,
    pub ticket_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub global_multiplier: u32,
    pub line_count: u32,
    pub total_bet: Money,
    pub total_with_multiplier: Money,
    pub total_commission: Money,
    pub total_discount: Money,
    pub total_net: Money,
    pub grand_total: Money,
    pub total_prize: Money,
    pub winning_lines: u32,
    pub status: TicketStatus,
    pub special_flags: Option<String>,
    pub lottery_ids: Vec<i64>,
    pub earliest_draw_time: Option<NaiveTime>,
    pub latest_draw_time: Option<NaiveTime>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub terminal_id: Option<String>,
    pub ip_address: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
    pub cancel_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<i64>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub lines: Vec<TicketLine>,
}

/// Criteria for ticket searches. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub betting_pool_id: Option<i64>,
    pub user_id: Option<i64>,
    pub lottery_id: Option<i64>,
    pub draw_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub zone_ids: Vec<i64>,
    pub status: Option<TicketStatus>,
    pub bet_type: Option<BetType>,
    pub bet_number: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketListTotals {
    pub ticket_count: i64,
    pub cancelled_count: i64,
    pub winner_count: i64,
    pub total_sold: Money,
    pub total_prizes: Money,
    pub pending_payment: Money,
}

#[derive(Debug, Clone)]
pub struct UsageKey<'k> {
    pub draw_id: i64,
    pub draw_date: NaiveDate,
    pub bet_type: BetType,
    pub bet_number: &'k str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberUsage {
    pub bet_type: BetType,
    pub bet_number: String,
    pub amount: Money,
    pub line_count: i64,
}

#[derive(Debug, Clone)]
pub struct SalesQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub zone_ids: Vec<i64>,
    pub draw_ids: Vec<i64>,
    pub betting_pool_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolSalesAggregate {
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
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawSalesAggregate {
    pub draw_id: i64,
    pub draw_name: String,
    pub line_count: i64,
    pub sold: Money,
    pub commissions: Money,
    pub prizes: Money,
}

/// Criteria for the winning plays report. Dates bound the draw date.
#[derive(Debug, Clone)]
pub struct WinningPlayQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub draw_id: Option<i64>,
    pub zone_ids: Vec<i64>,
    pub betting_pool_id: Option<i64>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningPlay {
    pub line_id: i64,
    pub ticket_id: i64,
    pub ticket_code: String,
    pub bet_type: BetType,
    pub bet_number: String,
    pub sales_amount: Money,
    pub prize_amount: Money,
    /// Prize minus sale.
    pub total: Money,
    pub draw_id: i64,
    pub draw_name: String,
    pub draw_date: NaiveDate,
    pub winning_position: Option<u8>,
    pub betting_pool_id: i64,
    pub betting_pool_name: String,
    pub zone_id: Option<i64>,
    pub zone_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningPlayTotals {
    pub total_sales: Money,
    pub total_prizes: Money,
}

pub struct TicketStore<'a> {
    conn: &'a Connection,
}

const TICKET_COLUMNS: &str = "t.id, t.code, t.barcode, t.betting_pool_id, t.user_id, t.ticket_date,
    t.created_at, t.global_multiplier, t.line_count, t.total_bet, t.total_with_multiplier,
    t.total_commission, t.total_discount, t.total_net, t.grand_total, t.total_prize,
    t.winning_lines, t.status, t.special_flags, t.lottery_ids, t.earliest_draw_time,
    t.latest_draw_time, t.customer_name, t.customer_phone, t.customer_email, t.terminal_id,
    t.ip_address, t.cancelled_at, t.cancelled_by, t.cancel_reason, t.paid_at, t.paid_by,
    t.payment_method, t.payment_reference";

const LINE_COLUMNS: &str = "id, ticket_id, line_number, draw_id, lottery_id, draw_date, bet_number,
    bet_type, bet_amount, multiplier, subtotal, total_with_multiplier, commission_percentage,
    commission_amount, net_amount, prize_amount, is_winner, winning_position, status";

fn money(row: &Row<'_>, idx: usize) -> rusqlite::Result<Money> {
    Ok(Money::from_cents(row.get(idx)?))
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let earliest: Option<i64> = row.get(20)?;
    let latest: Option<i64> = row.get(21)?;
    let cancelled_at: Option<i64> = row.get(27)?;
    let paid_at: Option<i64> = row.get(30)?;

    Ok(Ticket {
        id: row.get(0)?,
        code: row.get(1)?,
        barcode: row.get(2)?,
        betting_pool_id: row.get(3)?,
        user_id: row.get(4)?,
        ticket_date: parse_date(5, row.get(5)?)?,
        created_at: from_timestamp(row.get(6)?),
        global_multiplier: row.get(7)?,
        line_count: row.get(8)?,
        total_bet: money(row, 9)?,
        total_with_multiplier: money(row, 10)?,
        total_commission: money(row, 11)?,
        total_discount: money(row, 12)?,
        total_net: money(row, 13)?,
        grand_total: money(row, 14)?,
        total_prize: money(row, 15)?,
        winning_lines: row.get(16)?,
        status: parse_enum(17, row.get(17)?)?,
        special_flags: row.get(18)?,
        lottery_ids: parse_json(19, row.get(19)?)?,
        earliest_draw_time: earliest.map(secs_to_time),
        latest_draw_time: latest.map(secs_to_time),
        customer_name: row.get(22)?,
        customer_phone: row.get(23)?,
        customer_email: row.get(24)?,
        terminal_id: row.get(25)?,
        ip_address: row.get(26)?,
        cancelled_at: cancelled_at.map(from_timestamp),
        cancelled_by: row.get(28)?,
        cancel_reason: row.get(29)?,
        paid_at: paid_at.map(from_timestamp),
        paid_by: row.get(31)?,
        payment_method: row.get(32)?,
        payment_reference: row.get(33)?,
        lines: Vec::new(),
    })
}

fn line_from_row(row: &Row<'_>) -> rusqlite::Result<TicketLine> {
    Ok(TicketLine {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        line_number: row.get(2)?,
        draw_id: row.get(3)?,
        lottery_id: row.get(4)?,
        draw_date: parse_date(5, row.get(5)?)?,
        bet_number: row.get(6)?,
        bet_type: parse_enum(7, row.get(7)?)?,
        bet_amount: money(row, 8)?,
        multiplier: row.get(9)?,
        subtotal: money(row, 10)?,
        total_with_multiplier: money(row, 11)?,
        commission_percentage: row.get(12)?,
        commission_amount: money(row, 13)?,
        net_amount: money(row, 14)?,
        prize_amount: money(row, 15)?,
        is_winner: row.get(16)?,
        winning_position: row.get(17)?,
        status: parse_enum(18, row.get(18)?)?,
    })
}

impl<'a> TicketStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a ticket with all its lines. Returns the ticket id.
    pub fn insert(&self, ticket: &Ticket) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO tickets (code, barcode, betting_pool_id, user_id, ticket_date, created_at,
                global_multiplier, line_count, total_bet, total_with_multiplier, total_commission,
                total_discount, total_net, grand_total, total_prize, winning_lines, status,
                special_flags, lottery_ids, earliest_draw_time, latest_draw_time, customer_name,
                customer_phone, customer_email, terminal_id, ip_address)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
            params![
                ticket.code,
                ticket.barcode,
                ticket.betting_pool_id,
                ticket.user_id,
                date_to_sql(ticket.ticket_date),
                to_timestamp(ticket.created_at),
                ticket.global_multiplier,
                ticket.line_count,
                ticket.total_bet.cents(),
                ticket.total_with_multiplier.cents(),
                ticket.total_commission.cents(),
                ticket.total_discount.cents(),
                ticket.total_net.cents(),
                ticket.grand_total.cents(),
                ticket.total_prize.cents(),
                ticket.winning_lines,
                ticket.status.as_str(),
                ticket.special_flags,
                serde_json::to_string(&ticket.lottery_ids)?,
                ticket.earliest_draw_time.map(time_to_secs),
                ticket.latest_draw_time.map(time_to_secs),
                ticket.customer_name,
                ticket.customer_phone,
                ticket.customer_email,
                ticket.terminal_id,
                ticket.ip_address,
            ],
        )?;
        let ticket_id = self.conn.last_insert_rowid();

        for line in &ticket.lines {
            self.conn.execute(
                "INSERT INTO ticket_lines (ticket_id, line_number, draw_id, lottery_id, draw_date,
                    bet_number, bet_type, bet_amount, multiplier, subtotal, total_with_multiplier,
                    commission_percentage, commission_amount, net_amount, prize_amount, is_winner,
                    winning_position, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    ticket_id,
                    line.line_number,
                    line.draw_id,
                    line.lottery_id,
                    date_to_sql(line.draw_date),
                    line.bet_number,
                    line.bet_type.code(),
                    line.bet_amount.cents(),
                    line.multiplier,
                    line.subtotal.cents(),
                    line.total_with_multiplier.cents(),
                    line.commission_percentage,
                    line.commission_amount.cents(),
                    line.net_amount.cents(),
                    line.prize_amount.cents(),
                    line.is_winner,
                    line.winning_position,
                    line.status.as_str(),
                ],
            )?;
        }

        Ok(ticket_id)
    }

    pub fn get(&self, id: i64) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets t WHERE t.id = ?1", TICKET_COLUMNS);
        self.with_lines(self.conn.query_row(&sql, params![id], ticket_from_row).optional()?)
    }

    pub fn get_by_barcode(&self, barcode: &str) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets t WHERE t.barcode = ?1", TICKET_COLUMNS);
        self.with_lines(
            self.conn
                .query_row(&sql, params![barcode], ticket_from_row)
                .optional()?,
        )
    }

    fn with_lines(&self, ticket: Option<Ticket>) -> Result<Option<Ticket>> {
        match ticket {
            Some(mut ticket) => {
                ticket.lines = self.lines_for(ticket.id)?;
                Ok(Some(ticket))
            }
            None => Ok(None),
        }
    }

    pub fn lines_for(&self, ticket_id: i64) -> Result<Vec<TicketLine>> {
        let sql = format!(
            "SELECT {} FROM ticket_lines WHERE ticket_id = ?1 ORDER BY line_number",
            LINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![ticket_id], line_from_row)?;

        let mut lines = Vec::new();
        for line in rows {
            lines.push(line?);
        }
        Ok(lines)
    }

    pub fn barcode_exists(&self, barcode: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE barcode = ?1",
            params![barcode],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_for_pool(&self, pool_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE betting_pool_id = ?1",
            params![pool_id],
            |row| row.get(0),
        )?)
    }

    /// Ticket count and grand total of a pool's live tickets for a date.
    pub fn day_totals(&self, pool_id: i64, date: NaiveDate) -> Result<(i64, Money)> {
        let (count, total): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(grand_total), 0) FROM tickets
             WHERE betting_pool_id = ?1 AND ticket_date = ?2 AND status != 'CANCELLED'",
            params![pool_id, date_to_sql(date)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count, Money::from_cents(total)))
    }

    /// Non-cancelled sales a pool registered in `[from, to)`, whatever the
    /// ticket date.
    pub fn sold_between(&self, pool_id: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Money> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(grand_total), 0) FROM tickets
             WHERE betting_pool_id = ?1 AND created_at >= ?2 AND created_at < ?3 AND status != 'CANCELLED'",
            params![pool_id, to_timestamp(from), to_timestamp(to)],
            |row| row.get(0),
        )?;
        Ok(Money::from_cents(total))
    }

    /// Amount at stake on one number, across all pools or a single one.
    pub fn number_usage(&self, key: &UsageKey<'_>, pool_id: Option<i64>) -> Result<Money> {
        let total: i64 = match pool_id {
            Some(pool_id) => self.conn.query_row(
                "SELECT COALESCE(SUM(l.total_with_multiplier), 0)
                 FROM ticket_lines l JOIN tickets t ON t.id = l.ticket_id
                 WHERE l.draw_id = ?1 AND l.draw_date = ?2 AND l.bet_type = ?3
                   AND l.bet_number = ?4 AND l.status != 'CANCELLED' AND t.betting_pool_id = ?5",
                params![
                    key.draw_id,
                    date_to_sql(key.draw_date),
                    key.bet_type.code(),
                    key.bet_number,
                    pool_id
                ],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COALESCE(SUM(total_with_multiplier), 0) FROM ticket_lines
                 WHERE draw_id = ?1 AND draw_date = ?2 AND bet_type = ?3 AND bet_number = ?4
                   AND status != 'CANCELLED'",
                params![
                    key.draw_id,
                    date_to_sql(key.draw_date),
                    key.bet_type.code(),
                    key.bet_number
                ],
                |row| row.get(0),
            )?,
        };
        Ok(Money::from_cents(total))
    }

    /// Amount at stake on a bet type across every number of a draw.
    pub fn bet_type_usage(&self, draw_id: i64, draw_date: NaiveDate, bet_type: BetType) -> Result<Money> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(total_with_multiplier), 0) FROM ticket_lines
             WHERE draw_id = ?1 AND draw_date = ?2 AND bet_type = ?3 AND status != 'CANCELLED'",
            params![draw_id, date_to_sql(draw_date), bet_type.code()],
            |row| row.get(0),
        )?;
        Ok(Money::from_cents(total))
    }

    pub fn draw_usage(&self, draw_id: i64, draw_date: NaiveDate) -> Result<Vec<NumberUsage>> {
        let mut stmt = self.conn.prepare(
            "SELECT bet_type, bet_number, SUM(total_with_multiplier), COUNT(*)
             FROM ticket_lines
             WHERE draw_id = ?1 AND draw_date = ?2 AND status != 'CANCELLED'
             GROUP BY bet_type, bet_number
             ORDER BY SUM(total_with_multiplier) DESC, bet_number",
        )?;
        let rows = stmt.query_map(params![draw_id, date_to_sql(draw_date)], |row| {
            Ok(NumberUsage {
                bet_type: parse_enum(0, row.get(0)?)?,
                bet_number: row.get(1)?,
                amount: money(row, 2)?,
                line_count: row.get(3)?,
            })
        })?;

        let mut usage = Vec::new();
        for u in rows {
            usage.push(u?);
        }
        Ok(usage)
    }

    /// Ungraded lines of live tickets for a draw and date.
    pub fn pending_lines(&self, draw_id: i64, draw_date: NaiveDate) -> Result<Vec<TicketLine>> {
        let sql = format!(
            "SELECT {} FROM ticket_lines
             WHERE draw_id = ?1 AND draw_date = ?2 AND status = 'PENDING'
             ORDER BY ticket_id, line_number",
            LINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![draw_id, date_to_sql(draw_date)], line_from_row)?;

        let mut lines = Vec::new();
        for line in rows {
            lines.push(line?);
        }
        Ok(lines)
    }

    pub fn grade_line(&self, line_id: i64, position: Option<u8>, prize: Money) -> Result<()> {
        let status = if position.is_some() {
            LineStatus::Winner
        } else {
            LineStatus::Loser
        };
        self.conn.execute(
            "UPDATE ticket_lines SET is_winner = ?2, winning_position = ?3, prize_amount = ?4, status = ?5
             WHERE id = ?1",
            params![
                line_id,
                position.is_some(),
                position,
                prize.cents(),
                status.as_str()
            ],
        )?;
        Ok(())
    }

    /// Recompute prize totals and the derived status of a pending ticket.
    /// Cancelled and paid tickets keep their status.
    pub fn refresh_outcome(&self, ticket_id: i64) -> Result<TicketStatus> {
        let (pending, winners, prize): (i64, i64, i64) = self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN status = 'PENDING' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_winner = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(prize_amount), 0)
             FROM ticket_lines WHERE ticket_id = ?1",
            params![ticket_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let current: String = self.conn.query_row(
            "SELECT status FROM tickets WHERE id = ?1",
            params![ticket_id],
            |row| row.get(0),
        )?;
        let current: TicketStatus = current.parse()?;
        let status = match current {
            TicketStatus::Cancelled | TicketStatus::Paid => current,
            _ if pending > 0 => TicketStatus::Pending,
            _ if winners > 0 => TicketStatus::Winner,
            _ => TicketStatus::Loser,
        };

        self.conn.execute(
            "UPDATE tickets SET total_prize = ?2, winning_lines = ?3, status = ?4 WHERE id = ?1",
            params![ticket_id, prize, winners, status.as_str()],
        )?;
        Ok(status)
    }

    pub fn mark_cancelled(
        &self,
        ticket_id: i64,
        by: i64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE tickets SET status = 'CANCELLED', cancelled_at = ?2, cancelled_by = ?3, cancel_reason = ?4
             WHERE id = ?1",
            params![ticket_id, to_timestamp(at), by, reason],
        )?;
        self.conn.execute(
            "UPDATE ticket_lines SET status = 'CANCELLED' WHERE ticket_id = ?1",
            params![ticket_id],
        )?;
        Ok(())
    }

    pub fn mark_paid(
        &self,
        ticket_id: i64,
        by: i64,
        method: &str,
        reference: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE tickets SET status = 'PAID', paid_at = ?2, paid_by = ?3, payment_method = ?4,
                payment_reference = ?5
             WHERE id = ?1",
            params![ticket_id, to_timestamp(at), by, method, reference],
        )?;
        self.conn.execute(
            "UPDATE ticket_lines SET status = 'PAID' WHERE ticket_id = ?1 AND is_winner = 1",
            params![ticket_id],
        )?;
        Ok(())
    }

    fn query_filter(query: &TicketQuery) -> SqlFilter {
        let mut filter = SqlFilter::new();
        if let Some(pool_id) = query.betting_pool_id {
            filter.push("t.betting_pool_id = ?", pool_id);
        }
        if let Some(user_id) = query.user_id {
            filter.push("t.user_id = ?", user_id);
        }
        if let Some(date) = query.date {
            filter.push("t.ticket_date = ?", date_to_sql(date));
        }
        if let Some(status) = query.status {
            filter.push("t.status = ?", status.as_str().to_string());
        }
        filter.push_in_clause(
            "t.betting_pool_id IN (SELECT id FROM betting_pools WHERE zone_id IN ({ids}))",
            &query.zone_ids,
        );
        if let Some(lottery_id) = query.lottery_id {
            filter.push(
                "EXISTS (SELECT 1 FROM ticket_lines l WHERE l.ticket_id = t.id AND l.lottery_id = ?)",
                lottery_id,
            );
        }
        if let Some(draw_id) = query.draw_id {
            filter.push(
                "EXISTS (SELECT 1 FROM ticket_lines l WHERE l.ticket_id = t.id AND l.draw_id = ?)",
                draw_id,
            );
        }
        if let Some(bet_type) = query.bet_type {
            filter.push(
                "EXISTS (SELECT 1 FROM ticket_lines l WHERE l.ticket_id = t.id AND l.bet_type = ?)",
                bet_type.code().to_string(),
            );
        }
        if let Some(number) = query.bet_number.as_deref().filter(|n| !n.is_empty()) {
            filter.push(
                "EXISTS (SELECT 1 FROM ticket_lines l WHERE l.ticket_id = t.id AND l.bet_number = ?)",
                number.to_string(),
            );
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.push_contains(&["t.code", "t.barcode", "t.customer_name"], search.trim());
        }
        filter
    }

    /// Page of matching tickets (without lines) plus totals over every match.
    pub fn search(
        &self,
        query: &TicketQuery,
        page: PageRequest,
    ) -> Result<(Vec<Ticket>, i64, TicketListTotals)> {
        let filter = Self::query_filter(query);

        let totals = self.conn.query_row(
            &format!(
                "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN t.status = 'CANCELLED' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN t.status IN ('WINNER', 'PAID') THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN t.status != 'CANCELLED' THEN t.grand_total ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN t.status != 'CANCELLED' THEN t.total_prize ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN t.status = 'WINNER' THEN t.total_prize ELSE 0 END), 0)
                 FROM tickets t{}",
                filter.where_sql()
            ),
            params_from_iter(filter.params()),
            |row| {
                Ok(TicketListTotals {
                    ticket_count: row.get(0)?,
                    cancelled_count: row.get(1)?,
                    winner_count: row.get(2)?,
                    total_sold: money(row, 3)?,
                    total_prizes: money(row, 4)?,
                    pending_payment: money(row, 5)?,
                })
            },
        )?;

        let sql = format!(
            "SELECT {} FROM tickets t{} ORDER BY t.created_at DESC, t.id DESC{}",
            TICKET_COLUMNS,
            filter.where_sql(),
            filter.limit_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(filter.paged_params(page.limit(), page.offset())),
            ticket_from_row,
        )?;

        let mut tickets = Vec::new();
        for ticket in rows {
            tickets.push(ticket?);
        }
        let total = totals.ticket_count;
        Ok((tickets, total, totals))
    }

    /// Live-ticket sales grouped by betting pool, ordered by pool code.
    pub fn sales_by_pool(&self, query: &SalesQuery) -> Result<Vec<PoolSalesAggregate>> {
        let mut filter = SqlFilter::new();
        filter
            .push_raw("t.status != 'CANCELLED'")
            .push("t.ticket_date >= ?", date_to_sql(query.start_date))
            .push("t.ticket_date <= ?", date_to_sql(query.end_date))
            .push_in("p.zone_id", &query.zone_ids)
            .push_in("p.id", &query.betting_pool_ids)
            .push_in_clause(
                "EXISTS (SELECT 1 FROM ticket_lines l WHERE l.ticket_id = t.id AND l.draw_id IN ({ids}))",
                &query.draw_ids,
            );

        let sql = format!(
            "SELECT p.id, p.code, p.name, p.zone_id, z.name, COUNT(t.id),
                SUM(t.grand_total), SUM(t.total_commission), SUM(t.total_discount), SUM(t.total_prize)
             FROM tickets t
             JOIN betting_pools p ON p.id = t.betting_pool_id
             LEFT JOIN zones z ON z.id = p.zone_id{}
             GROUP BY p.id, p.code, p.name, p.zone_id, z.name
             ORDER BY p.code",
            filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.params()), |row| {
            Ok(PoolSalesAggregate {
                betting_pool_id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
                zone_id: row.get(3)?,
                zone_name: row.get(4)?,
                ticket_count: row.get(5)?,
                sold: money(row, 6)?,
                commissions: money(row, 7)?,
                discounts: money(row, 8)?,
                prizes: money(row, 9)?,
            })
        })?;

        let mut aggregates = Vec::new();
        for aggregate in rows {
            aggregates.push(aggregate?);
        }
        Ok(aggregates)
    }

    /// Line-level sales grouped by draw for a date range.
    pub fn sales_by_draw(&self, query: &SalesQuery) -> Result<Vec<DrawSalesAggregate>> {
        let mut filter = SqlFilter::new();
        filter
            .push_raw("l.status != 'CANCELLED'")
            .push("l.draw_date >= ?", date_to_sql(query.start_date))
            .push("l.draw_date <= ?", date_to_sql(query.end_date))
            .push_in("l.draw_id", &query.draw_ids)
            .push_in("t.betting_pool_id", &query.betting_pool_ids)
            .push_in_clause(
                "t.betting_pool_id IN (SELECT id FROM betting_pools WHERE zone_id IN ({ids}))",
                &query.zone_ids,
            );

        let sql = format!(
            "SELECT d.id, d.name, COUNT(l.id), SUM(l.total_with_multiplier),
                SUM(l.commission_amount), SUM(l.prize_amount)
             FROM ticket_lines l
             JOIN tickets t ON t.id = l.ticket_id
             JOIN draws d ON d.id = l.draw_id{}
             GROUP BY d.id, d.name
             ORDER BY d.draw_time, d.name",
            filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.params()), |row| {
            Ok(DrawSalesAggregate {
                draw_id: row.get(0)?,
                draw_name: row.get(1)?,
                line_count: row.get(2)?,
                sold: money(row, 3)?,
                commissions: money(row, 4)?,
                prizes: money(row, 5)?,
            })
        })?;

        let mut aggregates = Vec::new();
        for aggregate in rows {
            aggregates.push(aggregate?);
        }
        Ok(aggregates)
    }

    /// Winning lines of live tickets, newest sale first, with totals over
    /// every match.
    pub fn winning_plays(
        &self,
        query: &WinningPlayQuery,
        page: PageRequest,
    ) -> Result<(Vec<WinningPlay>, i64, WinningPlayTotals)> {
        let mut filter = SqlFilter::new();
        filter
            .push_raw("l.is_winner = 1")
            .push_raw("t.status != 'CANCELLED'")
            .push("l.draw_date >= ?", date_to_sql(query.start_date))
            .push("l.draw_date <= ?", date_to_sql(query.end_date))
            .push_in("p.zone_id", &query.zone_ids);
        if let Some(draw_id) = query.draw_id {
            filter.push("l.draw_id = ?", draw_id);
        }
        if let Some(pool_id) = query.betting_pool_id {
            filter.push("t.betting_pool_id = ?", pool_id);
        }
        if let Some(paid) = query.is_paid {
            filter.push_raw(if paid { "t.status = 'PAID'" } else { "t.status != 'PAID'" });
        }

        let from = "FROM ticket_lines l
             JOIN tickets t ON t.id = l.ticket_id
             JOIN betting_pools p ON p.id = t.betting_pool_id
             LEFT JOIN zones z ON z.id = p.zone_id
             JOIN draws d ON d.id = l.draw_id";

        let (total, totals) = self.conn.query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(l.bet_amount), 0), COALESCE(SUM(l.prize_amount), 0) {}{}",
                from,
                filter.where_sql()
            ),
            params_from_iter(filter.params()),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    WinningPlayTotals {
                        total_sales: money(row, 1)?,
                        total_prizes: money(row, 2)?,
                    },
                ))
            },
        )?;

        let sql = format!(
            "SELECT l.id, t.id, t.code, l.bet_type, l.bet_number, l.bet_amount, l.prize_amount,
                l.draw_id, d.name, l.draw_date, l.winning_position, p.id, p.name, p.zone_id, z.name,
                t.created_at, t.status = 'PAID', t.paid_at
             {}{} ORDER BY t.created_at DESC, l.id DESC{}",
            from,
            filter.where_sql(),
            filter.limit_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(filter.paged_params(page.limit(), page.offset())),
            |row| {
                let sales_amount = money(row, 5)?;
                let prize_amount = money(row, 6)?;
                let paid_at: Option<i64> = row.get(17)?;
                Ok(WinningPlay {
                    line_id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    ticket_code: row.get(2)?,
                    bet_type: parse_enum(3, row.get(3)?)?,
                    bet_number: row.get(4)?,
                    sales_amount,
                    prize_amount,
                    total: prize_amount - sales_amount,
                    draw_id: row.get(7)?,
                    draw_name: row.get(8)?,
                    draw_date: parse_date(9, row.get(9)?)?,
                    winning_position: row.get(10)?,
                    betting_pool_id: row.get(11)?,
                    betting_pool_name: row.get(12)?,
                    zone_id: row.get(13)?,
                    zone_name: row.get(14)?,
                    created_at: from_timestamp(row.get(15)?),
                    is_paid: row.get(16)?,
                    paid_at: paid_at.map(from_timestamp),
                })
            },
        )?;

        let mut plays = Vec::new();
        for play in rows {
            plays.push(play?);
        }
        Ok((plays, total, totals))
    }

    /// Number of tickets cancelled in a date range.
    pub fn cancelled_count(&self, start: NaiveDate, end: NaiveDate) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM tickets
             WHERE status = 'CANCELLED' AND ticket_date >= ?1 AND ticket_date <= ?2",
            params![date_to_sql(start), date_to_sql(end)],
            |row| row.get(0),
        )?)
    }
}
