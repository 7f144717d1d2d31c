use super::{ensure_pool_access, grade_pending, TicketDesk};
use crate::error::{LotteryError, RejectReason, RejectedLine, Result};
use crate::limits::{
    automatic_rule, evaluate, is_at_limit, is_near_limit, percent_used, resolve_rule,
    AutomaticLimitConfig, LimitContext, LimitUsage, AUTOMATIC_CONFIG_KEY,
};
use crate::plays::canonical_number;
use crate::pricing::{price_line, ticket_discount, TicketTotals};
use crate::schedule::{business_today, check_open, validate_ticket_date, DateRules, DrawWindow};
use banca_core::catalog::permissions;
use banca_core::clock::local_day_bounds;
use banca_core::notify::{Audience, Event, LimitNotice, SalesNotice};
use banca_core::storage::{
    Draw, LimitRule, LimitStore, Lottery, LotteryStore, PoolDraw, PoolStore, ResultStore, Ticket,
    TicketLine, TicketStore, UsageKey, UserStore,
};
use banca_core::types::{DiscountMode, LineStatus, TicketStatus};
use banca_core::validation::{is_ip_address, Validator};
use banca_core::{BetType, Claims, CoreError, Money};
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

pub const MAX_LINES: usize = 100;
const MAX_BET_AMOUNT: Money = Money::from_cents(99_999_999);
const MAX_MULTIPLIER: u32 = 100;
const BARCODE_DIGITS: usize = 12;
const BARCODE_ATTEMPTS: usize = 10;

pub const DAILY_SALE_LIMIT_EXCEEDED: &str = "ticket/daily-sale-limit-exceeded";
pub const DRAW_CLOSED: &str = "ticket/draw-closed";
pub const DRAW_INACTIVE: &str = "ticket/draw-inactive";
pub const BETTING_POOL_INACTIVE: &str = "ticket/betting-pool-inactive";
pub const USER_INACTIVE: &str = "ticket/user-inactive";
pub const OUT_OF_SCHEDULE: &str = "OUT_OF_SCHEDULE";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicketLine {
    pub draw_id: i64,
    pub bet_number: String,
    pub bet_type: BetType,
    pub bet_amount: Money,
    /// Zero means the ticket's global multiplier.
    #[serde(default)]
    pub multiplier: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicket {
    pub betting_pool_id: i64,
    /// Defaults to the current business day.
    #[serde(default)]
    pub ticket_date: Option<NaiveDate>,
    #[serde(default = "default_multiplier")]
    pub global_multiplier: u32,
    #[serde(default)]
    pub apply_discount: bool,
    #[serde(default)]
    pub allow_past_date: bool,
    pub lines: Vec<NewTicketLine>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub terminal_id: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

fn default_multiplier() -> u32 {
    1
}

impl CreateTicket {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.check(
            !self.lines.is_empty() && self.lines.len() <= MAX_LINES,
            "lines",
            format!("must contain between 1 and {} lines", MAX_LINES),
        )
        .check(
            (1..=MAX_MULTIPLIER).contains(&self.global_multiplier),
            "globalMultiplier",
            "must be between 1 and 100",
        )
        .optional_max_len(self.customer_name.as_deref(), "customerName", 100)
        .optional_max_len(self.customer_phone.as_deref(), "customerPhone", 20)
        .email(self.customer_email.as_deref(), "customerEmail")
        .optional_max_len(self.terminal_id.as_deref(), "terminalId", 50)
        .check(
            self.ip_address.as_deref().map_or(true, is_ip_address),
            "ipAddress",
            "must be a valid IP address",
        );

        for (idx, line) in self.lines.iter().enumerate() {
            let number = line.bet_number.trim();
            let mut lv = Validator::new();
            lv.check(
                !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()),
                "betNumber",
                "must contain only digits",
            )
            .max_len(number, "betNumber", 20)
            .check(
                number.len() == line.bet_type.digits(),
                "betNumber",
                format!(
                    "{} numbers have {} digits",
                    line.bet_type.display_name(),
                    line.bet_type.digits()
                ),
            )
            .check(
                line.bet_amount.is_positive() && line.bet_amount <= MAX_BET_AMOUNT,
                "betAmount",
                "must be between 0.01 and 999,999.99",
            )
            .check(
                line.multiplier <= MAX_MULTIPLIER,
                "multiplier",
                "must be between 1 and 100",
            );
            v.nested(&format!("lines[{}]", idx), lv);
        }
        Ok(v.finish()?)
    }
}

struct DrawContext {
    draw: Draw,
    lottery: Lottery,
    pool_draw: Option<PoolDraw>,
    rules: Vec<LimitRule>,
}

/// A number whose usage moved toward its cap with this sale.
struct LimitCrossing {
    draw_id: i64,
    draw_date: NaiveDate,
    bet_type: BetType,
    bet_number: String,
    before: Money,
    after: Money,
    cap: Money,
}

impl LimitCrossing {
    fn event(&self) -> Option<Event> {
        let notice = LimitNotice {
            draw_id: self.draw_id,
            draw_date: self.draw_date,
            bet_type: self.bet_type,
            bet_number: self.bet_number.clone(),
            used: self.after,
            cap: self.cap,
            percent_used: percent_used(self.after, self.cap),
        };
        if is_at_limit(self.after, self.cap) && !is_at_limit(self.before, self.cap) {
            Some(Event::LimitReached(notice))
        } else if is_near_limit(self.after, self.cap) && !is_near_limit(self.before, self.cap) {
            Some(Event::LimitWarning(notice))
        } else {
            None
        }
    }
}

struct Sale {
    ticket: Ticket,
    zone_id: i64,
    crossings: Vec<LimitCrossing>,
    sales: SalesNotice,
}

fn rejected_line(
    line_number: u32,
    requested: &NewTicketLine,
    number: &str,
    error_type: RejectReason,
    available: Option<Money>,
) -> RejectedLine {
    RejectedLine {
        line_number,
        draw_id: requested.draw_id,
        bet_type: requested.bet_type,
        bet_number: number.to_string(),
        amount: requested.bet_amount,
        error_type,
        available,
    }
}

/// `XY-0001-000000042`: two random letters, the pool code, then the pool's
/// ticket sequence.
fn ticket_code(pool_code: &str, sequence: i64) -> String {
    let mut rng = rand::thread_rng();
    let a = rng.gen_range(b'A'..=b'Z') as char;
    let b = rng.gen_range(b'A'..=b'Z') as char;
    format!("{}{}-{}-{:09}", a, b, pool_code, sequence)
}

fn random_barcode() -> String {
    let mut rng = rand::thread_rng();
    (0..BARCODE_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

impl TicketDesk {
    /// Sell a ticket. Every check and the insert run in one transaction, so
    /// limit usage cannot change between evaluation and commit.
    pub async fn create_ticket(&self, request: CreateTicket, claims: &Claims) -> Result<Ticket> {
        request.validate()?;
        let now = Utc::now();

        let sale = {
            let mut conn = self.office.storage().get_connection().await;
            self.sell(&mut conn, &request, claims, now)?
        };
        let Sale {
            mut ticket,
            zone_id,
            crossings,
            sales,
        } = sale;

        for line in &ticket.lines {
            self.office.reservations().release_for_pool(
                ticket.betting_pool_id,
                line.draw_id,
                line.bet_type,
                &line.bet_number,
            );
        }

        tracing::info!(
            "Created ticket {} with {} lines, total {}",
            ticket.code,
            ticket.line_count,
            ticket.grand_total
        );

        self.publish_ticket(Event::TicketCreated, &ticket, Some(zone_id), None);
        self.office.notifier().publish(
            vec![Audience::BettingPool(sales.betting_pool_id), Audience::Zone(zone_id)],
            Event::SalesUpdate(sales),
        );
        for crossing in &crossings {
            if let Some(event) = crossing.event() {
                self.office.notifier().publish(
                    vec![Audience::Global, Audience::Draw(crossing.draw_id)],
                    event,
                );
            }
        }

        // Draws that already have a result are graded right away
        let graded = {
            let mut conn = self.office.storage().get_connection().await;
            grade_published(&mut conn, &ticket)
        };
        match graded {
            Ok(Some(winners)) => {
                for winner in &winners {
                    self.publish_ticket(Event::TicketWon, winner, None, None);
                }
                ticket = self.load_ticket(ticket.id).await?;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to grade new ticket {} against published results: {}", ticket.code, e);
            }
        }

        Ok(ticket)
    }

    fn sell(
        &self,
        conn: &mut Connection,
        request: &CreateTicket,
        claims: &Claims,
        now: DateTime<Utc>,
    ) -> Result<Sale> {
        let tx = conn.transaction()?;
        let pools = PoolStore::new(&tx);
        let tickets = TicketStore::new(&tx);
        let lotteries = LotteryStore::new(&tx);
        let limits = LimitStore::new(&tx);

        let pool = pools
            .get(request.betting_pool_id)?
            .ok_or_else(|| CoreError::not_found("Betting pool", request.betting_pool_id))?;
        ensure_pool_access(claims, pool.id, "sell")?;
        if !pool.is_active {
            return Err(CoreError::rule(
                BETTING_POOL_INACTIVE,
                format!("Betting pool {} is not active", pool.code),
            )
            .into());
        }
        let config = pools.get_config(pool.id)?;

        let today = business_today(now, self.business_offset());
        let ticket_date = request.ticket_date.unwrap_or(today);
        if request.ticket_date.is_some() {
            validate_ticket_date(
                today,
                ticket_date,
                DateRules {
                    allow_past: request.allow_past_date,
                    has_past_permission: claims.has_permission(permissions::TICKET_PREVIOUS_DAY_SALE),
                    future_mode: config.future_sales_mode,
                    max_future_days: config.max_future_days,
                },
            )?;
        }

        if let Some(limit) = config.daily_sale_limit.filter(|l| l.is_positive()) {
            let (from, to) = local_day_bounds(today, self.business_offset());
            let current = tickets.sold_between(pool.id, from, to)?;
            let ticket_amount: Money = request.lines.iter().map(|l| l.bet_amount).sum();
            if current + ticket_amount > limit {
                return Err(CoreError::rule_with(
                    DAILY_SALE_LIMIT_EXCEEDED,
                    "The betting pool reached its daily sale limit",
                    json!({
                        "dailySaleLimit": limit,
                        "currentDailySales": current,
                        "ticketAmount": ticket_amount,
                        "remaining": (limit - current).max(Money::ZERO),
                    }),
                )
                .into());
            }
        }

        let user = UserStore::new(&tx)
            .get(claims.user_id())?
            .ok_or_else(|| CoreError::not_found("User", claims.user_id()))?;
        if !user.is_active {
            return Err(CoreError::rule(USER_INACTIVE, format!("User {} is not active", user.username)).into());
        }

        let sells_out_of_hours = claims.has_permission(permissions::SELL_OUT_OF_HOURS);
        let automatic: AutomaticLimitConfig = limits.get_setting(AUTOMATIC_CONFIG_KEY)?.unwrap_or_default();

        let mut draws: HashMap<i64, DrawContext> = HashMap::new();
        let mut out_of_schedule = false;
        let mut rejected = Vec::new();
        let mut lines = Vec::with_capacity(request.lines.len());
        let mut draw_times = Vec::with_capacity(request.lines.len());
        let mut crossings = Vec::new();
        let mut on_number: HashMap<(i64, BetType, String), Money> = HashMap::new();
        let mut on_bet_type: HashMap<(i64, BetType), Money> = HashMap::new();

        for (idx, requested) in request.lines.iter().enumerate() {
            let line_number = idx as u32 + 1;
            let bet_type = requested.bet_type;
            let number = canonical_number(bet_type, requested.bet_number.trim());

            if !draws.contains_key(&requested.draw_id) {
                let draw = lotteries
                    .get_draw(requested.draw_id)?
                    .ok_or_else(|| CoreError::not_found("Draw", requested.draw_id))?;
                if !draw.is_active {
                    return Err(CoreError::rule(
                        DRAW_INACTIVE,
                        format!("Draw {} is not active", draw.name),
                    )
                    .into());
                }
                let lottery = lotteries
                    .get_lottery(draw.lottery_id)?
                    .ok_or_else(|| CoreError::not_found("Lottery", draw.lottery_id))?;
                let context = DrawContext {
                    pool_draw: pools.get_pool_draw(pool.id, draw.id)?,
                    rules: limits.candidates_for_draw(draw.id)?,
                    draw,
                    lottery,
                };
                draws.insert(requested.draw_id, context);
            }
            let Some(ctx) = draws.get(&requested.draw_id) else {
                continue;
            };

            if !ctx.draw.allows(bet_type) {
                rejected.push(rejected_line(line_number, requested, &number, RejectReason::InvalidForLottery, None));
                continue;
            }
            if ctx.pool_draw.as_ref().map_or(false, |pd| !pd.is_enabled) {
                rejected.push(rejected_line(line_number, requested, &number, RejectReason::DrawDisabled, None));
                continue;
            }

            if ticket_date == today {
                let anticipated = ctx.pool_draw.as_ref().and_then(|pd| pd.anticipated_closing_minutes);
                if let DrawWindow::Closed { closing } =
                    check_open(&ctx.draw, ctx.lottery.utc_offset_minutes, anticipated, now)
                {
                    if !sells_out_of_hours {
                        return Err(CoreError::rule_with(
                            DRAW_CLOSED,
                            format!("Draw {} closed sales at {}", ctx.draw.name, closing.format("%I:%M %p")),
                            json!({
                                "drawId": ctx.draw.id,
                                "closingTime": closing.format("%H:%M").to_string(),
                            }),
                        )
                        .into());
                    }
                    out_of_schedule = true;
                }
            }

            let commission = pools
                .find_prize(pool.id, ctx.lottery.id, bet_type)?
                .and_then(|p| p.commission_percentage)
                .unwrap_or(0.0);
            let multiplier = if requested.multiplier > 0 {
                requested.multiplier
            } else {
                request.global_multiplier
            };
            let price = price_line(requested.bet_amount, multiplier, commission);
            let amount = price.total_with_multiplier;

            let number_key = (ctx.draw.id, bet_type, number.clone());
            let earlier_on_number = on_number.get(&number_key).copied().unwrap_or_default();
            let earlier_on_type = on_bet_type.get(&(ctx.draw.id, bet_type)).copied().unwrap_or_default();

            let limit_ctx = LimitContext {
                draw_id: ctx.draw.id,
                bet_type,
                zone_id: pool.zone_id,
                betting_pool_id: pool.id,
                bet_number: &number,
                now,
            };
            let rule = resolve_rule(&ctx.rules, &limit_ctx)
                .cloned()
                .or_else(|| automatic_rule(&automatic, bet_type));

            if let Some(rule) = rule {
                let key = UsageKey {
                    draw_id: ctx.draw.id,
                    draw_date: ticket_date,
                    bet_type,
                    bet_number: &number,
                };
                let usage = LimitUsage {
                    ticket: earlier_on_number,
                    pool: tickets.number_usage(&key, Some(pool.id))? + earlier_on_number,
                    number: tickets.number_usage(&key, None)? + earlier_on_number,
                    global: tickets.bet_type_usage(ctx.draw.id, ticket_date, bet_type)? + earlier_on_type,
                    reserved: self.office.reservations().reserved_amount(
                        ctx.draw.id,
                        bet_type,
                        &number,
                        Some(pool.id),
                    ),
                };
                let check = evaluate(&rule, &usage, amount);
                if !check.allowed {
                    tracing::debug!(
                        "Line {} on {} {} exceeds limit rule {}",
                        line_number,
                        bet_type,
                        number,
                        rule.id
                    );
                    rejected.push(rejected_line(
                        line_number,
                        requested,
                        &number,
                        RejectReason::ExceedsLimit,
                        check.remaining,
                    ));
                    continue;
                }
                if let Some(cap) = check.cap {
                    crossings.push(LimitCrossing {
                        draw_id: ctx.draw.id,
                        draw_date: ticket_date,
                        bet_type,
                        bet_number: number.clone(),
                        before: check.used,
                        after: check.used + amount,
                        cap,
                    });
                }
            }

            *on_number.entry(number_key).or_default() += amount;
            *on_bet_type.entry((ctx.draw.id, bet_type)).or_default() += amount;
            draw_times.push(ctx.draw.draw_time);
            lines.push(TicketLine {
                id: 0,
                ticket_id: 0,
                line_number,
                draw_id: ctx.draw.id,
                lottery_id: ctx.lottery.id,
                draw_date: ticket_date,
                bet_number: number,
                bet_type,
                bet_amount: requested.bet_amount,
                multiplier,
                subtotal: price.subtotal,
                total_with_multiplier: price.total_with_multiplier,
                commission_percentage: commission,
                commission_amount: price.commission_amount,
                net_amount: price.net_amount,
                prize_amount: Money::ZERO,
                is_winner: false,
                winning_position: None,
                status: LineStatus::Pending,
            });
        }

        if !rejected.is_empty() {
            return Err(LotteryError::rejected(rejected));
        }

        let total_bet: Money = lines.iter().map(|l| l.subtotal).sum();
        let discount = match (
            request.apply_discount,
            config.discount_mode,
            config.discount_amount,
            config.discount_per_every,
        ) {
            (true, mode, Some(amount), Some(per_every)) if mode != DiscountMode::Off => {
                ticket_discount(total_bet, amount, per_every)
            }
            _ => Money::ZERO,
        };
        let totals = TicketTotals::from_lines(&lines, &draw_times, discount);

        let code = ticket_code(&pool.code, tickets.count_for_pool(pool.id)? + 1);
        let mut barcode = None;
        for _ in 0..BARCODE_ATTEMPTS {
            let candidate = random_barcode();
            if !tickets.barcode_exists(&candidate)? {
                barcode = Some(candidate);
                break;
            }
        }
        let barcode = barcode.ok_or_else(|| CoreError::internal("could not allocate a unique barcode"))?;

        let mut ticket = Ticket {
            id: 0,
            code,
            barcode,
            betting_pool_id: pool.id,
            user_id: user.id,
            ticket_date,
            created_at: now,
            global_multiplier: request.global_multiplier,
            line_count: totals.line_count,
            total_bet: totals.total_bet,
            total_with_multiplier: totals.total_with_multiplier,
            total_commission: totals.total_commission,
            total_discount: totals.total_discount,
            total_net: totals.total_net,
            grand_total: totals.grand_total,
            total_prize: Money::ZERO,
            winning_lines: 0,
            status: TicketStatus::Pending,
            special_flags: out_of_schedule.then(|| OUT_OF_SCHEDULE.to_string()),
            lottery_ids: totals.lottery_ids,
            earliest_draw_time: totals.earliest_draw_time,
            latest_draw_time: totals.latest_draw_time,
            customer_name: request.customer_name.clone(),
            customer_phone: request.customer_phone.clone(),
            customer_email: request.customer_email.clone(),
            terminal_id: request.terminal_id.clone(),
            ip_address: request.ip_address.clone(),
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
            paid_at: None,
            paid_by: None,
            payment_method: None,
            payment_reference: None,
            lines,
        };
        ticket.id = tickets.insert(&ticket)?;
        ticket.lines = tickets.lines_for(ticket.id)?;

        let (ticket_count, total_sold) = tickets.day_totals(pool.id, ticket_date)?;
        tx.commit()?;

        Ok(Sale {
            ticket,
            zone_id: pool.zone_id,
            crossings,
            sales: SalesNotice {
                betting_pool_id: pool.id,
                date: ticket_date,
                total_sold,
                ticket_count,
            },
        })
    }
}

/// Grade the ticket's draws that already have a published result. Returns
/// `None` when none has.
fn grade_published(conn: &mut Connection, ticket: &Ticket) -> Result<Option<Vec<Ticket>>> {
    let plays: BTreeSet<(i64, NaiveDate)> = ticket.lines.iter().map(|l| (l.draw_id, l.draw_date)).collect();

    let tx = conn.transaction()?;
    let results = ResultStore::new(&tx);
    let mut winners: Vec<Ticket> = Vec::new();
    let mut any = false;
    for (draw_id, date) in plays {
        if let Some(result) = results.get(draw_id, date)? {
            any = true;
            let (_, won) = grade_pending(&tx, &result)?;
            for ticket in won {
                if !winners.iter().any(|w| w.id == ticket.id) {
                    winners.push(ticket);
                }
            }
        }
    }
    tx.commit()?;
    Ok(any.then_some(winners))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::testing::{claims_for, fixture};
    use crate::desk::LimitRuleRequest;
    use banca_core::backoffice::UpsertPrize;
    use banca_core::storage::PoolConfig;
    use banca_core::types::FutureSalesMode;

    fn line(draw_id: i64, bet_type: BetType, number: &str, units: i64) -> NewTicketLine {
        NewTicketLine {
            draw_id,
            bet_number: number.to_string(),
            bet_type,
            bet_amount: Money::from_units(units),
            multiplier: 0,
        }
    }

    fn ticket_for(pool_id: i64, lines: Vec<NewTicketLine>) -> CreateTicket {
        CreateTicket {
            betting_pool_id: pool_id,
            ticket_date: None,
            global_multiplier: 1,
            apply_discount: false,
            allow_past_date: false,
            lines,
            customer_name: Some("Juan".to_string()),
            customer_phone: None,
            customer_email: None,
            terminal_id: None,
            ip_address: None,
        }
    }

    #[tokio::test]
    async fn test_sell_ticket() {
        let f = fixture().await;
        let request = ticket_for(
            f.pool.id,
            vec![
                line(f.draw.id, BetType::Directo, "25", 10),
                line(f.draw.id, BetType::Pale, "3412", 5),
            ],
        );

        let ticket = f.desk.create_ticket(request, &f.seller).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(ticket.line_count, 2);
        assert_eq!(ticket.grand_total, Money::from_units(15));
        assert_eq!(ticket.lines.len(), 2);
        assert_eq!(ticket.lines[1].bet_number, "1234");
        assert_eq!(ticket.barcode.len(), 12);

        let parts: Vec<&str> = ticket.code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1], f.pool.code);
        assert_eq!(parts[2], "000000001");

        let second = f
            .desk
            .create_ticket(ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "25", 1)]), &f.seller)
            .await
            .unwrap();
        assert!(second.code.ends_with("-000000002"));
    }

    #[tokio::test]
    async fn test_commission_and_discount() {
        let f = fixture().await;
        let office = f.desk.backoffice();
        office
            .upsert_pool_prize(
                f.pool.id,
                UpsertPrize {
                    lottery_id: None,
                    bet_type: BetType::Directo,
                    payouts: None,
                    commission_percentage: Some(10.0),
                    is_active: true,
                },
            )
            .await
            .unwrap();
        let mut config = PoolConfig::default();
        config.discount_mode = DiscountMode::Group;
        config.discount_amount = Some(Money::from_units(1));
        config.discount_per_every = Some(Money::from_units(10));
        office.update_pool_config(f.pool.id, config).await.unwrap();

        let mut request = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "07", 30)]);
        request.apply_discount = true;
        let ticket = f.desk.create_ticket(request, &f.seller).await.unwrap();

        assert_eq!(ticket.total_commission, Money::from_units(3));
        assert_eq!(ticket.total_discount, Money::from_units(3));
        assert_eq!(ticket.grand_total, Money::from_units(27));
        assert_eq!(ticket.total_net, Money::from_units(24));
    }

    #[tokio::test]
    async fn test_limit_rejects_cumulative_lines() {
        let f = fixture().await;
        f.desk
            .create_limit(
                LimitRuleRequest {
                    name: "Tope 25".to_string(),
                    draw_id: Some(f.draw.id),
                    bet_number_pattern: Some("25".to_string()),
                    max_bet_per_number: Some(Money::from_units(100)),
                    ..LimitRuleRequest::default()
                },
                &f.admin,
            )
            .await
            .unwrap();

        let within = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "25", 60)]);
        f.desk.create_ticket(within, &f.seller).await.unwrap();

        let over = ticket_for(
            f.pool.id,
            vec![
                line(f.draw.id, BetType::Directo, "25", 30),
                line(f.draw.id, BetType::Directo, "25", 20),
                line(f.draw.id, BetType::Directo, "26", 500),
            ],
        );
        match f.desk.create_ticket(over, &f.seller).await {
            Err(LotteryError::BetsRejected { code, lines, .. }) => {
                assert_eq!(code, LotteryError::BETS_EXCEED_LIMITS);
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].line_number, 2);
                assert_eq!(lines[0].available, Some(Money::from_units(10)));
            }
            other => panic!("expected rejected bets, got {:?}", other.map(|t| t.code)),
        }
    }

    #[tokio::test]
    async fn test_bet_type_not_offered_by_draw() {
        let f = fixture().await;
        let office = f.desk.backoffice();
        let mut update = banca_core::backoffice::UpdateDraw::default();
        update.bet_types = Some(vec![BetType::Directo]);
        office.update_draw(f.draw.id, update).await.unwrap();

        let request = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Tripleta, "123456", 1)]);
        match f.desk.create_ticket(request, &f.seller).await {
            Err(LotteryError::BetsRejected { code, lines, .. }) => {
                assert_eq!(code, LotteryError::INVALID_BET_TYPES);
                assert_eq!(lines[0].error_type, RejectReason::InvalidForLottery);
            }
            other => panic!("expected rejected bets, got {:?}", other.map(|t| t.code)),
        }
    }

    #[tokio::test]
    async fn test_daily_sale_limit() {
        let f = fixture().await;
        let mut config = PoolConfig::default();
        config.daily_sale_limit = Some(Money::from_units(50));
        f.desk.backoffice().update_pool_config(f.pool.id, config).await.unwrap();

        let first = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "01", 40)]);
        f.desk.create_ticket(first, &f.seller).await.unwrap();

        let second = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "02", 20)]);
        match f.desk.create_ticket(second, &f.seller).await {
            Err(LotteryError::Core(CoreError::Rule { code, details, .. })) => {
                assert_eq!(code, DAILY_SALE_LIMIT_EXCEEDED);
                assert_eq!(details["remaining"], json!(10.0));
            }
            other => panic!("expected daily limit error, got {:?}", other.map(|t| t.code)),
        }
    }

    #[tokio::test]
    async fn test_daily_sale_limit_counts_future_dated_sales() {
        let f = fixture().await;
        let mut config = PoolConfig::default();
        config.daily_sale_limit = Some(Money::from_units(50));
        config.future_sales_mode = FutureSalesMode::Days;
        config.max_future_days = Some(3);
        f.desk.backoffice().update_pool_config(f.pool.id, config).await.unwrap();

        let today = business_today(Utc::now(), f.desk.business_offset());
        let mut ahead = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "03", 40)]);
        ahead.ticket_date = Some(today + chrono::Duration::days(2));
        f.desk.create_ticket(ahead, &f.seller).await.unwrap();

        let now = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "04", 20)]);
        match f.desk.create_ticket(now, &f.seller).await {
            Err(LotteryError::Core(CoreError::Rule { code, details, .. })) => {
                assert_eq!(code, DAILY_SALE_LIMIT_EXCEEDED);
                assert_eq!(details["currentDailySales"], json!(40.0));
            }
            other => panic!("expected daily limit error, got {:?}", other.map(|t| t.code)),
        }
    }

    #[tokio::test]
    async fn test_seller_bound_to_own_pool() {
        let f = fixture().await;
        let stranger = claims_for(f.seller.sub, Some(f.pool.id + 100), false, &[]);
        let request = ticket_for(f.pool.id, vec![line(f.draw.id, BetType::Directo, "01", 1)]);
        assert!(matches!(
            f.desk.create_ticket(request, &stranger).await,
            Err(LotteryError::Core(CoreError::Forbidden(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let f = fixture().await;
        let request = ticket_for(
            f.pool.id,
            vec![
                line(f.draw.id, BetType::Directo, "123", 1),
                line(f.draw.id, BetType::Directo, "1a", 0),
            ],
        );
        match f.desk.create_ticket(request, &f.seller).await {
            Err(LotteryError::Core(CoreError::Validation(errors))) => {
                assert!(errors.iter().any(|e| e.field == "lines[0].betNumber"));
                assert!(errors.iter().any(|e| e.field == "lines[1].betAmount"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|t| t.code)),
        }

        let empty = ticket_for(f.pool.id, vec![]);
        assert!(f.desk.create_ticket(empty, &f.seller).await.is_err());
    }
}
