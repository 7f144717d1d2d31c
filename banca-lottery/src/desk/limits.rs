use super::{ensure_pool_access, TicketDesk};
use crate::error::Result;
use crate::limits::{
    automatic_rule, is_at_limit, is_near_limit, percent_used, resolve_rule, AutomaticControls,
    AutomaticLimitConfig, LimitContext, RandomBlockConfig, AUTOMATIC_CONFIG_KEY,
    RANDOM_BLOCK_CONFIG_KEY,
};
use crate::plays::canonical_number;
use crate::schedule::business_today;
use banca_core::notify::{Audience, Event, LimitRuleNotice};
use banca_core::reservation::HoldOutcome;
use banca_core::storage::{
    LimitFilter, LimitRule, LimitStore, LotteryStore, PoolStore, TicketStore, UsageKey, ZoneStore,
    SOURCE_MANUAL, SOURCE_RANDOM_BLOCK,
};
use banca_core::types::{Page, PageRequest};
use banca_core::validation::Validator;
use banca_core::{BetType, Claims, CoreError, Money};
use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distinct pales of two different two-digit numbers: C(100, 2).
pub const MAX_RANDOM_PALES: u32 = 4950;

/// Reported as `remaining` when no rule caps the number.
const UNLIMITED: Money = Money::from_cents(-100);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRuleRequest {
    pub name: String,
    pub draw_id: Option<i64>,
    pub bet_type: Option<BetType>,
    pub zone_id: Option<i64>,
    pub betting_pool_id: Option<i64>,
    pub bet_number_pattern: Option<String>,
    pub max_bet_per_number: Option<Money>,
    pub max_bet_per_ticket: Option<Money>,
    pub max_bet_per_betting_pool: Option<Money>,
    pub max_bet_global: Option<Money>,
    pub priority: Option<i32>,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl LimitRuleRequest {
    fn pattern(&self) -> Option<String> {
        self.bet_number_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }

    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.required(&self.name, "name").max_len(&self.name, "name", 100);

        let caps = [
            ("maxBetPerNumber", self.max_bet_per_number),
            ("maxBetPerTicket", self.max_bet_per_ticket),
            ("maxBetPerBettingPool", self.max_bet_per_betting_pool),
            ("maxBetGlobal", self.max_bet_global),
        ];
        v.check(
            caps.iter().any(|(_, cap)| cap.is_some()),
            "maxBetPerNumber",
            "at least one cap is required",
        );
        for (field, cap) in caps {
            v.check(cap.map_or(true, |c| !c.is_negative()), field, "must not be negative");
        }

        if let Some(pattern) = self.pattern() {
            v.check(
                pattern.len() <= 20 && pattern.chars().all(|c| c.is_ascii_digit() || c == '#'),
                "betNumberPattern",
                "may only contain digits and #",
            );
            if let Some(bet_type) = self.bet_type {
                v.check(
                    pattern.len() == bet_type.digits(),
                    "betNumberPattern",
                    format!("{} numbers have {} digits", bet_type.display_name(), bet_type.digits()),
                );
            }
        }
        if let (Some(from), Some(to)) = (self.effective_from, self.effective_to) {
            v.check(from <= to, "effectiveTo", "must not be before effectiveFrom");
        }
        Ok(v.finish()?)
    }

    fn apply_to(&self, rule: &mut LimitRule) {
        rule.name = self.name.trim().to_string();
        rule.draw_id = self.draw_id;
        rule.bet_type = self.bet_type;
        rule.zone_id = self.zone_id;
        rule.betting_pool_id = self.betting_pool_id;
        rule.bet_number_pattern = match (self.pattern(), self.bet_type) {
            (Some(p), Some(bt)) if !p.contains('#') => Some(canonical_number(bt, &p)),
            (p, _) => p,
        };
        rule.max_bet_per_number = self.max_bet_per_number;
        rule.max_bet_per_ticket = self.max_bet_per_ticket;
        rule.max_bet_per_betting_pool = self.max_bet_per_betting_pool;
        rule.max_bet_global = self.max_bet_global;
        rule.priority = self.priority;
        rule.effective_from = self.effective_from;
        rule.effective_to = self.effective_to;
        if let Some(active) = self.is_active {
            rule.is_active = active;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitQuery {
    pub draw_id: Option<i64>,
    pub bet_type: Option<BetType>,
    pub betting_pool_id: Option<i64>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveLimit {
    pub draw_id: i64,
    pub bet_type: BetType,
    pub bet_number: String,
    pub betting_pool_id: i64,
    pub amount: Money,
    #[serde(default)]
    pub draw_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveOutcome {
    /// `None` when the number is blocked.
    pub reservation_id: Option<Uuid>,
    pub is_blocked: bool,
    pub max_limit: Money,
    /// Sold on saved tickets.
    pub current_amount: Money,
    pub reserved_amount: Money,
    /// `-1` when the number has no cap.
    pub remaining: Money,
    pub percent_used: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutcome {
    pub remaining: Money,
    pub max_limit: Money,
    pub percent_used: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitConsumption {
    pub bet_type: BetType,
    pub bet_number: String,
    pub used: Money,
    pub line_count: i64,
    pub cap: Option<Money>,
    pub remaining: Option<Money>,
    pub percent_used: f64,
    pub is_near_limit: bool,
    pub is_at_limit: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomBlockRequest {
    pub draw_ids: Vec<i64>,
    pub pales_to_block: u32,
    #[serde(default)]
    pub betting_pool_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomBlockOutcome {
    pub blocked_count: usize,
    pub rules_created: usize,
    pub blocked_pales: Vec<String>,
}

/// The cap a reservation is measured against and the usage it is compared
/// with. Per-number caps win over per-pool caps, which win over global ones.
fn reservation_cap(
    rule: &LimitRule,
    tickets: &TicketStore<'_>,
    key: &UsageKey<'_>,
    pool_id: i64,
) -> Result<Option<(Money, Money)>> {
    if let Some(cap) = rule.max_bet_per_number {
        return Ok(Some((cap, tickets.number_usage(key, None)?)));
    }
    if let Some(cap) = rule.max_bet_per_betting_pool {
        return Ok(Some((cap, tickets.number_usage(key, Some(pool_id))?)));
    }
    if let Some(cap) = rule.max_bet_global {
        return Ok(Some((cap, tickets.bet_type_usage(key.draw_id, key.draw_date, key.bet_type)?)));
    }
    Ok(None)
}

fn random_pales(count: usize) -> Vec<String> {
    let mut all = Vec::with_capacity(MAX_RANDOM_PALES as usize);
    for low in 0..100u32 {
        for high in (low + 1)..100 {
            all.push(format!("{:04}", low * 100 + high));
        }
    }
    let mut rng = rand::thread_rng();
    let mut chosen: Vec<String> = all.choose_multiple(&mut rng, count).cloned().collect();
    chosen.sort();
    chosen
}

impl TicketDesk {
    fn publish_limit_change(&self, limit_id: i64, action: &str) {
        self.office.notifier().publish(
            vec![Audience::Global],
            Event::LimitUpdated(LimitRuleNotice {
                limit_id,
                action: action.to_string(),
            }),
        );
    }

    fn check_limit_targets(conn: &Connection, request: &LimitRuleRequest) -> Result<()> {
        if let Some(draw_id) = request.draw_id {
            LotteryStore::new(conn)
                .get_draw(draw_id)?
                .ok_or_else(|| CoreError::not_found("Draw", draw_id))?;
        }
        if let Some(pool_id) = request.betting_pool_id {
            PoolStore::new(conn)
                .get(pool_id)?
                .ok_or_else(|| CoreError::not_found("Betting pool", pool_id))?;
        }
        if let Some(zone_id) = request.zone_id {
            ZoneStore::new(conn)
                .get(zone_id)?
                .ok_or_else(|| CoreError::not_found("Zone", zone_id))?;
        }
        Ok(())
    }

    pub async fn create_limit(&self, request: LimitRuleRequest, claims: &Claims) -> Result<LimitRule> {
        request.validate()?;

        let now = Utc::now();
        let mut rule = LimitRule {
            id: 0,
            name: String::new(),
            draw_id: None,
            bet_type: None,
            zone_id: None,
            betting_pool_id: None,
            bet_number_pattern: None,
            max_bet_per_number: None,
            max_bet_per_ticket: None,
            max_bet_per_betting_pool: None,
            max_bet_global: None,
            priority: None,
            effective_from: None,
            effective_to: None,
            source: SOURCE_MANUAL.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        request.apply_to(&mut rule);

        {
            let conn = self.office.storage().get_connection().await;
            Self::check_limit_targets(&conn, &request)?;
            rule.id = LimitStore::new(&conn).insert(&rule)?;
        }

        tracing::info!("User {} created limit rule {} ({})", claims.user_id(), rule.id, rule.name);
        self.publish_limit_change(rule.id, "created");
        Ok(rule)
    }

    pub async fn get_limit(&self, id: i64) -> Result<LimitRule> {
        let conn = self.office.storage().get_connection().await;
        Ok(LimitStore::new(&conn)
            .get(id)?
            .ok_or_else(|| CoreError::not_found("Limit rule", id))?)
    }

    pub async fn list_limits(&self, query: LimitQuery) -> Result<Page<LimitRule>> {
        let page = PageRequest::from_parts(query.page, query.page_size);
        page.validate()?;
        let filter = LimitFilter {
            draw_id: query.draw_id,
            bet_type: query.bet_type,
            betting_pool_id: query.betting_pool_id,
            is_active: query.is_active,
        };

        let conn = self.office.storage().get_connection().await;
        let (rules, total) = LimitStore::new(&conn).list(&filter, page)?;
        Ok(Page::new(rules, page, total))
    }

    pub async fn update_limit(&self, id: i64, request: LimitRuleRequest, claims: &Claims) -> Result<LimitRule> {
        request.validate()?;

        let rule = {
            let conn = self.office.storage().get_connection().await;
            Self::check_limit_targets(&conn, &request)?;
            let store = LimitStore::new(&conn);
            let mut rule = store
                .get(id)?
                .ok_or_else(|| CoreError::not_found("Limit rule", id))?;
            request.apply_to(&mut rule);
            rule.updated_at = Utc::now();
            store.update(&rule)?;
            rule
        };

        tracing::info!("User {} updated limit rule {}", claims.user_id(), id);
        self.publish_limit_change(id, "updated");
        Ok(rule)
    }

    pub async fn toggle_limit(&self, id: i64) -> Result<LimitRule> {
        let rule = {
            let conn = self.office.storage().get_connection().await;
            let store = LimitStore::new(&conn);
            let mut rule = store
                .get(id)?
                .ok_or_else(|| CoreError::not_found("Limit rule", id))?;
            rule.is_active = !rule.is_active;
            rule.updated_at = Utc::now();
            store.update(&rule)?;
            rule
        };

        self.publish_limit_change(id, if rule.is_active { "activated" } else { "deactivated" });
        Ok(rule)
    }

    pub async fn delete_limit(&self, id: i64) -> Result<()> {
        let deleted = {
            let conn = self.office.storage().get_connection().await;
            LimitStore::new(&conn).delete(id)?
        };
        if !deleted {
            return Err(CoreError::not_found("Limit rule", id).into());
        }
        self.publish_limit_change(id, "deleted");
        Ok(())
    }

    fn applicable_rule(
        conn: &Connection,
        draw_id: i64,
        bet_type: BetType,
        bet_number: &str,
        pool_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<LimitRule>> {
        let pool = PoolStore::new(conn)
            .get(pool_id)?
            .ok_or_else(|| CoreError::not_found("Betting pool", pool_id))?;
        let limits = LimitStore::new(conn);
        let rules = limits.candidates_for_draw(draw_id)?;
        let ctx = LimitContext {
            draw_id,
            bet_type,
            zone_id: pool.zone_id,
            betting_pool_id: pool.id,
            bet_number,
            now,
        };
        if let Some(rule) = resolve_rule(&rules, &ctx) {
            return Ok(Some(rule.clone()));
        }
        let automatic: AutomaticLimitConfig = limits.get_setting(AUTOMATIC_CONFIG_KEY)?.unwrap_or_default();
        Ok(automatic_rule(&automatic, bet_type))
    }

    /// Hold limit capacity for a play typed at a terminal. Blocked plays get
    /// no reservation, only the current availability.
    pub async fn reserve_limit(&self, request: ReserveLimit, claims: &Claims) -> Result<ReserveOutcome> {
        let number = request.bet_number.trim();
        let mut v = Validator::new();
        v.check(request.amount.is_positive(), "amount", "must be greater than 0")
            .check(
                number.len() == request.bet_type.digits() && number.chars().all(|c| c.is_ascii_digit()),
                "betNumber",
                format!("must have {} digits", request.bet_type.digits()),
            );
        v.finish()?;
        ensure_pool_access(claims, request.betting_pool_id, "reserve")?;

        let number = canonical_number(request.bet_type, number);
        let now = Utc::now();
        let date = request
            .draw_date
            .unwrap_or_else(|| business_today(now, self.business_offset()));
        let reservations = self.office.reservations();

        // The storage guard is held until the hold is placed, so no sale can
        // commit between measuring usage and reserving.
        let conn = self.office.storage().get_connection().await;
        let measured = match Self::applicable_rule(&conn, request.draw_id, request.bet_type, &number, request.betting_pool_id, now)? {
            Some(rule) => {
                let key = UsageKey {
                    draw_id: request.draw_id,
                    draw_date: date,
                    bet_type: request.bet_type,
                    bet_number: &number,
                };
                reservation_cap(&rule, &TicketStore::new(&conn), &key, request.betting_pool_id)?
            }
            None => None,
        };

        let Some((cap, current)) = measured else {
            drop(conn);
            let id = reservations.reserve(
                request.draw_id,
                request.bet_type,
                &number,
                request.betting_pool_id,
                request.amount,
            );
            return Ok(ReserveOutcome {
                reservation_id: Some(id),
                is_blocked: false,
                max_limit: Money::ZERO,
                current_amount: Money::ZERO,
                reserved_amount: Money::ZERO,
                remaining: UNLIMITED,
                percent_used: 0.0,
            });
        };

        let hold = reservations.reserve_within(
            request.draw_id,
            request.bet_type,
            &number,
            request.betting_pool_id,
            request.amount,
            cap - current,
        );
        drop(conn);

        match hold {
            HoldOutcome::Blocked { reserved } => Ok(ReserveOutcome {
                reservation_id: None,
                is_blocked: true,
                max_limit: cap,
                current_amount: current,
                reserved_amount: reserved,
                remaining: (cap - current - reserved).max(Money::ZERO),
                percent_used: percent_used(current + reserved, cap),
            }),
            HoldOutcome::Held { id, reserved } => {
                let total = current + reserved + request.amount;
                Ok(ReserveOutcome {
                    reservation_id: Some(id),
                    is_blocked: false,
                    max_limit: cap,
                    current_amount: current,
                    reserved_amount: reserved + request.amount,
                    remaining: (cap - total).max(Money::ZERO),
                    percent_used: percent_used(total, cap),
                })
            }
        }
    }

    pub async fn release_reservation(&self, id: Uuid) -> Result<ReleaseOutcome> {
        let reservation = self
            .office
            .reservations()
            .get(id)
            .ok_or_else(|| CoreError::not_found("Reservation", id))?;
        self.office.reservations().release(id);

        let now = Utc::now();
        let date = business_today(now, self.business_offset());
        let measured = {
            let conn = self.office.storage().get_connection().await;
            match Self::applicable_rule(
                &conn,
                reservation.draw_id,
                reservation.bet_type,
                &reservation.bet_number,
                reservation.betting_pool_id,
                now,
            )? {
                Some(rule) => {
                    let key = UsageKey {
                        draw_id: reservation.draw_id,
                        draw_date: date,
                        bet_type: reservation.bet_type,
                        bet_number: &reservation.bet_number,
                    };
                    reservation_cap(&rule, &TicketStore::new(&conn), &key, reservation.betting_pool_id)?
                }
                None => None,
            }
        };

        Ok(match measured {
            Some((cap, current)) => {
                let used = current
                    + self.office.reservations().reserved_amount(
                        reservation.draw_id,
                        reservation.bet_type,
                        &reservation.bet_number,
                        None,
                    );
                ReleaseOutcome {
                    remaining: (cap - used).max(Money::ZERO),
                    max_limit: cap,
                    percent_used: percent_used(used, cap),
                }
            }
            None => ReleaseOutcome {
                remaining: UNLIMITED,
                max_limit: Money::ZERO,
                percent_used: 0.0,
            },
        })
    }

    /// Usage of every number sold on a draw, measured against the per-number
    /// cap of rules that are not scoped to a zone or pool.
    pub async fn limit_consumption(&self, draw_id: i64, date: Option<NaiveDate>) -> Result<Vec<LimitConsumption>> {
        let now = Utc::now();
        let date = date.unwrap_or_else(|| business_today(now, self.business_offset()));

        let conn = self.office.storage().get_connection().await;
        LotteryStore::new(&conn)
            .get_draw(draw_id)?
            .ok_or_else(|| CoreError::not_found("Draw", draw_id))?;
        let limits = LimitStore::new(&conn);
        let rules = limits.candidates_for_draw(draw_id)?;
        let automatic: AutomaticLimitConfig = limits.get_setting(AUTOMATIC_CONFIG_KEY)?.unwrap_or_default();
        let usage = TicketStore::new(&conn).draw_usage(draw_id, date)?;

        Ok(usage
            .into_iter()
            .map(|u| {
                let ctx = LimitContext {
                    draw_id,
                    bet_type: u.bet_type,
                    zone_id: 0,
                    betting_pool_id: 0,
                    bet_number: &u.bet_number,
                    now,
                };
                let cap = resolve_rule(&rules, &ctx)
                    .cloned()
                    .or_else(|| automatic_rule(&automatic, u.bet_type))
                    .and_then(|rule| rule.max_bet_per_number);
                LimitConsumption {
                    remaining: cap.map(|c| (c - u.amount).max(Money::ZERO)),
                    percent_used: cap.map_or(0.0, |c| percent_used(u.amount, c)),
                    is_near_limit: cap.map_or(false, |c| is_near_limit(u.amount, c)),
                    is_at_limit: cap.map_or(false, |c| is_at_limit(u.amount, c)),
                    cap,
                    used: u.amount,
                    line_count: u.line_count,
                    bet_type: u.bet_type,
                    bet_number: u.bet_number,
                }
            })
            .collect())
    }

    pub async fn get_automatic_limits(&self) -> Result<AutomaticLimitConfig> {
        let conn = self.office.storage().get_connection().await;
        Ok(LimitStore::new(&conn)
            .get_setting(AUTOMATIC_CONFIG_KEY)?
            .unwrap_or_default())
    }

    pub async fn save_automatic_limits(&self, config: AutomaticLimitConfig) -> Result<AutomaticLimitConfig> {
        fn check(v: &mut Validator, prefix: &str, controls: &AutomaticControls) {
            for (name, cap) in [
                ("directo", controls.directo),
                ("pale", controls.pale),
                ("tripleta", controls.tripleta),
            ] {
                v.check(
                    !cap.amount.is_negative(),
                    &format!("{}.{}.amount", prefix, name),
                    "must not be negative",
                );
            }
        }
        let mut v = Validator::new();
        check(&mut v, "general", &config.general);
        check(&mut v, "line", &config.line);
        v.finish()?;

        {
            let conn = self.office.storage().get_connection().await;
            LimitStore::new(&conn).put_setting(AUTOMATIC_CONFIG_KEY, &config, Utc::now())?;
        }
        tracing::info!("Saved automatic limit configuration");
        self.publish_limit_change(0, "automatic-updated");
        Ok(config)
    }

    pub async fn reset_automatic_limits(&self) -> Result<()> {
        {
            let conn = self.office.storage().get_connection().await;
            let limits = LimitStore::new(&conn);
            limits.delete_setting(AUTOMATIC_CONFIG_KEY)?;
            limits.delete_setting(RANDOM_BLOCK_CONFIG_KEY)?;
        }
        tracing::info!("Reset automatic limits to defaults");
        self.publish_limit_change(0, "automatic-reset");
        Ok(())
    }

    /// Block `pales_to_block` random pales on each draw with zero-cap rules.
    pub async fn execute_random_block(
        &self,
        request: RandomBlockRequest,
        claims: &Claims,
    ) -> Result<RandomBlockOutcome> {
        let mut draw_ids = request.draw_ids.clone();
        draw_ids.sort_unstable();
        draw_ids.dedup();

        let mut v = Validator::new();
        v.check(!draw_ids.is_empty(), "drawIds", "at least one draw is required")
            .check(
                request.pales_to_block > 0 && request.pales_to_block <= MAX_RANDOM_PALES,
                "palesToBlock",
                format!("must be between 1 and {}", MAX_RANDOM_PALES),
            );
        v.finish()?;

        let pales = random_pales(request.pales_to_block as usize);
        let now = Utc::now();

        let rules_created = {
            let mut conn = self.office.storage().get_connection().await;
            let tx = conn.transaction()?;
            let lotteries = LotteryStore::new(&tx);
            for draw_id in &draw_ids {
                lotteries
                    .get_draw(*draw_id)?
                    .ok_or_else(|| CoreError::not_found("Draw", *draw_id))?;
            }
            if let Some(pool_id) = request.betting_pool_id {
                PoolStore::new(&tx)
                    .get(pool_id)?
                    .ok_or_else(|| CoreError::not_found("Betting pool", pool_id))?;
            }

            let limits = LimitStore::new(&tx);
            let mut created = 0;
            for draw_id in &draw_ids {
                for pale in &pales {
                    limits.insert(&LimitRule {
                        id: 0,
                        name: format!("Random block {}", pale),
                        draw_id: Some(*draw_id),
                        bet_type: Some(BetType::Pale),
                        zone_id: None,
                        betting_pool_id: request.betting_pool_id,
                        bet_number_pattern: Some(pale.clone()),
                        max_bet_per_number: Some(Money::ZERO),
                        max_bet_per_ticket: None,
                        max_bet_per_betting_pool: None,
                        max_bet_global: None,
                        priority: None,
                        effective_from: None,
                        effective_to: None,
                        source: SOURCE_RANDOM_BLOCK.to_string(),
                        is_active: true,
                        created_at: now,
                        updated_at: now,
                    })?;
                    created += 1;
                }
            }
            limits.put_setting(
                RANDOM_BLOCK_CONFIG_KEY,
                &RandomBlockConfig {
                    draw_ids: draw_ids.clone(),
                    betting_pool_id: request.betting_pool_id,
                    pales_to_block: request.pales_to_block,
                },
                now,
            )?;
            tx.commit()?;
            created
        };

        tracing::info!(
            "User {} blocked {} random pales on draws {:?}",
            claims.user_id(),
            pales.len(),
            draw_ids
        );
        self.publish_limit_change(0, "random-block");

        Ok(RandomBlockOutcome {
            blocked_count: pales.len(),
            rules_created,
            blocked_pales: pales,
        })
    }
}
