//! Limit rule resolution and evaluation.
//!
//! Several rules can cover the same play. The most specific one wins: an
//! exact number beats a `#` mask, which beats a rule for any number. Ties go
//! to draw-specific rules, then to the higher priority. When no explicit
//! rule applies, the automatic limit configuration may supply one.

use banca_core::storage::LimitRule;
use banca_core::{BetType, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SOURCE_AUTOMATIC: &str = "AUTOMATIC";
pub const AUTOMATIC_CONFIG_KEY: &str = "limits.automatic";
pub const RANDOM_BLOCK_CONFIG_KEY: &str = "limits.random_block";

pub const NEAR_LIMIT_PERCENT: f64 = 80.0;
pub const AT_LIMIT_PERCENT: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct LimitContext<'a> {
    pub draw_id: i64,
    pub bet_type: BetType,
    pub zone_id: i64,
    pub betting_pool_id: i64,
    pub bet_number: &'a str,
    pub now: DateTime<Utc>,
}

/// How closely a pattern matches a number, or `None` when it does not.
fn pattern_specificity(pattern: Option<&str>, number: &str) -> Option<u8> {
    let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) else {
        return Some(1);
    };
    if pattern == number {
        return Some(3);
    }
    if pattern.len() == number.len()
        && pattern.contains('#')
        && pattern
            .chars()
            .zip(number.chars())
            .all(|(p, n)| p == '#' || p == n)
    {
        return Some(2);
    }
    None
}

fn applies(rule: &LimitRule, ctx: &LimitContext<'_>) -> bool {
    rule.is_active
        && rule.effective_from.map_or(true, |from| from <= ctx.now)
        && rule.effective_to.map_or(true, |to| ctx.now <= to)
        && rule.draw_id.map_or(true, |id| id == ctx.draw_id)
        && rule.bet_type.map_or(true, |bt| bt == ctx.bet_type)
        && rule.zone_id.map_or(true, |id| id == ctx.zone_id)
        && rule.betting_pool_id.map_or(true, |id| id == ctx.betting_pool_id)
}

pub fn resolve_rule<'r>(rules: &'r [LimitRule], ctx: &LimitContext<'_>) -> Option<&'r LimitRule> {
    rules
        .iter()
        .filter(|rule| applies(rule, ctx))
        .filter_map(|rule| {
            pattern_specificity(rule.bet_number_pattern.as_deref(), ctx.bet_number)
                .map(|specificity| (specificity, rule))
        })
        .max_by_key(|(specificity, rule)| {
            (
                *specificity,
                rule.draw_id.is_some(),
                rule.priority.unwrap_or(0),
                // Newer rules win remaining ties
                rule.id,
            )
        })
        .map(|(_, rule)| rule)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomaticCap {
    pub enabled: bool,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomaticControls {
    pub directo: AutomaticCap,
    pub pale: AutomaticCap,
    pub tripleta: AutomaticCap,
}

impl AutomaticControls {
    fn cap_for(&self, bet_type: BetType) -> Option<Money> {
        let cap = match bet_type {
            BetType::Directo => self.directo,
            BetType::Pale => self.pale,
            BetType::Tripleta => self.tripleta,
            _ => return None,
        };
        cap.enabled.then_some(cap.amount)
    }
}

/// Limits applied when no explicit rule covers a play. `general` caps each
/// number across all pools; `line` caps each number within one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomaticLimitConfig {
    pub general: AutomaticControls,
    pub line: AutomaticControls,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RandomBlockConfig {
    pub draw_ids: Vec<i64>,
    pub betting_pool_id: Option<i64>,
    pub pales_to_block: u32,
}

pub fn automatic_rule(config: &AutomaticLimitConfig, bet_type: BetType) -> Option<LimitRule> {
    let per_number = config.general.cap_for(bet_type);
    let per_pool = config.line.cap_for(bet_type);
    if per_number.is_none() && per_pool.is_none() {
        return None;
    }

    let now = Utc::now();
    Some(LimitRule {
        id: 0,
        name: format!("Automatic {}", bet_type.display_name()),
        draw_id: None,
        bet_type: Some(bet_type),
        zone_id: None,
        betting_pool_id: None,
        bet_number_pattern: None,
        max_bet_per_number: per_number,
        max_bet_per_ticket: None,
        max_bet_per_betting_pool: per_pool,
        max_bet_global: None,
        priority: None,
        effective_from: None,
        effective_to: None,
        source: SOURCE_AUTOMATIC.to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

/// Amounts already committed against the caps of one play.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LimitUsage {
    /// Earlier lines of the same ticket on this number.
    pub ticket: Money,
    /// This pool's sales on the number.
    pub pool: Money,
    /// Every pool's sales on the number.
    pub number: Money,
    /// Every pool's sales of the bet type in the draw.
    pub global: Money,
    /// Open reservations held by other pools on the number.
    pub reserved: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapKind {
    PerTicket,
    PerBettingPool,
    PerNumber,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub allowed: bool,
    /// The cap with the least room left, if any.
    pub cap: Option<Money>,
    pub used: Money,
    pub remaining: Option<Money>,
    pub binding: Option<CapKind>,
}

impl LimitCheck {
    pub fn unlimited(used: Money) -> Self {
        Self {
            allowed: true,
            cap: None,
            used,
            remaining: None,
            binding: None,
        }
    }

    pub fn percent_used(&self) -> f64 {
        match self.cap {
            Some(cap) => self.used.percent_of(cap),
            None => 0.0,
        }
    }
}

/// Check `amount` against every cap the rule sets. A cap of zero blocks.
pub fn evaluate(rule: &LimitRule, usage: &LimitUsage, amount: Money) -> LimitCheck {
    let caps = [
        (CapKind::PerTicket, rule.max_bet_per_ticket, usage.ticket),
        (CapKind::PerBettingPool, rule.max_bet_per_betting_pool, usage.pool),
        (CapKind::PerNumber, rule.max_bet_per_number, usage.number + usage.reserved),
        (CapKind::Global, rule.max_bet_global, usage.global),
    ];

    let mut check = LimitCheck::unlimited(usage.number);
    for (kind, cap, used) in caps {
        let Some(cap) = cap else { continue };
        let remaining = (cap - used).max(Money::ZERO);
        if check.remaining.map_or(true, |r| remaining < r) {
            check.cap = Some(cap);
            check.used = used;
            check.remaining = Some(remaining);
            check.binding = Some(kind);
        }
        if !cap.is_positive() || used + amount > cap {
            check.allowed = false;
        }
    }
    check
}

pub fn percent_used(used: Money, cap: Money) -> f64 {
    used.percent_of(cap)
}

pub fn is_near_limit(used: Money, cap: Money) -> bool {
    percent_used(used, cap) >= NEAR_LIMIT_PERCENT
}

pub fn is_at_limit(used: Money, cap: Money) -> bool {
    percent_used(used, cap) >= AT_LIMIT_PERCENT
}
