use banca_core::storage::TicketLine;
use banca_core::Money;
use chrono::NaiveTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePrice {
    pub subtotal: Money,
    pub total_with_multiplier: Money,
    pub commission_amount: Money,
    pub net_amount: Money,
}

pub fn price_line(bet: Money, multiplier: u32, commission_pct: f64) -> LinePrice {
    let total_with_multiplier = bet.times(multiplier as i64);
    let commission_amount = total_with_multiplier.percent(commission_pct);
    LinePrice {
        subtotal: bet,
        total_with_multiplier,
        commission_amount,
        net_amount: total_with_multiplier - commission_amount,
    }
}

/// `amount` off for every whole `per_every` of the bet total.
pub fn ticket_discount(total_bet: Money, amount: Money, per_every: Money) -> Money {
    if !amount.is_positive() || !per_every.is_positive() {
        return Money::ZERO;
    }
    amount.times(total_bet.whole_multiples_of(per_every))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketTotals {
    pub line_count: u32,
    pub total_bet: Money,
    pub total_with_multiplier: Money,
    pub total_commission: Money,
    pub total_discount: Money,
    pub total_net: Money,
    pub grand_total: Money,
    pub lottery_ids: Vec<i64>,
    pub earliest_draw_time: Option<NaiveTime>,
    pub latest_draw_time: Option<NaiveTime>,
}

impl TicketTotals {
    /// Sum priced lines. The discount never exceeds what the lines charge.
    pub fn from_lines(lines: &[TicketLine], draw_times: &[NaiveTime], discount: Money) -> Self {
        let mut totals = TicketTotals {
            line_count: lines.len() as u32,
            ..TicketTotals::default()
        };

        for line in lines {
            totals.total_bet += line.subtotal;
            totals.total_with_multiplier += line.total_with_multiplier;
            totals.total_commission += line.commission_amount;
            totals.total_net += line.net_amount;
            if !totals.lottery_ids.contains(&line.lottery_id) {
                totals.lottery_ids.push(line.lottery_id);
            }
        }
        totals.lottery_ids.sort_unstable();
        totals.earliest_draw_time = draw_times.iter().min().copied();
        totals.latest_draw_time = draw_times.iter().max().copied();

        let discount = discount.min(totals.total_with_multiplier).max(Money::ZERO);
        totals.total_discount = discount;
        totals.total_net -= discount;
        totals.grand_total = totals.total_with_multiplier - discount;
        totals
    }
}
