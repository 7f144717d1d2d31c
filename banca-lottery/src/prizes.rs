//! Grading of ticket lines against a published draw result.

use banca_core::storage::{DrawResult, PoolPrize, TicketLine};
use banca_core::{BetType, Money};

fn sorted_digits(s: &str) -> Vec<char> {
    let mut digits: Vec<char> = s.chars().collect();
    digits.sort_unstable();
    digits
}

fn has_repeated_digit(s: &str) -> bool {
    let digits = sorted_digits(s);
    digits.windows(2).any(|w| w[0] == w[1])
}

fn split_pairs(number: &str) -> Vec<&str> {
    (0..number.len() / 2).map(|i| &number[i * 2..i * 2 + 2]).collect()
}

fn straight_or_box(number: &str, drawn: &str, boxed: bool) -> Option<u8> {
    if number.len() != drawn.len() {
        return None;
    }
    if !boxed {
        return (number == drawn).then_some(1);
    }
    if sorted_digits(number) != sorted_digits(drawn) {
        return None;
    }
    Some(if has_repeated_digit(number) { 1 } else { 2 })
}

fn first_two(s: &str) -> Option<&str> {
    s.get(..2)
}

fn last_two(s: &str) -> Option<&str> {
    s.len().checked_sub(2).and_then(|start| s.get(start..))
}

/// Winning position of a bet number, or `None` when it does not win.
///
/// Quiniela numbers (directo, pale, tripleta) play against the three drawn
/// pairs; the pick games play against their own drawn numbers.
pub fn evaluate_line(bet_type: BetType, number: &str, result: &DrawResult) -> Option<u8> {
    let drawn: Vec<&str> = result.numbers.iter().map(String::as_str).collect();

    match bet_type {
        BetType::Directo => drawn
            .iter()
            .take(3)
            .position(|n| *n == number)
            .map(|idx| idx as u8 + 1),

        BetType::Pale => {
            let parts = split_pairs(number);
            let [a, b] = parts.as_slice() else { return None };
            let pairs = [(0, 1, 1), (0, 2, 2), (1, 2, 3)];
            pairs.iter().find_map(|&(x, y, pos)| {
                let (x, y) = (drawn.get(x)?, drawn.get(y)?);
                let hit = (a == x && b == y) || (a == y && b == x);
                hit.then_some(pos)
            })
        }

        BetType::Tripleta => {
            let mut remaining: Vec<&str> = drawn.iter().take(3).copied().collect();
            let mut hits = 0;
            for part in split_pairs(number) {
                if let Some(idx) = remaining.iter().position(|n| *n == part) {
                    remaining.swap_remove(idx);
                    hits += 1;
                }
            }
            match hits {
                3 => Some(1),
                2 => Some(2),
                _ => None,
            }
        }

        BetType::Cash3Straight | BetType::Cash3Box => {
            let drawn = result.cash3.as_deref()?;
            straight_or_box(number, drawn, bet_type.is_box())
        }

        BetType::Cash3FrontStraight | BetType::Cash3FrontBox => {
            let drawn = result.cash3.as_deref().and_then(first_two)?;
            straight_or_box(first_two(number)?, drawn, bet_type.is_box())
        }

        BetType::Cash3BackStraight | BetType::Cash3BackBox => {
            let drawn = result.cash3.as_deref().and_then(last_two)?;
            straight_or_box(last_two(number)?, drawn, bet_type.is_box())
        }

        BetType::Play4Straight | BetType::Play4Box => {
            let drawn = result.play4.as_deref()?;
            straight_or_box(number, drawn, bet_type.is_box()).map(|_| 1)
        }

        BetType::Pick5Straight | BetType::Pick5Box => {
            let drawn = result.pick5.as_deref()?;
            straight_or_box(number, drawn, bet_type.is_box()).map(|_| 1)
        }
    }
}

/// Units paid per unit bet at `position`. The pool's configured payouts win
/// over the bet type defaults.
pub fn payout_for(prize: Option<&PoolPrize>, bet_type: BetType, position: u8) -> i64 {
    let idx = usize::from(position.saturating_sub(1));
    let configured = prize
        .filter(|p| p.is_active)
        .and_then(|p| p.payouts.as_ref())
        .and_then(|payouts| payouts.get(idx).copied());
    configured.unwrap_or_else(|| bet_type.default_payouts().get(idx).copied().unwrap_or(0))
}

pub fn prize_amount(line: &TicketLine, payout: i64) -> Money {
    line.bet_amount.times(line.multiplier as i64).times(payout)
}
