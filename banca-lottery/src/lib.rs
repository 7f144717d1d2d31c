//! Lottery rules for Banca: play notation, draw schedules, pricing, limits
//! and prizes, plus the [`TicketDesk`] that sells, grades and pays tickets.

pub mod desk;
pub mod error;
pub mod limits;
pub mod plays;
pub mod pricing;
pub mod prizes;
pub mod schedule;

pub use desk::TicketDesk;
pub use error::{LotteryError, PlayError, RejectReason, RejectedLine, Result};
pub use limits::{AutomaticLimitConfig, LimitCheck, RandomBlockConfig};
pub use plays::{parse_play, ParsedPlay};
pub use prizes::evaluate_line;

/// Expand every play typed at a terminal, keeping their order.
pub fn expand_plays<'a, I>(plays: I) -> std::result::Result<Vec<ParsedPlay>, PlayError>
where
    I: IntoIterator<Item = &'a str>,
{
    plays.into_iter().map(parse_play).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use banca_core::BetType;

    #[test]
    fn test_expand_plays() {
        let parsed = expand_plays(["12", "123"]).unwrap();
        assert_eq!(parsed[0].bet_type, BetType::Directo);
        assert_eq!(parsed[1].bet_type, BetType::Cash3Straight);

        assert!(expand_plays(["12", ""]).is_err());
    }
}
