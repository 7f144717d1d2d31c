use banca_core::{BetType, CoreError, Money};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    #[error("Empty play")]
    Empty,

    #[error("Unrecognized play notation: {0}")]
    InvalidFormat(String),

    #[error("Invalid range in {0}: start must not exceed end")]
    InvalidRange(String),

    #[error("Sequence ends must be doubles like 33 or 66: {0}")]
    NotDoubles(String),
}

/// Why a ticket line could not be sold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    ExceedsLimit,
    InvalidForLottery,
    DrawDisabled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedLine {
    pub line_number: u32,
    pub draw_id: i64,
    pub bet_type: BetType,
    pub bet_number: String,
    pub amount: Money,
    pub error_type: RejectReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<Money>,
}

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid play: {0}")]
    Play(#[from] PlayError),

    #[error("{message}")]
    BetsRejected {
        code: &'static str,
        message: String,
        lines: Vec<RejectedLine>,
    },
}

impl From<rusqlite::Error> for LotteryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Core(CoreError::from(err))
    }
}

impl From<serde_json::Error> for LotteryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Core(CoreError::from(err))
    }
}

impl LotteryError {
    pub const INVALID_BET_TYPES: &'static str = "ticket/invalid-bet-types";
    pub const BETS_EXCEED_LIMITS: &'static str = "ticket/invalid-bets-exceed-limits";

    pub(crate) fn rejected(lines: Vec<RejectedLine>) -> Self {
        let over_limit = lines
            .iter()
            .any(|l| l.error_type == RejectReason::ExceedsLimit);
        let (code, message) = if over_limit {
            (Self::BETS_EXCEED_LIMITS, "Some bets exceed the active limits")
        } else {
            (Self::INVALID_BET_TYPES, "Some bets are not valid for their draw")
        };
        Self::BetsRejected {
            code,
            message: format!("{} ({} lines)", message, lines.len()),
            lines,
        }
    }
}
