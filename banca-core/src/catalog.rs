//! Static catalogs: the bet types a draw can offer and the permission codes
//! a user can hold.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetType {
    Directo,
    Pale,
    Tripleta,
    Cash3Straight,
    Cash3Box,
    Cash3FrontStraight,
    Cash3FrontBox,
    Cash3BackStraight,
    Cash3BackBox,
    Play4Straight,
    Play4Box,
    Pick5Straight,
    Pick5Box,
}

impl BetType {
    pub const ALL: [BetType; 13] = [
        BetType::Directo,
        BetType::Pale,
        BetType::Tripleta,
        BetType::Cash3Straight,
        BetType::Cash3Box,
        BetType::Cash3FrontStraight,
        BetType::Cash3FrontBox,
        BetType::Cash3BackStraight,
        BetType::Cash3BackBox,
        BetType::Play4Straight,
        BetType::Play4Box,
        BetType::Pick5Straight,
        BetType::Pick5Box,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            BetType::Directo => "DIRECTO",
            BetType::Pale => "PALE",
            BetType::Tripleta => "TRIPLETA",
            BetType::Cash3Straight => "CASH3_STRAIGHT",
            BetType::Cash3Box => "CASH3_BOX",
            BetType::Cash3FrontStraight => "CASH3_FRONT_STRAIGHT",
            BetType::Cash3FrontBox => "CASH3_FRONT_BOX",
            BetType::Cash3BackStraight => "CASH3_BACK_STRAIGHT",
            BetType::Cash3BackBox => "CASH3_BACK_BOX",
            BetType::Play4Straight => "PLAY4_STRAIGHT",
            BetType::Play4Box => "PLAY4_BOX",
            BetType::Pick5Straight => "PICK5_STRAIGHT",
            BetType::Pick5Box => "PICK5_BOX",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BetType::Directo => "Directo",
            BetType::Pale => "Palé",
            BetType::Tripleta => "Tripleta",
            BetType::Cash3Straight => "Cash 3 Straight",
            BetType::Cash3Box => "Cash 3 Box",
            BetType::Cash3FrontStraight => "Cash 3 Front Straight",
            BetType::Cash3FrontBox => "Cash 3 Front Box",
            BetType::Cash3BackStraight => "Cash 3 Back Straight",
            BetType::Cash3BackBox => "Cash 3 Back Box",
            BetType::Play4Straight => "Play 4 Straight",
            BetType::Play4Box => "Play 4 Box",
            BetType::Pick5Straight => "Pick 5 Straight",
            BetType::Pick5Box => "Pick 5 Box",
        }
    }

    /// Number of digits a bet number of this type carries.
    pub fn digits(&self) -> usize {
        match self {
            BetType::Directo => 2,
            BetType::Pale | BetType::Play4Straight | BetType::Play4Box => 4,
            BetType::Tripleta => 6,
            BetType::Pick5Straight | BetType::Pick5Box => 5,
            _ => 3,
        }
    }

    /// Amount paid per unit bet for winning positions 1, 2 and 3.
    pub fn default_payouts(&self) -> [i64; 3] {
        match self {
            BetType::Directo => [60, 8, 4],
            BetType::Pale => [1000, 1000, 100],
            BetType::Tripleta => [20000, 100, 0],
            BetType::Cash3Straight => [700, 0, 0],
            // 3-way box, 6-way box
            BetType::Cash3Box => [232, 116, 0],
            BetType::Cash3FrontStraight | BetType::Cash3BackStraight => [60, 0, 0],
            BetType::Cash3FrontBox | BetType::Cash3BackBox => [60, 30, 0],
            BetType::Play4Straight => [5000, 0, 0],
            BetType::Play4Box => [200, 0, 0],
            BetType::Pick5Straight => [30000, 0, 0],
            BetType::Pick5Box => [250, 0, 0],
        }
    }

    pub fn is_box(&self) -> bool {
        matches!(
            self,
            BetType::Cash3Box
                | BetType::Cash3FrontBox
                | BetType::Cash3BackBox
                | BetType::Play4Box
                | BetType::Pick5Box
        )
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BetType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        BetType::ALL
            .iter()
            .copied()
            .find(|bt| bt.code() == wanted)
            .ok_or_else(|| CoreError::invalid("betType", format!("unknown bet type '{}'", s)))
    }
}

pub mod permissions {
    pub const TICKET_CREATE: &str = "TICKET_CREATE";
    pub const TICKET_CANCEL: &str = "TICKET_CANCEL";
    pub const TICKET_PAY: &str = "TICKET_PAY";
    pub const TICKET_PREVIOUS_DAY_SALE: &str = "TICKET_PREVIOUS_DAY_SALE";
    pub const SELL_OUT_OF_HOURS: &str = "SELL_OUT_OF_HOURS";
    pub const MANAGE_USERS: &str = "MANAGE_USERS";
    pub const MANAGE_ZONES: &str = "MANAGE_ZONES";
    pub const MANAGE_BETTING_POOLS: &str = "MANAGE_BETTING_POOLS";
    pub const MANAGE_LOTTERIES: &str = "MANAGE_LOTTERIES";
    pub const MANAGE_LIMITS: &str = "MANAGE_LIMITS";
    pub const MANAGE_RESULTS: &str = "MANAGE_RESULTS";
    pub const MANAGE_TRANSACTIONS: &str = "MANAGE_TRANSACTIONS";
    pub const VIEW_REPORTS: &str = "VIEW_REPORTS";
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub code: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

pub const PERMISSIONS: &[Permission] = &[
    Permission { code: permissions::TICKET_CREATE, name: "Sell tickets", category: "Tickets" },
    Permission { code: permissions::TICKET_CANCEL, name: "Cancel tickets", category: "Tickets" },
    Permission { code: permissions::TICKET_PAY, name: "Pay winning tickets", category: "Tickets" },
    Permission {
        code: permissions::TICKET_PREVIOUS_DAY_SALE,
        name: "Sell tickets dated yesterday",
        category: "Tickets",
    },
    Permission {
        code: permissions::SELL_OUT_OF_HOURS,
        name: "Sell after draw closing",
        category: "Tickets",
    },
    Permission { code: permissions::MANAGE_USERS, name: "Manage users", category: "Administration" },
    Permission { code: permissions::MANAGE_ZONES, name: "Manage zones", category: "Administration" },
    Permission {
        code: permissions::MANAGE_BETTING_POOLS,
        name: "Manage betting pools",
        category: "Administration",
    },
    Permission {
        code: permissions::MANAGE_LOTTERIES,
        name: "Manage lotteries and draws",
        category: "Administration",
    },
    Permission { code: permissions::MANAGE_LIMITS, name: "Manage limits", category: "Limits" },
    Permission { code: permissions::MANAGE_RESULTS, name: "Publish results", category: "Results" },
    Permission {
        code: permissions::MANAGE_TRANSACTIONS,
        name: "Record balance transactions",
        category: "Accounting",
    },
    Permission { code: permissions::VIEW_REPORTS, name: "View sales reports", category: "Reports" },
];

pub fn is_known_permission(code: &str) -> bool {
    PERMISSIONS.iter().any(|p| p.code == code)
}
