use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Currency amount in cents. Serialized as a decimal number of major units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Largest amount accepted for a single movement (999,999,999.99).
    pub const MAX_AMOUNT: Money = Money(99_999_999_999);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// Non-finite input maps to zero; out-of-range input saturates.
    pub fn from_major(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        Self((value * 100.0).round() as i64)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `pct` percent of this amount, rounded to the nearest cent.
    pub fn percent(self, pct: f64) -> Money {
        Money((self.0 as f64 * pct / 100.0).round() as i64)
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    pub fn times(self, factor: i64) -> Money {
        Money(self.0 * factor)
    }

    /// Whole number of times `divisor` fits in this amount.
    pub fn whole_multiples_of(self, divisor: Money) -> i64 {
        if divisor.0 <= 0 {
            0
        } else {
            self.0.div_euclid(divisor.0)
        }
    }

    /// Share of `cap` this amount represents, in percent.
    pub fn percent_of(self, cap: Money) -> f64 {
        if cap.0 <= 0 {
            100.0
        } else {
            (self.0 as f64 / cap.0 as f64 * 10_000.0).round() / 100.0
        }
    }
}

impl From<f64> for Money {
    fn from(value: f64) -> Self {
        Money::from_major(value)
    }
}

impl From<Money> for f64 {
    fn from(value: Money) -> Self {
        value.as_major()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// Defines a string-backed enum with `as_str`, `FromStr` and SQL/JSON names.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(CoreError::invalid(stringify!($name), format!("unknown value '{}'", s))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// How a betting pool's net result is clawed back.
    FallType {
        Off => "OFF",
        Collection => "COLLECTION",
        Daily => "DAILY",
        Weekly => "WEEKLY",
        Monthly => "MONTHLY",
    }
);

string_enum!(
    /// Whether tickets may be sold for future dates.
    FutureSalesMode {
        Off => "OFF",
        Week => "WEEK",
        Days => "DAYS",
    }
);

string_enum!(
    DiscountMode {
        Off => "OFF",
        Group => "GROUP",
        Pool => "POOL",
    }
);

string_enum!(
    TransactionKind {
        Debit => "DEBIT",
        Credit => "CREDIT",
    }
);

string_enum!(
    TicketStatus {
        Pending => "PENDING",
        Winner => "WINNER",
        Loser => "LOSER",
        Cancelled => "CANCELLED",
        Paid => "PAID",
    }
);

string_enum!(
    LineStatus {
        Pending => "PENDING",
        Winner => "WINNER",
        Loser => "LOSER",
        Cancelled => "CANCELLED",
        Paid => "PAID",
    }
);

impl Default for FallType {
    fn default() -> Self {
        FallType::Off
    }
}

impl Default for FutureSalesMode {
    fn default() -> Self {
        FutureSalesMode::Off
    }
}

impl Default for DiscountMode {
    fn default() -> Self {
        DiscountMode::Off
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn first_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Paging taken from optional query parameters.
    pub fn from_parts(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut v = crate::validation::Validator::new();
        v.check(self.page > 0, "page", "must be greater than 0").check(
            (1..=MAX_PAGE_SIZE).contains(&self.page_size),
            "pageSize",
            format!("must be between 1 and {}", MAX_PAGE_SIZE),
        );
        v.finish()
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: i64) -> Self {
        let size = request.page_size.max(1) as i64;
        let total_pages = ((total_count + size - 1) / size) as u32;
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_count,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_json_and_display() {
        let m = Money::from_cents(12_345);
        assert_eq!(serde_json::to_string(&m).unwrap(), "123.45");
        let back: Money = serde_json::from_str("0.1").unwrap();
        assert_eq!(back.cents(), 10);
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn test_money_percent_and_multiples() {
        let m = Money::from_units(250);
        assert_eq!(m.percent(12.5), Money::from_cents(3_125));
        assert_eq!(m.whole_multiples_of(Money::from_units(100)), 2);
        assert_eq!(m.whole_multiples_of(Money::ZERO), 0);
        assert_eq!(Money::from_units(80).percent_of(Money::from_units(100)), 80.0);
    }

    #[test]
    fn test_enum_names() {
        assert_eq!("daily".parse::<FallType>().unwrap(), FallType::Daily);
        assert!("yearly".parse::<FallType>().is_err());
        assert_eq!(
            serde_json::to_string(&TicketStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
    }

    #[test]
    fn test_paging() {
        let req = PageRequest::new(3, 10);
        assert_eq!(req.offset(), 20);
        let page = Page::new(vec![1, 2], req, 21);
        assert_eq!(page.total_pages, 3);
        assert!(PageRequest::new(0, 10).validate().is_err());
        assert!(PageRequest::new(1, 101).validate().is_err());
    }
}
