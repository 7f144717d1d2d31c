//! Draw closing times and ticket date rules.

use crate::error::Result;
use banca_core::clock::{day_of_week, local_date, local_datetime};
use banca_core::storage::Draw;
use banca_core::types::FutureSalesMode;
use banca_core::CoreError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

/// Future-sales horizon used by `DAYS` mode when the pool has none set.
pub const DEFAULT_MAX_FUTURE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawWindow {
    Open { closing: NaiveTime },
    Closed { closing: NaiveTime },
    /// No active schedule for the local weekday. Sales stay open.
    NotScheduled,
}

impl DrawWindow {
    pub fn is_open(&self) -> bool {
        !matches!(self, DrawWindow::Closed { .. })
    }
}

pub fn business_today(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDate {
    local_date(now, offset_minutes)
}

/// End of sales for `draw` on `weekday`, pulled forward by the pool's
/// anticipated closing minutes.
pub fn closing_time(draw: &Draw, weekday: u8, anticipated_minutes: Option<i64>) -> Option<NaiveTime> {
    let schedule = draw.schedule_for(weekday)?;
    let minutes = anticipated_minutes.unwrap_or(0).max(0);
    let (closing, wrapped) = schedule
        .end_time
        .overflowing_sub_signed(Duration::minutes(minutes));
    if wrapped != 0 {
        Some(NaiveTime::MIN)
    } else {
        Some(closing)
    }
}

/// Whether `draw` still sells at `now`, on the lottery's local clock.
pub fn check_open(
    draw: &Draw,
    lottery_offset_minutes: i32,
    anticipated_minutes: Option<i64>,
    now: DateTime<Utc>,
) -> DrawWindow {
    let local = local_datetime(now, lottery_offset_minutes);
    let weekday = day_of_week(local.date());
    match closing_time(draw, weekday, anticipated_minutes) {
        None => DrawWindow::NotScheduled,
        Some(closing) if local.time() >= closing => DrawWindow::Closed { closing },
        Some(closing) => DrawWindow::Open { closing },
    }
}

/// Inputs for [`validate_ticket_date`].
#[derive(Debug, Clone, Copy)]
pub struct DateRules {
    pub allow_past: bool,
    pub has_past_permission: bool,
    pub future_mode: FutureSalesMode,
    pub max_future_days: Option<i64>,
}

pub fn validate_ticket_date(today: NaiveDate, requested: NaiveDate, rules: DateRules) -> Result<()> {
    if requested < today {
        let yesterday = today - Duration::days(1);
        if !rules.allow_past || requested < yesterday {
            return Err(CoreError::invalid("ticketDate", "tickets cannot be sold for past dates").into());
        }
        if !rules.has_past_permission {
            return Err(CoreError::forbidden("previous-day sales require TICKET_PREVIOUS_DAY_SALE").into());
        }
        return Ok(());
    }

    if requested > today {
        let horizon = match rules.future_mode {
            FutureSalesMode::Off => {
                return Err(CoreError::invalid(
                    "ticketDate",
                    "this betting pool does not allow future sales",
                )
                .into())
            }
            FutureSalesMode::Week => {
                let until_sunday = (7 - today.weekday().num_days_from_sunday() as i64) % 7;
                if until_sunday == 0 {
                    7
                } else {
                    until_sunday
                }
            }
            FutureSalesMode::Days => rules.max_future_days.unwrap_or(DEFAULT_MAX_FUTURE_DAYS),
        };
        if requested > today + Duration::days(horizon) {
            return Err(CoreError::invalid(
                "ticketDate",
                format!("tickets can be sold at most until {}", today + Duration::days(horizon)),
            )
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LotteryError;
    use banca_core::storage::WeeklySchedule;
    use banca_core::BetType;
    use chrono::TimeZone;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn draw_closing_at(day: u8, end: NaiveTime) -> Draw {
        Draw {
            id: 1,
            lottery_id: 1,
            name: "Nacional Noche".to_string(),
            abbreviation: "LN".to_string(),
            draw_time: time(21, 0),
            bet_types: vec![BetType::Directo],
            schedules: vec![WeeklySchedule {
                day_of_week: day,
                start_time: time(6, 0),
                end_time: end,
                is_active: true,
            }],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_open_uses_lottery_clock() {
        // Wednesday 2024-05-01 at 20:50 local (UTC-4)
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 50, 0).unwrap();
        let draw = draw_closing_at(3, time(20, 55));

        assert_eq!(
            check_open(&draw, -240, None, now),
            DrawWindow::Open { closing: time(20, 55) }
        );
        assert_eq!(
            check_open(&draw, -240, Some(10), now),
            DrawWindow::Closed { closing: time(20, 45) }
        );
        // In UTC it is already Thursday, which has no schedule
        assert_eq!(check_open(&draw, 0, None, now), DrawWindow::NotScheduled);
        assert!(DrawWindow::NotScheduled.is_open());
    }

    #[test]
    fn test_closing_time_does_not_wrap() {
        let draw = draw_closing_at(0, time(0, 5));
        assert_eq!(closing_time(&draw, 0, Some(30)), Some(NaiveTime::MIN));
        assert_eq!(closing_time(&draw, 1, None), None);
    }

    fn rules(mode: FutureSalesMode) -> DateRules {
        DateRules {
            allow_past: false,
            has_past_permission: false,
            future_mode: mode,
            max_future_days: None,
        }
    }

    #[test]
    fn test_past_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let yesterday = today - Duration::days(1);

        assert!(validate_ticket_date(today, today, rules(FutureSalesMode::Off)).is_ok());
        assert!(matches!(
            validate_ticket_date(today, yesterday, rules(FutureSalesMode::Off)),
            Err(LotteryError::Core(CoreError::Validation(_)))
        ));

        let mut allowed = rules(FutureSalesMode::Off);
        allowed.allow_past = true;
        assert!(matches!(
            validate_ticket_date(today, yesterday, allowed),
            Err(LotteryError::Core(CoreError::Forbidden(_)))
        ));
        allowed.has_past_permission = true;
        assert!(validate_ticket_date(today, yesterday, allowed).is_ok());
        assert!(validate_ticket_date(today, yesterday - Duration::days(1), allowed).is_err());
    }

    #[test]
    fn test_future_modes() {
        // 2024-05-01 is a Wednesday, so WEEK reaches Sunday 2024-05-05
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 5, 5).unwrap();

        assert!(validate_ticket_date(today, sunday, rules(FutureSalesMode::Off)).is_err());
        assert!(validate_ticket_date(today, sunday, rules(FutureSalesMode::Week)).is_ok());
        assert!(validate_ticket_date(today, sunday + Duration::days(1), rules(FutureSalesMode::Week)).is_err());

        // On Sunday the window is a full week
        assert!(validate_ticket_date(sunday, sunday + Duration::days(7), rules(FutureSalesMode::Week)).is_ok());

        let mut days = rules(FutureSalesMode::Days);
        days.max_future_days = Some(2);
        assert!(validate_ticket_date(today, today + Duration::days(2), days).is_ok());
        assert!(validate_ticket_date(today, today + Duration::days(3), days).is_err());
    }
}
