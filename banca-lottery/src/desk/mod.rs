//! The ticket desk: sales, cancellation, payment, limit administration and
//! result grading on top of a [`Backoffice`].

mod create;
mod lifecycle;
mod limits;
mod results;

pub use create::{CreateTicket, NewTicketLine, MAX_LINES};
pub use lifecycle::{CancelTicket, PayTicket, TicketFilter, TicketPage, PAYMENT_METHODS};
pub use limits::{
    LimitConsumption, LimitQuery, LimitRuleRequest, RandomBlockOutcome, RandomBlockRequest,
    ReleaseOutcome, ReserveLimit, ReserveOutcome, MAX_RANDOM_PALES,
};
pub use results::{PublishOutcome, PublishResult, ResultQuery};

use crate::error::Result;
use crate::prizes::{evaluate_line, payout_for, prize_amount};
use banca_core::notify::{Audience, Event, TicketNotice};
use banca_core::storage::{DrawResult, PoolStore, Ticket, TicketStore};
use banca_core::types::TicketStatus;
use banca_core::{Backoffice, Claims, CoreError};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::Arc;

pub struct TicketDesk {
    office: Arc<Backoffice>,
}

impl TicketDesk {
    pub fn new(office: Arc<Backoffice>) -> Self {
        Self { office }
    }

    pub fn backoffice(&self) -> &Arc<Backoffice> {
        &self.office
    }

    fn business_offset(&self) -> i32 {
        self.office.config().business_utc_offset_minutes
    }

    fn publish_ticket(
        &self,
        event: fn(TicketNotice) -> Event,
        ticket: &Ticket,
        zone_id: Option<i64>,
        reason: Option<String>,
    ) {
        let mut audiences = vec![
            Audience::Global,
            Audience::BettingPool(ticket.betting_pool_id),
            Audience::User(ticket.user_id),
        ];
        if let Some(zone_id) = zone_id {
            audiences.push(Audience::Zone(zone_id));
        }
        let amount = match ticket.status {
            TicketStatus::Winner | TicketStatus::Paid => ticket.total_prize,
            _ => ticket.grand_total,
        };
        self.office.notifier().publish(
            audiences,
            event(TicketNotice {
                ticket_id: ticket.id,
                ticket_code: ticket.code.clone(),
                betting_pool_id: ticket.betting_pool_id,
                amount,
                reason,
            }),
        );
    }
}

/// Users bound to a betting pool can only act on tickets and limits of that
/// pool; admins and unbound users are not restricted.
pub(crate) fn ensure_pool_access(claims: &Claims, pool_id: i64, action: &str) -> Result<()> {
    match (claims.admin, claims.pool) {
        (false, Some(bound)) if bound != pool_id => Err(CoreError::forbidden(format!(
            "users can only {} for their own betting pool",
            action
        ))
        .into()),
        _ => Ok(()),
    }
}

/// Grade every pending line of the result's draw and date, then refresh the
/// affected tickets. Returns the number of graded lines and the tickets that
/// became winners.
pub(crate) fn grade_pending(conn: &Connection, result: &DrawResult) -> Result<(usize, Vec<Ticket>)> {
    let tickets = TicketStore::new(conn);
    let pools = PoolStore::new(conn);

    let lines = tickets.pending_lines(result.draw_id, result.result_date)?;
    let mut pool_of: HashMap<i64, i64> = HashMap::new();
    for line in &lines {
        let pool_id = match pool_of.get(&line.ticket_id) {
            Some(id) => *id,
            None => {
                let ticket = tickets
                    .get(line.ticket_id)?
                    .ok_or_else(|| CoreError::not_found("Ticket", line.ticket_id))?;
                pool_of.insert(ticket.id, ticket.betting_pool_id);
                ticket.betting_pool_id
            }
        };

        let position = evaluate_line(line.bet_type, &line.bet_number, result);
        let prize = match position {
            Some(position) => {
                let configured =
                    pools.effective_prize(pool_id, line.draw_id, line.lottery_id, line.bet_type)?;
                prize_amount(line, payout_for(configured.as_ref(), line.bet_type, position))
            }
            None => banca_core::Money::ZERO,
        };
        tickets.grade_line(line.id, position, prize)?;
    }

    let mut winners = Vec::new();
    let mut ticket_ids: Vec<i64> = pool_of.into_keys().collect();
    ticket_ids.sort_unstable();
    for ticket_id in ticket_ids {
        if tickets.refresh_outcome(ticket_id)? == TicketStatus::Winner {
            if let Some(ticket) = tickets.get(ticket_id)? {
                winners.push(ticket);
            }
        }
    }
    Ok((lines.len(), winners))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use banca_core::backoffice::{CreateDraw, CreateLottery, CreatePool, CreateUser, CreateZone};
    use banca_core::storage::{BettingPool, Draw, WeeklySchedule};
    use banca_core::{BetType, Claims, ServiceConfig, Storage};
    use chrono::NaiveTime;

    pub struct Fixture {
        pub desk: TicketDesk,
        pub pool: BettingPool,
        pub draw: Draw,
        pub seller: Claims,
        pub admin: Claims,
    }

    pub fn claims_for(user_id: i64, pool: Option<i64>, admin: bool, perms: &[&str]) -> Claims {
        Claims {
            sub: user_id,
            name: format!("user{}", user_id),
            pool,
            admin,
            perms: perms.iter().map(|p| p.to_string()).collect(),
            iss: "banca-api".to_string(),
            aud: "banca-clients".to_string(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    /// A pool with one draw open all day, every day, and a seller bound to it.
    pub async fn fixture() -> Fixture {
        let mut config = ServiceConfig::default();
        config.jwt.secret = "unit-test-secret-0123456789abcdef".to_string();
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let office = Arc::new(Backoffice::with_storage(config, storage));

        let zone = office
            .create_zone(CreateZone {
                name: "Capital".to_string(),
            })
            .await
            .unwrap();
        let pool = office
            .create_pool(CreatePool {
                code: None,
                name: "Banca Central".to_string(),
                zone_id: zone.id,
                address: None,
                phone: None,
                config: None,
            })
            .await
            .unwrap();
        let lottery = office
            .create_lottery(CreateLottery {
                name: "Nacional".to_string(),
                code: "LN".to_string(),
                utc_offset_minutes: Some(-240),
            })
            .await
            .unwrap();
        let all_day = (0..7)
            .map(|day| WeeklySchedule {
                day_of_week: day,
                start_time: NaiveTime::MIN,
                end_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
                is_active: true,
            })
            .collect();
        let draw = office
            .create_draw(CreateDraw {
                lottery_id: lottery.id,
                name: "Nacional Noche".to_string(),
                abbreviation: "LN".to_string(),
                draw_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
                bet_types: BetType::ALL.to_vec(),
                schedules: all_day,
            })
            .await
            .unwrap();
        let seller = office
            .create_user(CreateUser {
                username: "vendedor".to_string(),
                password: "secret123".to_string(),
                full_name: "Vendedor Uno".to_string(),
                email: None,
                betting_pool_id: Some(pool.id),
                is_admin: false,
                permissions: vec![],
            })
            .await
            .unwrap();
        let admin = office
            .create_user(CreateUser {
                username: "admin".to_string(),
                password: "secret123".to_string(),
                full_name: "Admin".to_string(),
                email: None,
                betting_pool_id: None,
                is_admin: true,
                permissions: vec![],
            })
            .await
            .unwrap();

        let seller = claims_for(seller.id, Some(pool.id), false, &[]);
        Fixture {
            desk: TicketDesk::new(office),
            pool,
            draw,
            seller,
            admin: claims_for(admin.id, None, true, &[]),
        }
    }
}
