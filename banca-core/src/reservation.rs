use crate::catalog::BetType;
use crate::types::Money;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: Uuid,
    pub draw_id: i64,
    pub bet_type: BetType,
    pub bet_number: String,
    pub betting_pool_id: i64,
    pub amount: Money,
    pub created_at: Instant,
}

/// Result of [`LimitReservations::reserve_within`]. `reserved` is the live
/// amount other holds had on the number before this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Held { id: Uuid, reserved: Money },
    Blocked { reserved: Money },
}

/// Short-lived holds on limit capacity taken while a ticket is being typed
/// at a sales terminal. Holds expire on their own if the sale never happens.
pub struct LimitReservations {
    entries: Mutex<HashMap<Uuid, Reservation>>,
    ttl: Duration,
}

impl LimitReservations {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn reserve(
        &self,
        draw_id: i64,
        bet_type: BetType,
        bet_number: &str,
        betting_pool_id: i64,
        amount: Money,
    ) -> Uuid {
        let reservation = Reservation {
            id: Uuid::new_v4(),
            draw_id,
            bet_type,
            bet_number: bet_number.to_string(),
            betting_pool_id,
            amount,
            created_at: Instant::now(),
        };
        let id = reservation.id;
        self.entries.lock().insert(id, reservation);

        tracing::debug!(
            "Reserved {} on draw {} number {} for pool {}",
            amount,
            draw_id,
            bet_number,
            betting_pool_id
        );
        id
    }

    /// Place a hold only if the live holds on the number plus `amount` stay
    /// below `headroom`. Measuring and inserting happen under one lock.
    pub fn reserve_within(
        &self,
        draw_id: i64,
        bet_type: BetType,
        bet_number: &str,
        betting_pool_id: i64,
        amount: Money,
        headroom: Money,
    ) -> HoldOutcome {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let reserved: Money = entries
            .values()
            .filter(|r| now.duration_since(r.created_at) < self.ttl)
            .filter(|r| r.draw_id == draw_id && r.bet_type == bet_type && r.bet_number == bet_number)
            .map(|r| r.amount)
            .sum();
        if reserved + amount >= headroom {
            return HoldOutcome::Blocked { reserved };
        }

        let id = Uuid::new_v4();
        entries.insert(
            id,
            Reservation {
                id,
                draw_id,
                bet_type,
                bet_number: bet_number.to_string(),
                betting_pool_id,
                amount,
                created_at: now,
            },
        );
        tracing::debug!(
            "Reserved {} of {} headroom on draw {} number {} for pool {}",
            amount,
            headroom,
            draw_id,
            bet_number,
            betting_pool_id
        );
        HoldOutcome::Held { id, reserved }
    }

    pub fn release(&self, id: Uuid) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    pub fn get(&self, id: Uuid) -> Option<Reservation> {
        self.entries.lock().get(&id).cloned()
    }

    /// Live reserved amount on a number, optionally ignoring one pool's own holds.
    pub fn reserved_amount(
        &self,
        draw_id: i64,
        bet_type: BetType,
        bet_number: &str,
        excluding_pool: Option<i64>,
    ) -> Money {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|r| now.duration_since(r.created_at) < self.ttl)
            .filter(|r| r.draw_id == draw_id && r.bet_type == bet_type && r.bet_number == bet_number)
            .filter(|r| Some(r.betting_pool_id) != excluding_pool)
            .map(|r| r.amount)
            .sum()
    }

    /// Release a pool's holds on a number once the sale is committed.
    pub fn release_for_pool(
        &self,
        betting_pool_id: i64,
        draw_id: i64,
        bet_type: BetType,
        bet_number: &str,
    ) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, r| {
            !(r.betting_pool_id == betting_pool_id
                && r.draw_id == draw_id
                && r.bet_type == bet_type
                && r.bet_number == bet_number)
        });
        before - entries.len()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, r| now.duration_since(r.created_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_reserved_amount_excludes_own_pool() {
        let book = LimitReservations::new(Duration::from_secs(60));
        book.reserve(1, BetType::Directo, "25", 10, Money::from_units(100));
        book.reserve(1, BetType::Directo, "25", 11, Money::from_units(40));
        book.reserve(1, BetType::Directo, "26", 11, Money::from_units(999));

        assert_eq!(
            book.reserved_amount(1, BetType::Directo, "25", None),
            Money::from_units(140)
        );
        assert_eq!(
            book.reserved_amount(1, BetType::Directo, "25", Some(10)),
            Money::from_units(40)
        );
    }

    #[test]
    fn test_release_and_release_for_pool() {
        let book = LimitReservations::new(Duration::from_secs(60));
        let id = book.reserve(2, BetType::Pale, "0512", 1, Money::from_units(10));
        book.reserve(2, BetType::Pale, "0512", 1, Money::from_units(10));
        book.reserve(2, BetType::Pale, "0512", 2, Money::from_units(10));

        assert!(book.release(id));
        assert!(!book.release(id));
        assert_eq!(book.release_for_pool(1, 2, BetType::Pale, "0512"), 1);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_expired_holds_do_not_count() {
        let book = LimitReservations::new(Duration::ZERO);
        book.reserve(1, BetType::Directo, "00", 1, Money::from_units(5));
        assert_eq!(book.reserved_amount(1, BetType::Directo, "00", None), Money::ZERO);
        assert_eq!(book.purge_expired(), 1);
        assert!(book.is_empty());
    }

    #[test]
    fn test_reserve_within_never_exceeds_headroom() {
        let book = Arc::new(LimitReservations::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..16)
            .map(|pool| {
                let book = book.clone();
                thread::spawn(move || {
                    book.reserve_within(
                        3,
                        BetType::Directo,
                        "77",
                        pool,
                        Money::from_units(30),
                        Money::from_units(100),
                    )
                })
            })
            .collect();
        let held = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|outcome| matches!(outcome, HoldOutcome::Held { .. }))
            .count();

        assert_eq!(held, 3);
        assert_eq!(
            book.reserved_amount(3, BetType::Directo, "77", None),
            Money::from_units(90)
        );
    }
}
