use super::{from_timestamp, parse_json, to_timestamp};
use crate::error::Result;
use crate::types::Money;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Caps for plays that include hot numbers, by how many hot numbers the play
/// carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotNumberLimit {
    pub id: i64,
    pub draw_ids: Vec<i64>,
    pub directo: Money,
    pub pale1_caliente: Money,
    pub pale2_caliente: Money,
    pub tripleta1_caliente: Money,
    pub tripleta2_caliente: Money,
    pub tripleta3_caliente: Money,
    #[serde(skip)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HotNumberLimit {
    /// Same draws regardless of order or repetition.
    pub fn covers_same_draws(&self, draw_ids: &[i64]) -> bool {
        let mine: BTreeSet<i64> = self.draw_ids.iter().copied().collect();
        let theirs: BTreeSet<i64> = draw_ids.iter().copied().collect();
        mine == theirs
    }
}

pub struct HotNumberStore<'a> {
    conn: &'a Connection,
}

const LIMIT_SELECT: &str = "SELECT id, draw_ids, directo, pale1_caliente, pale2_caliente,
        tripleta1_caliente, tripleta2_caliente, tripleta3_caliente, is_active, created_at, updated_at
     FROM hot_number_limits";

fn limit_from_row(row: &Row<'_>) -> rusqlite::Result<HotNumberLimit> {
    Ok(HotNumberLimit {
        id: row.get(0)?,
        draw_ids: parse_json(1, row.get(1)?)?,
        directo: Money::from_cents(row.get(2)?),
        pale1_caliente: Money::from_cents(row.get(3)?),
        pale2_caliente: Money::from_cents(row.get(4)?),
        tripleta1_caliente: Money::from_cents(row.get(5)?),
        tripleta2_caliente: Money::from_cents(row.get(6)?),
        tripleta3_caliente: Money::from_cents(row.get(7)?),
        is_active: row.get(8)?,
        created_at: from_timestamp(row.get(9)?),
        updated_at: from_timestamp(row.get(10)?),
    })
}

impl<'a> HotNumberStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn active_numbers(&self) -> Result<Vec<u8>> {
        let mut stmt = self
            .conn
            .prepare("SELECT number FROM hot_numbers WHERE is_active = 1 ORDER BY number")?;
        let rows = stmt.query_map([], |row| row.get::<_, u8>(0))?;

        let mut numbers = Vec::new();
        for number in rows {
            numbers.push(number?);
        }
        Ok(numbers)
    }

    /// Make the active set equal to `numbers`. Returns (activated, deactivated).
    pub fn replace_numbers(&self, numbers: &BTreeSet<u8>, now: DateTime<Utc>) -> Result<(usize, usize)> {
        let current: BTreeSet<u8> = self.active_numbers()?.into_iter().collect();
        let ts = to_timestamp(now);

        let mut activated = 0;
        for number in numbers.difference(&current) {
            self.conn.execute(
                "INSERT INTO hot_numbers (number, is_active, created_at, updated_at) VALUES (?1, 1, ?2, ?2)
                 ON CONFLICT (number) DO UPDATE SET is_active = 1, updated_at = ?2",
                params![number, ts],
            )?;
            activated += 1;
        }

        let mut deactivated = 0;
        for number in current.difference(numbers) {
            deactivated += self.conn.execute(
                "UPDATE hot_numbers SET is_active = 0, updated_at = ?2 WHERE number = ?1",
                params![number, ts],
            )?;
        }
        Ok((activated, deactivated))
    }

    pub fn insert_limit(&self, limit: &HotNumberLimit) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO hot_number_limits (draw_ids, directo, pale1_caliente, pale2_caliente,
                tripleta1_caliente, tripleta2_caliente, tripleta3_caliente, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
            params![
                serde_json::to_string(&limit.draw_ids)?,
                limit.directo.cents(),
                limit.pale1_caliente.cents(),
                limit.pale2_caliente.cents(),
                limit.tripleta1_caliente.cents(),
                limit.tripleta2_caliente.cents(),
                limit.tripleta3_caliente.cents(),
                to_timestamp(limit.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_limit(&self, limit: &HotNumberLimit) -> Result<()> {
        self.conn.execute(
            "UPDATE hot_number_limits SET draw_ids = ?2, directo = ?3, pale1_caliente = ?4,
                pale2_caliente = ?5, tripleta1_caliente = ?6, tripleta2_caliente = ?7,
                tripleta3_caliente = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                limit.id,
                serde_json::to_string(&limit.draw_ids)?,
                limit.directo.cents(),
                limit.pale1_caliente.cents(),
                limit.pale2_caliente.cents(),
                limit.tripleta1_caliente.cents(),
                limit.tripleta2_caliente.cents(),
                limit.tripleta3_caliente.cents(),
                to_timestamp(limit.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Inactive rows included.
    pub fn get_limit(&self, id: i64) -> Result<Option<HotNumberLimit>> {
        let sql = format!("{} WHERE id = ?1", LIMIT_SELECT);
        Ok(self.conn.query_row(&sql, params![id], limit_from_row).optional()?)
    }

    pub fn active_limits(&self) -> Result<Vec<HotNumberLimit>> {
        let sql = format!("{} WHERE is_active = 1 ORDER BY id", LIMIT_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], limit_from_row)?;

        let mut limits = Vec::new();
        for limit in rows {
            limits.push(limit?);
        }
        Ok(limits)
    }

    pub fn deactivate_limit(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE hot_number_limits SET is_active = 0, updated_at = ?2 WHERE id = ?1",
            params![id, to_timestamp(now)],
        )?;
        Ok(changed > 0)
    }

    pub fn deactivate_all_limits(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE hot_number_limits SET is_active = 0, updated_at = ?1 WHERE is_active = 1",
            params![to_timestamp(now)],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn test_replace_numbers_reactivates_rows() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let store = HotNumberStore::new(&conn);
        let now = Utc::now();

        let first: BTreeSet<u8> = [7, 13, 99].into_iter().collect();
        assert_eq!(store.replace_numbers(&first, now).unwrap(), (3, 0));

        let second: BTreeSet<u8> = [7, 42].into_iter().collect();
        assert_eq!(store.replace_numbers(&second, now).unwrap(), (1, 2));
        assert_eq!(store.active_numbers().unwrap(), vec![7, 42]);

        assert_eq!(store.replace_numbers(&first, now).unwrap(), (2, 1));
        assert_eq!(store.active_numbers().unwrap(), vec![7, 13, 99]);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM hot_numbers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 4);
    }

    #[test]
    fn test_same_draws_ignores_order() {
        let limit = HotNumberLimit {
            id: 1,
            draw_ids: vec![3, 1, 2],
            directo: Money::ZERO,
            pale1_caliente: Money::ZERO,
            pale2_caliente: Money::ZERO,
            tripleta1_caliente: Money::ZERO,
            tripleta2_caliente: Money::ZERO,
            tripleta3_caliente: Money::ZERO,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(limit.covers_same_draws(&[1, 2, 3, 3]));
        assert!(!limit.covers_same_draws(&[1, 2]));
    }
}
