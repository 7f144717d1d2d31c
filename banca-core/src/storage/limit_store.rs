use super::{from_timestamp, parse_enum, to_timestamp, SqlFilter};
use crate::catalog::BetType;
use crate::error::Result;
use crate::types::{Money, PageRequest};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const SOURCE_MANUAL: &str = "MANUAL";
pub const SOURCE_RANDOM_BLOCK: &str = "RANDOM_BLOCK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRule {
    pub id: i64,
    pub name: String,
    pub draw_id: Option<i64>,
    pub bet_type: Option<BetType>,
    pub zone_id: Option<i64>,
    pub betting_pool_id: Option<i64>,
    /// Exact number, a `#` mask of the same length, or `None` for any number.
    pub bet_number_pattern: Option<String>,
    pub max_bet_per_number: Option<Money>,
    pub max_bet_per_ticket: Option<Money>,
    pub max_bet_per_betting_pool: Option<Money>,
    pub max_bet_global: Option<Money>,
    pub priority: Option<i32>,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
    pub source: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct LimitFilter {
    pub draw_id: Option<i64>,
    pub bet_type: Option<BetType>,
    pub betting_pool_id: Option<i64>,
    pub is_active: Option<bool>,
}

pub struct LimitStore<'a> {
    conn: &'a Connection,
}

const RULE_COLUMNS: &str = "id, name, draw_id, bet_type, zone_id, betting_pool_id, bet_number_pattern,
    max_bet_per_number, max_bet_per_ticket, max_bet_per_betting_pool, max_bet_global, priority,
    effective_from, effective_to, source, is_active, created_at, updated_at";

fn optional_money(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Money>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(Money::from_cents))
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<LimitRule> {
    let bet_type: Option<String> = row.get(3)?;
    let from: Option<i64> = row.get(12)?;
    let to: Option<i64> = row.get(13)?;
    Ok(LimitRule {
        id: row.get(0)?,
        name: row.get(1)?,
        draw_id: row.get(2)?,
        bet_type: match bet_type {
            Some(raw) => Some(parse_enum(3, raw)?),
            None => None,
        },
        zone_id: row.get(4)?,
        betting_pool_id: row.get(5)?,
        bet_number_pattern: row.get(6)?,
        max_bet_per_number: optional_money(row, 7)?,
        max_bet_per_ticket: optional_money(row, 8)?,
        max_bet_per_betting_pool: optional_money(row, 9)?,
        max_bet_global: optional_money(row, 10)?,
        priority: row.get(11)?,
        effective_from: from.map(from_timestamp),
        effective_to: to.map(from_timestamp),
        source: row.get(14)?,
        is_active: row.get(15)?,
        created_at: from_timestamp(row.get(16)?),
        updated_at: from_timestamp(row.get(17)?),
    })
}

impl<'a> LimitStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, rule: &LimitRule) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO limit_rules (name, draw_id, bet_type, zone_id, betting_pool_id,
                bet_number_pattern, max_bet_per_number, max_bet_per_ticket, max_bet_per_betting_pool,
                max_bet_global, priority, effective_from, effective_to, source, is_active,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                rule.name,
                rule.draw_id,
                rule.bet_type.map(|b| b.code()),
                rule.zone_id,
                rule.betting_pool_id,
                rule.bet_number_pattern,
                rule.max_bet_per_number.map(Money::cents),
                rule.max_bet_per_ticket.map(Money::cents),
                rule.max_bet_per_betting_pool.map(Money::cents),
                rule.max_bet_global.map(Money::cents),
                rule.priority,
                rule.effective_from.map(to_timestamp),
                rule.effective_to.map(to_timestamp),
                rule.source,
                rule.is_active,
                to_timestamp(rule.created_at),
                to_timestamp(rule.updated_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update(&self, rule: &LimitRule) -> Result<()> {
        self.conn.execute(
            "UPDATE limit_rules SET name = ?2, draw_id = ?3, bet_type = ?4, zone_id = ?5,
                betting_pool_id = ?6, bet_number_pattern = ?7, max_bet_per_number = ?8,
                max_bet_per_ticket = ?9, max_bet_per_betting_pool = ?10, max_bet_global = ?11,
                priority = ?12, effective_from = ?13, effective_to = ?14, is_active = ?15,
                updated_at = ?16
             WHERE id = ?1",
            params![
                rule.id,
                rule.name,
                rule.draw_id,
                rule.bet_type.map(|b| b.code()),
                rule.zone_id,
                rule.betting_pool_id,
                rule.bet_number_pattern,
                rule.max_bet_per_number.map(Money::cents),
                rule.max_bet_per_ticket.map(Money::cents),
                rule.max_bet_per_betting_pool.map(Money::cents),
                rule.max_bet_global.map(Money::cents),
                rule.priority,
                rule.effective_from.map(to_timestamp),
                rule.effective_to.map(to_timestamp),
                rule.is_active,
                to_timestamp(rule.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<LimitRule>> {
        let sql = format!("SELECT {} FROM limit_rules WHERE id = ?1", RULE_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], rule_from_row).optional()?)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        Ok(self
            .conn
            .execute("DELETE FROM limit_rules WHERE id = ?1", params![id])?
            > 0)
    }

    pub fn delete_by_source(&self, source: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM limit_rules WHERE source = ?1", params![source])?)
    }

    pub fn list(&self, filter: &LimitFilter, page: PageRequest) -> Result<(Vec<LimitRule>, i64)> {
        let mut sql_filter = SqlFilter::new();
        if let Some(draw_id) = filter.draw_id {
            sql_filter.push("draw_id = ?", draw_id);
        }
        if let Some(bet_type) = filter.bet_type {
            sql_filter.push("bet_type = ?", bet_type.code().to_string());
        }
        if let Some(pool_id) = filter.betting_pool_id {
            sql_filter.push("betting_pool_id = ?", pool_id);
        }
        if let Some(active) = filter.is_active {
            sql_filter.push("is_active = ?", active);
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM limit_rules{}", sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM limit_rules{} ORDER BY priority DESC, id{}",
            RULE_COLUMNS,
            sql_filter.where_sql(),
            sql_filter.limit_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(sql_filter.paged_params(page.limit(), page.offset())),
            rule_from_row,
        )?;

        let mut rules = Vec::new();
        for rule in rows {
            rules.push(rule?);
        }
        Ok((rules, total))
    }

    /// Active rules that could apply to a draw: draw-specific or draw-agnostic.
    pub fn candidates_for_draw(&self, draw_id: i64) -> Result<Vec<LimitRule>> {
        let sql = format!(
            "SELECT {} FROM limit_rules
             WHERE is_active = 1 AND (draw_id = ?1 OR draw_id IS NULL)",
            RULE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![draw_id], rule_from_row)?;

        let mut rules = Vec::new();
        for rule in rows {
            rules.push(rule?);
        }
        Ok(rules)
    }

    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_setting<T: Serialize>(&self, key: &str, value: &T, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, serde_json::to_string(value)?, to_timestamp(now)],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    fn rule(name: &str, draw_id: Option<i64>) -> LimitRule {
        let now = Utc::now();
        LimitRule {
            id: 0,
            name: name.to_string(),
            draw_id,
            bet_type: Some(BetType::Directo),
            zone_id: None,
            betting_pool_id: None,
            bet_number_pattern: Some("##".to_string()),
            max_bet_per_number: Some(Money::from_units(500)),
            max_bet_per_ticket: None,
            max_bet_per_betting_pool: None,
            max_bet_global: None,
            priority: Some(1),
            effective_from: None,
            effective_to: None,
            source: SOURCE_MANUAL.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_candidates_and_sources() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let store = LimitStore::new(&conn);

        let id = store.insert(&rule("general", None)).unwrap();
        store.insert(&rule("draw 1", Some(1))).unwrap();
        store.insert(&rule("draw 2", Some(2))).unwrap();
        let mut blocked = rule("block", Some(1));
        blocked.source = SOURCE_RANDOM_BLOCK.to_string();
        store.insert(&blocked).unwrap();

        assert_eq!(store.candidates_for_draw(1).unwrap().len(), 3);

        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.max_bet_per_number, Some(Money::from_units(500)));
        assert_eq!(loaded.bet_type, Some(BetType::Directo));

        assert_eq!(store.delete_by_source(SOURCE_RANDOM_BLOCK).unwrap(), 1);
        assert_eq!(store.candidates_for_draw(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let store = LimitStore::new(&conn);

        assert!(store.get_setting::<Vec<i64>>("k").unwrap().is_none());
        store.put_setting("k", &vec![1i64, 2], Utc::now()).unwrap();
        assert_eq!(store.get_setting::<Vec<i64>>("k").unwrap(), Some(vec![1, 2]));
        store.delete_setting("k").unwrap();
        assert!(store.get_setting::<Vec<i64>>("k").unwrap().is_none());
    }
}
