use super::{from_timestamp, parse_enum, to_timestamp, SqlFilter};
use crate::catalog::BetType;
use crate::error::{CoreError, Result};
use crate::types::{DiscountMode, FallType, FutureSalesMode, Money, PageRequest};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingPool {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub zone_id: i64,
    pub zone_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub balance: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sales rules for a betting pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    pub fall_type: FallType,
    pub fall_percentage: f64,
    pub daily_sale_limit: Option<Money>,
    pub credit_limit: Option<Money>,
    pub cancel_minutes: Option<i64>,
    pub future_sales_mode: FutureSalesMode,
    pub max_future_days: Option<i64>,
    pub discount_mode: DiscountMode,
    pub discount_amount: Option<Money>,
    pub discount_per_every: Option<Money>,
    pub deactivation_balance: Option<Money>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            fall_type: FallType::Off,
            fall_percentage: 0.0,
            daily_sale_limit: None,
            credit_limit: None,
            cancel_minutes: None,
            future_sales_mode: FutureSalesMode::Off,
            max_future_days: None,
            discount_mode: DiscountMode::Off,
            discount_amount: None,
            discount_per_every: None,
            deactivation_balance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPrize {
    pub id: i64,
    pub betting_pool_id: i64,
    /// `None` applies to every lottery without a specific entry.
    pub lottery_id: Option<i64>,
    pub bet_type: BetType,
    pub payouts: Option<Vec<i64>>,
    pub commission_percentage: Option<f64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDraw {
    pub betting_pool_id: i64,
    pub draw_id: i64,
    pub is_enabled: bool,
    pub anticipated_closing_minutes: Option<i64>,
}

/// Payout override for one bet type in one draw of a pool. Wins over the
/// pool's general prize entry when grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawPrize {
    pub id: i64,
    pub betting_pool_id: i64,
    pub draw_id: i64,
    pub bet_type: BetType,
    pub payouts: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PoolFilter {
    pub search: Option<String>,
    pub zone_id: Option<i64>,
    pub is_active: Option<bool>,
}

pub struct PoolStore<'a> {
    conn: &'a Connection,
}

const POOL_SELECT: &str = "SELECT p.id, p.code, p.name, p.zone_id, z.name, p.address, p.phone,
        p.balance, p.is_active, p.created_at, p.updated_at
     FROM betting_pools p LEFT JOIN zones z ON z.id = p.zone_id";

fn pool_from_row(row: &Row<'_>) -> rusqlite::Result<BettingPool> {
    Ok(BettingPool {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        zone_id: row.get(3)?,
        zone_name: row.get(4)?,
        address: row.get(5)?,
        phone: row.get(6)?,
        balance: Money::from_cents(row.get(7)?),
        is_active: row.get(8)?,
        created_at: from_timestamp(row.get(9)?),
        updated_at: from_timestamp(row.get(10)?),
    })
}

fn prize_from_row(row: &Row<'_>) -> rusqlite::Result<PoolPrize> {
    let payouts: Option<String> = row.get(4)?;
    Ok(PoolPrize {
        id: row.get(0)?,
        betting_pool_id: row.get(1)?,
        lottery_id: row.get(2)?,
        bet_type: parse_enum(3, row.get(3)?)?,
        payouts: match payouts {
            Some(raw) => Some(super::parse_json(4, raw)?),
            None => None,
        },
        commission_percentage: row.get(5)?,
        is_active: row.get(6)?,
    })
}

const DRAW_PRIZE_SELECT: &str = "SELECT id, betting_pool_id, draw_id, bet_type, payouts, created_at, updated_at
     FROM draw_prizes";

fn draw_prize_from_row(row: &Row<'_>) -> rusqlite::Result<DrawPrize> {
    Ok(DrawPrize {
        id: row.get(0)?,
        betting_pool_id: row.get(1)?,
        draw_id: row.get(2)?,
        bet_type: parse_enum(3, row.get(3)?)?,
        payouts: super::parse_json(4, row.get(4)?)?,
        created_at: from_timestamp(row.get(5)?),
        updated_at: from_timestamp(row.get(6)?),
    })
}

impl<'a> PoolStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, pool: &BettingPool) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO betting_pools (code, name, zone_id, address, phone, balance, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                pool.code,
                pool.name,
                pool.zone_id,
                pool.address,
                pool.phone,
                pool.balance.cents(),
                pool.is_active,
                to_timestamp(pool.created_at),
                to_timestamp(pool.updated_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update descriptive fields. The balance only moves through transactions.
    pub fn update(&self, pool: &BettingPool) -> Result<()> {
        self.conn.execute(
            "UPDATE betting_pools SET name = ?2, zone_id = ?3, address = ?4, phone = ?5,
                is_active = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                pool.id,
                pool.name,
                pool.zone_id,
                pool.address,
                pool.phone,
                pool.is_active,
                to_timestamp(pool.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<BettingPool>> {
        let sql = format!("{} WHERE p.id = ?1", POOL_SELECT);
        Ok(self.conn.query_row(&sql, params![id], pool_from_row).optional()?)
    }

    pub fn code_exists(&self, code: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM betting_pools WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Highest purely numeric pool code in use, or 0.
    pub fn max_numeric_code(&self) -> Result<i64> {
        let mut stmt = self.conn.prepare("SELECT code FROM betting_pools")?;
        let codes = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut max = 0;
        for code in codes {
            if let Ok(n) = code?.parse::<i64>() {
                max = max.max(n);
            }
        }
        Ok(max)
    }

    pub fn list(&self, filter: &PoolFilter, page: PageRequest) -> Result<(Vec<BettingPool>, i64)> {
        let mut sql_filter = SqlFilter::new();
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            sql_filter.push_contains(&["p.name", "p.code"], search.trim());
        }
        if let Some(zone_id) = filter.zone_id {
            sql_filter.push("p.zone_id = ?", zone_id);
        }
        if let Some(active) = filter.is_active {
            sql_filter.push("p.is_active = ?", active);
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM betting_pools p{}", sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "{}{} ORDER BY p.code{}",
            POOL_SELECT,
            sql_filter.where_sql(),
            sql_filter.limit_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(sql_filter.paged_params(page.limit(), page.offset())),
            pool_from_row,
        )?;

        let mut pools = Vec::new();
        for pool in rows {
            pools.push(pool?);
        }
        Ok((pools, total))
    }

    /// Apply a signed balance change, returning `(initial, final)`.
    pub fn adjust_balance(&self, id: i64, delta: Money, now: DateTime<Utc>) -> Result<(Money, Money)> {
        let initial: i64 = self
            .conn
            .query_row(
                "SELECT balance FROM betting_pools WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("Betting pool", id))?;

        let initial = Money::from_cents(initial);
        let final_balance = initial
            .checked_add(delta)
            .ok_or_else(|| CoreError::invalid("amount", "balance out of range"))?;
        self.conn.execute(
            "UPDATE betting_pools SET balance = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, final_balance.cents(), to_timestamp(now)],
        )?;
        Ok((initial, final_balance))
    }

    pub fn get_config(&self, pool_id: i64) -> Result<PoolConfig> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT config FROM pool_configs WHERE betting_pool_id = ?1",
                params![pool_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(PoolConfig::default()),
        }
    }

    pub fn save_config(&self, pool_id: i64, config: &PoolConfig, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pool_configs (betting_pool_id, config, updated_at)
             VALUES (?1, ?2, ?3)",
            params![pool_id, serde_json::to_string(config)?, to_timestamp(now)],
        )?;
        Ok(())
    }

    pub fn list_prizes(&self, pool_id: i64) -> Result<Vec<PoolPrize>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, betting_pool_id, lottery_id, bet_type, payouts, commission_percentage, is_active
             FROM pool_prizes WHERE betting_pool_id = ?1 ORDER BY lottery_id, bet_type",
        )?;
        let rows = stmt.query_map(params![pool_id], prize_from_row)?;

        let mut prizes = Vec::new();
        for prize in rows {
            prizes.push(prize?);
        }
        Ok(prizes)
    }

    /// Insert or replace the entry for (pool, lottery, bet type).
    pub fn upsert_prize(&self, prize: &PoolPrize) -> Result<i64> {
        let payouts = match &prize.payouts {
            Some(p) => Some(serde_json::to_string(p)?),
            None => None,
        };

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM pool_prizes
                 WHERE betting_pool_id = ?1 AND lottery_id IS ?2 AND bet_type = ?3",
                params![prize.betting_pool_id, prize.lottery_id, prize.bet_type.code()],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                self.conn.execute(
                    "UPDATE pool_prizes SET payouts = ?2, commission_percentage = ?3, is_active = ?4
                     WHERE id = ?1",
                    params![id, payouts, prize.commission_percentage, prize.is_active],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO pool_prizes (betting_pool_id, lottery_id, bet_type, payouts, commission_percentage, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        prize.betting_pool_id,
                        prize.lottery_id,
                        prize.bet_type.code(),
                        payouts,
                        prize.commission_percentage,
                        prize.is_active,
                    ],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    /// Lottery-specific entry first, then the general one.
    pub fn find_prize(
        &self,
        pool_id: i64,
        lottery_id: i64,
        bet_type: BetType,
    ) -> Result<Option<PoolPrize>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, betting_pool_id, lottery_id, bet_type, payouts, commission_percentage, is_active
                 FROM pool_prizes
                 WHERE betting_pool_id = ?1 AND bet_type = ?3 AND is_active = 1
                   AND (lottery_id = ?2 OR lottery_id IS NULL)
                 ORDER BY lottery_id IS NULL
                 LIMIT 1",
                params![pool_id, lottery_id, bet_type.code()],
                prize_from_row,
            )
            .optional()?)
    }

    /// Returns the row id and whether it was newly created.
    pub fn upsert_draw_prize(&self, prize: &DrawPrize) -> Result<(i64, bool)> {
        let payouts = serde_json::to_string(&prize.payouts)?;
        let existing = self.find_draw_prize(prize.betting_pool_id, prize.draw_id, prize.bet_type)?;

        match existing {
            Some(found) => {
                self.conn.execute(
                    "UPDATE draw_prizes SET payouts = ?2, updated_at = ?3 WHERE id = ?1",
                    params![found.id, payouts, to_timestamp(prize.updated_at)],
                )?;
                Ok((found.id, false))
            }
            None => {
                self.conn.execute(
                    "INSERT INTO draw_prizes (betting_pool_id, draw_id, bet_type, payouts, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        prize.betting_pool_id,
                        prize.draw_id,
                        prize.bet_type.code(),
                        payouts,
                        to_timestamp(prize.created_at),
                        to_timestamp(prize.updated_at),
                    ],
                )?;
                Ok((self.conn.last_insert_rowid(), true))
            }
        }
    }

    pub fn find_draw_prize(
        &self,
        pool_id: i64,
        draw_id: i64,
        bet_type: BetType,
    ) -> Result<Option<DrawPrize>> {
        let sql = format!(
            "{} WHERE betting_pool_id = ?1 AND draw_id = ?2 AND bet_type = ?3",
            DRAW_PRIZE_SELECT
        );
        Ok(self
            .conn
            .query_row(&sql, params![pool_id, draw_id, bet_type.code()], draw_prize_from_row)
            .optional()?)
    }

    pub fn list_draw_prizes(&self, pool_id: i64, draw_id: i64) -> Result<Vec<DrawPrize>> {
        let sql = format!(
            "{} WHERE betting_pool_id = ?1 AND draw_id = ?2 ORDER BY bet_type",
            DRAW_PRIZE_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pool_id, draw_id], draw_prize_from_row)?;

        let mut prizes = Vec::new();
        for prize in rows {
            prizes.push(prize?);
        }
        Ok(prizes)
    }

    pub fn delete_draw_prizes(&self, pool_id: i64, draw_id: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM draw_prizes WHERE betting_pool_id = ?1 AND draw_id = ?2",
            params![pool_id, draw_id],
        )?)
    }

    /// Prize entry used for grading: a draw override replaces the payouts of
    /// the pool entry and keeps its commission.
    pub fn effective_prize(
        &self,
        pool_id: i64,
        draw_id: i64,
        lottery_id: i64,
        bet_type: BetType,
    ) -> Result<Option<PoolPrize>> {
        let general = self.find_prize(pool_id, lottery_id, bet_type)?;
        let Some(over) = self.find_draw_prize(pool_id, draw_id, bet_type)? else {
            return Ok(general);
        };

        let base = general.unwrap_or(PoolPrize {
            id: 0,
            betting_pool_id: pool_id,
            lottery_id: Some(lottery_id),
            bet_type,
            payouts: None,
            commission_percentage: None,
            is_active: true,
        });
        Ok(Some(PoolPrize {
            payouts: Some(over.payouts),
            is_active: true,
            ..base
        }))
    }

    pub fn upsert_pool_draw(&self, pool_draw: &PoolDraw) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pool_draws (betting_pool_id, draw_id, is_enabled, anticipated_closing_minutes)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                pool_draw.betting_pool_id,
                pool_draw.draw_id,
                pool_draw.is_enabled,
                pool_draw.anticipated_closing_minutes,
            ],
        )?;
        Ok(())
    }

    pub fn get_pool_draw(&self, pool_id: i64, draw_id: i64) -> Result<Option<PoolDraw>> {
        Ok(self
            .conn
            .query_row(
                "SELECT betting_pool_id, draw_id, is_enabled, anticipated_closing_minutes
                 FROM pool_draws WHERE betting_pool_id = ?1 AND draw_id = ?2",
                params![pool_id, draw_id],
                |row| {
                    Ok(PoolDraw {
                        betting_pool_id: row.get(0)?,
                        draw_id: row.get(1)?,
                        is_enabled: row.get(2)?,
                        anticipated_closing_minutes: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_pool_draws(&self, pool_id: i64) -> Result<Vec<PoolDraw>> {
        let mut stmt = self.conn.prepare(
            "SELECT betting_pool_id, draw_id, is_enabled, anticipated_closing_minutes
             FROM pool_draws WHERE betting_pool_id = ?1 ORDER BY draw_id",
        )?;
        let rows = stmt.query_map(params![pool_id], |row| {
            Ok(PoolDraw {
                betting_pool_id: row.get(0)?,
                draw_id: row.get(1)?,
                is_enabled: row.get(2)?,
                anticipated_closing_minutes: row.get(3)?,
            })
        })?;

        let mut draws = Vec::new();
        for draw in rows {
            draws.push(draw?);
        }
        Ok(draws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Storage, ZoneStore};

    fn pool(zone_id: i64, code: &str) -> BettingPool {
        let now = Utc::now();
        BettingPool {
            id: 0,
            code: code.to_string(),
            name: format!("Banca {}", code),
            zone_id,
            zone_name: None,
            address: None,
            phone: None,
            balance: Money::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_config_defaults_and_roundtrip() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let zone_id = ZoneStore::new(&conn).insert("Centro", Utc::now()).unwrap();
        let store = PoolStore::new(&conn);
        let pool_id = store.insert(&pool(zone_id, "0001")).unwrap();

        assert_eq!(store.get_config(pool_id).unwrap(), PoolConfig::default());

        let config = PoolConfig {
            fall_type: FallType::Daily,
            fall_percentage: 10.0,
            cancel_minutes: Some(15),
            ..PoolConfig::default()
        };
        store.save_config(pool_id, &config, Utc::now()).unwrap();
        assert_eq!(store.get_config(pool_id).unwrap(), config);

        let loaded = store.get(pool_id).unwrap().unwrap();
        assert_eq!(loaded.zone_name.as_deref(), Some("Centro"));
    }

    #[tokio::test]
    async fn test_prize_lookup_prefers_lottery_specific() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let zone_id = ZoneStore::new(&conn).insert("Centro", Utc::now()).unwrap();
        conn.execute(
            "INSERT INTO lotteries (name, code, utc_offset_minutes, is_active, created_at, updated_at)
             VALUES ('Real', 'LR', -240, 1, 0, 0)",
            [],
        )
        .unwrap();
        let lottery_id = conn.last_insert_rowid();

        let store = PoolStore::new(&conn);
        let pool_id = store.insert(&pool(zone_id, "0002")).unwrap();

        let general = PoolPrize {
            id: 0,
            betting_pool_id: pool_id,
            lottery_id: None,
            bet_type: BetType::Directo,
            payouts: None,
            commission_percentage: Some(10.0),
            is_active: true,
        };
        store.upsert_prize(&general).unwrap();
        let found = store.find_prize(pool_id, lottery_id, BetType::Directo).unwrap().unwrap();
        assert_eq!(found.commission_percentage, Some(10.0));

        let specific = PoolPrize {
            lottery_id: Some(lottery_id),
            commission_percentage: Some(12.5),
            payouts: Some(vec![70, 10, 5]),
            ..general.clone()
        };
        store.upsert_prize(&specific).unwrap();
        store.upsert_prize(&specific).unwrap();
        assert_eq!(store.list_prizes(pool_id).unwrap().len(), 2);

        let found = store.find_prize(pool_id, lottery_id, BetType::Directo).unwrap().unwrap();
        assert_eq!(found.commission_percentage, Some(12.5));
        assert_eq!(found.payouts, Some(vec![70, 10, 5]));
        assert!(store.find_prize(pool_id, lottery_id, BetType::Pale).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_draw_prize_overrides_payouts_only() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let zone_id = ZoneStore::new(&conn).insert("Oeste", Utc::now()).unwrap();
        conn.execute(
            "INSERT INTO lotteries (name, code, utc_offset_minutes, is_active, created_at, updated_at)
             VALUES ('Real', 'LR', -240, 1, 0, 0)",
            [],
        )
        .unwrap();
        let lottery_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO draws (lottery_id, name, abbreviation, draw_time, bet_types, is_active, created_at, updated_at)
             VALUES (?1, 'Real Tarde', 'RT', 46500, '[]', 1, 0, 0)",
            params![lottery_id],
        )
        .unwrap();
        let draw_id = conn.last_insert_rowid();

        let store = PoolStore::new(&conn);
        let pool_id = store.insert(&pool(zone_id, "0003")).unwrap();
        store
            .upsert_prize(&PoolPrize {
                id: 0,
                betting_pool_id: pool_id,
                lottery_id: None,
                bet_type: BetType::Directo,
                payouts: Some(vec![65, 9, 4]),
                commission_percentage: Some(8.0),
                is_active: true,
            })
            .unwrap();

        let over = DrawPrize {
            id: 0,
            betting_pool_id: pool_id,
            draw_id,
            bet_type: BetType::Directo,
            payouts: vec![75, 12, 6],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let (id, created) = store.upsert_draw_prize(&over).unwrap();
        assert!(created);
        let (again, created) = store.upsert_draw_prize(&over).unwrap();
        assert_eq!((again, created), (id, false));

        let found = store
            .effective_prize(pool_id, draw_id, lottery_id, BetType::Directo)
            .unwrap()
            .unwrap();
        assert_eq!(found.payouts, Some(vec![75, 12, 6]));
        assert_eq!(found.commission_percentage, Some(8.0));

        let pale = store
            .effective_prize(pool_id, draw_id, lottery_id, BetType::Pale)
            .unwrap();
        assert!(pale.is_none());

        assert_eq!(store.delete_draw_prizes(pool_id, draw_id).unwrap(), 1);
        let found = store
            .effective_prize(pool_id, draw_id, lottery_id, BetType::Directo)
            .unwrap()
            .unwrap();
        assert_eq!(found.payouts, Some(vec![65, 9, 4]));
    }

    #[tokio::test]
    async fn test_adjust_balance_and_codes() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let zone_id = ZoneStore::new(&conn).insert("Este", Utc::now()).unwrap();
        let store = PoolStore::new(&conn);
        let pool_id = store.insert(&pool(zone_id, "0007")).unwrap();
        store.insert(&pool(zone_id, "VIP")).unwrap();

        let (initial, final_balance) = store
            .adjust_balance(pool_id, Money::from_units(-150), Utc::now())
            .unwrap();
        assert_eq!(initial, Money::ZERO);
        assert_eq!(final_balance, Money::from_units(-150));
        assert_eq!(store.max_numeric_code().unwrap(), 7);
        assert!(store.adjust_balance(999, Money::ZERO, Utc::now()).is_err());
    }
}
