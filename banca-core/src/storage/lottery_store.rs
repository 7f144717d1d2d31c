use super::{from_timestamp, parse_json, secs_to_time, time_to_secs, to_timestamp, SqlFilter};
use crate::catalog::BetType;
use crate::error::Result;
use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lottery {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub utc_offset_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "enabled")]
    pub is_active: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draw {
    pub id: i64,
    pub lottery_id: i64,
    pub name: String,
    pub abbreviation: String,
    pub draw_time: NaiveTime,
    pub bet_types: Vec<BetType>,
    pub schedules: Vec<WeeklySchedule>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draw {
    pub fn allows(&self, bet_type: BetType) -> bool {
        self.bet_types.contains(&bet_type)
    }

    pub fn schedule_for(&self, day_of_week: u8) -> Option<&WeeklySchedule> {
        self.schedules
            .iter()
            .find(|s| s.day_of_week == day_of_week && s.is_active)
    }
}

pub struct LotteryStore<'a> {
    conn: &'a Connection,
}

const LOTTERY_COLUMNS: &str = "id, name, code, utc_offset_minutes, is_active, created_at, updated_at";
const DRAW_COLUMNS: &str =
    "id, lottery_id, name, abbreviation, draw_time, bet_types, is_active, created_at, updated_at";

fn lottery_from_row(row: &Row<'_>) -> rusqlite::Result<Lottery> {
    Ok(Lottery {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        utc_offset_minutes: row.get(3)?,
        is_active: row.get(4)?,
        created_at: from_timestamp(row.get(5)?),
        updated_at: from_timestamp(row.get(6)?),
    })
}

fn draw_from_row(row: &Row<'_>) -> rusqlite::Result<Draw> {
    Ok(Draw {
        id: row.get(0)?,
        lottery_id: row.get(1)?,
        name: row.get(2)?,
        abbreviation: row.get(3)?,
        draw_time: secs_to_time(row.get(4)?),
        bet_types: parse_json(5, row.get(5)?)?,
        schedules: Vec::new(),
        is_active: row.get(6)?,
        created_at: from_timestamp(row.get(7)?),
        updated_at: from_timestamp(row.get(8)?),
    })
}

impl<'a> LotteryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert_lottery(&self, lottery: &Lottery) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO lotteries (name, code, utc_offset_minutes, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                lottery.name,
                lottery.code,
                lottery.utc_offset_minutes,
                lottery.is_active,
                to_timestamp(lottery.created_at),
                to_timestamp(lottery.updated_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_lottery(&self, lottery: &Lottery) -> Result<()> {
        self.conn.execute(
            "UPDATE lotteries SET name = ?2, utc_offset_minutes = ?3, is_active = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                lottery.id,
                lottery.name,
                lottery.utc_offset_minutes,
                lottery.is_active,
                to_timestamp(lottery.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_lottery(&self, id: i64) -> Result<Option<Lottery>> {
        let sql = format!("SELECT {} FROM lotteries WHERE id = ?1", LOTTERY_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], lottery_from_row)
            .optional()?)
    }

    pub fn code_exists(&self, code: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM lotteries WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_lotteries(&self, is_active: Option<bool>) -> Result<Vec<Lottery>> {
        let mut filter = SqlFilter::new();
        if let Some(active) = is_active {
            filter.push("is_active = ?", active);
        }
        let sql = format!(
            "SELECT {} FROM lotteries{} ORDER BY name",
            LOTTERY_COLUMNS,
            filter.where_sql()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.params()), lottery_from_row)?;

        let mut lotteries = Vec::new();
        for lottery in rows {
            lotteries.push(lottery?);
        }
        Ok(lotteries)
    }

    pub fn insert_draw(&self, draw: &Draw) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO draws (lottery_id, name, abbreviation, draw_time, bet_types, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                draw.lottery_id,
                draw.name,
                draw.abbreviation,
                time_to_secs(draw.draw_time),
                serde_json::to_string(&draw.bet_types)?,
                draw.is_active,
                to_timestamp(draw.created_at),
                to_timestamp(draw.updated_at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.replace_schedules(id, &draw.schedules)?;
        Ok(id)
    }

    pub fn update_draw(&self, draw: &Draw) -> Result<()> {
        self.conn.execute(
            "UPDATE draws SET name = ?2, abbreviation = ?3, draw_time = ?4, bet_types = ?5,
                is_active = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                draw.id,
                draw.name,
                draw.abbreviation,
                time_to_secs(draw.draw_time),
                serde_json::to_string(&draw.bet_types)?,
                draw.is_active,
                to_timestamp(draw.updated_at),
            ],
        )?;
        self.replace_schedules(draw.id, &draw.schedules)
    }

    fn replace_schedules(&self, draw_id: i64, schedules: &[WeeklySchedule]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM draw_schedules WHERE draw_id = ?1",
            params![draw_id],
        )?;
        for schedule in schedules {
            self.conn.execute(
                "INSERT OR REPLACE INTO draw_schedules (draw_id, day_of_week, start_time, end_time, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    draw_id,
                    schedule.day_of_week,
                    time_to_secs(schedule.start_time),
                    time_to_secs(schedule.end_time),
                    schedule.is_active,
                ],
            )?;
        }
        Ok(())
    }

    fn load_schedules(&self, draw_id: i64) -> Result<Vec<WeeklySchedule>> {
        let mut stmt = self.conn.prepare(
            "SELECT day_of_week, start_time, end_time, is_active
             FROM draw_schedules WHERE draw_id = ?1 ORDER BY day_of_week",
        )?;
        let rows = stmt.query_map(params![draw_id], |row| {
            Ok(WeeklySchedule {
                day_of_week: row.get(0)?,
                start_time: secs_to_time(row.get(1)?),
                end_time: secs_to_time(row.get(2)?),
                is_active: row.get(3)?,
            })
        })?;

        let mut schedules = Vec::new();
        for schedule in rows {
            schedules.push(schedule?);
        }
        Ok(schedules)
    }

    pub fn get_draw(&self, id: i64) -> Result<Option<Draw>> {
        let sql = format!("SELECT {} FROM draws WHERE id = ?1", DRAW_COLUMNS);
        let draw = self
            .conn
            .query_row(&sql, params![id], draw_from_row)
            .optional()?;

        match draw {
            Some(mut draw) => {
                draw.schedules = self.load_schedules(draw.id)?;
                Ok(Some(draw))
            }
            None => Ok(None),
        }
    }

    pub fn list_draws(&self, lottery_id: Option<i64>, is_active: Option<bool>) -> Result<Vec<Draw>> {
        let mut filter = SqlFilter::new();
        if let Some(lottery_id) = lottery_id {
            filter.push("lottery_id = ?", lottery_id);
        }
        if let Some(active) = is_active {
            filter.push("is_active = ?", active);
        }
        let sql = format!(
            "SELECT {} FROM draws{} ORDER BY draw_time, name",
            DRAW_COLUMNS,
            filter.where_sql()
        );

        let mut draws = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(filter.params()), draw_from_row)?;
            let mut draws = Vec::new();
            for draw in rows {
                draws.push(draw?);
            }
            draws
        };

        for draw in draws.iter_mut() {
            draw.schedules = self.load_schedules(draw.id)?;
        }
        Ok(draws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    fn sample_lottery() -> Lottery {
        let now = Utc::now();
        Lottery {
            id: 0,
            name: "Lotería Nacional".to_string(),
            code: "LN".to_string(),
            utc_offset_minutes: -240,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_draw_with_schedules() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let store = LotteryStore::new(&conn);

        let lottery_id = store.insert_lottery(&sample_lottery()).unwrap();
        let now = Utc::now();
        let draw = Draw {
            id: 0,
            lottery_id,
            name: "Nacional Noche".to_string(),
            abbreviation: "LN-N".to_string(),
            draw_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            bet_types: vec![BetType::Directo, BetType::Pale],
            schedules: vec![WeeklySchedule {
                day_of_week: 0,
                start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(20, 55, 0).unwrap(),
                is_active: true,
            }],
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let draw_id = store.insert_draw(&draw).unwrap();

        let loaded = store.get_draw(draw_id).unwrap().unwrap();
        assert_eq!(loaded.schedules.len(), 1);
        assert!(loaded.allows(BetType::Pale));
        assert!(!loaded.allows(BetType::Tripleta));
        assert!(loaded.schedule_for(0).is_some());
        assert!(loaded.schedule_for(1).is_none());

        assert_eq!(store.list_draws(Some(lottery_id), Some(true)).unwrap().len(), 1);
        assert!(store.list_draws(Some(lottery_id + 1), None).unwrap().is_empty());
        assert!(store.code_exists("LN").unwrap());
    }
}
