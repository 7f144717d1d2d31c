use super::Backoffice;
use crate::catalog::BetType;
use crate::error::{CoreError, Result};
use crate::storage::{Draw, Lottery, LotteryStore, WeeklySchedule};
use crate::validation::Validator;
use chrono::{NaiveTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;

const DEFAULT_UTC_OFFSET_MINUTES: i32 = -240;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLottery {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLottery {
    pub name: Option<String>,
    pub utc_offset_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraw {
    pub lottery_id: i64,
    pub name: String,
    pub abbreviation: String,
    pub draw_time: NaiveTime,
    pub bet_types: Vec<BetType>,
    #[serde(default)]
    pub schedules: Vec<WeeklySchedule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDraw {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub draw_time: Option<NaiveTime>,
    pub bet_types: Option<Vec<BetType>>,
    pub schedules: Option<Vec<WeeklySchedule>>,
    pub is_active: Option<bool>,
}

fn validate_offset(v: &mut Validator, offset: Option<i32>) {
    if let Some(offset) = offset {
        v.check(
            (-720..=840).contains(&offset),
            "utcOffsetMinutes",
            "must be between -720 and 840",
        );
    }
}

fn validate_schedules(v: &mut Validator, schedules: &[WeeklySchedule]) {
    let mut days = HashSet::new();
    for (i, s) in schedules.iter().enumerate() {
        let field = format!("schedules[{}]", i);
        v.check(s.day_of_week <= 6, &field, "dayOfWeek must be 0 (Sunday) to 6")
            .check(s.start_time < s.end_time, &field, "startTime must be before endTime")
            .check(days.insert(s.day_of_week), &field, "duplicate dayOfWeek");
    }
}

impl Backoffice {
    pub async fn create_lottery(&self, request: CreateLottery) -> Result<Lottery> {
        let code = request.code.trim().to_ascii_uppercase();
        let mut v = Validator::new();
        v.required(&request.name, "name")
            .max_len(&request.name, "name", 100)
            .required(&code, "code")
            .max_len(&code, "code", 10);
        validate_offset(&mut v, request.utc_offset_minutes);
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = LotteryStore::new(&conn);

        // Check if the code is already in use
        if store.code_exists(&code)? {
            return Err(CoreError::conflict(format!("Lottery code '{}' already exists", code)));
        }

        let now = Utc::now();
        let mut lottery = Lottery {
            id: 0,
            name: request.name.trim().to_string(),
            code,
            utc_offset_minutes: request.utc_offset_minutes.unwrap_or(DEFAULT_UTC_OFFSET_MINUTES),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        lottery.id = store.insert_lottery(&lottery)?;

        tracing::info!("Created lottery '{}' with ID: {}", lottery.code, lottery.id);
        Ok(lottery)
    }

    pub async fn get_lottery(&self, id: i64) -> Result<Lottery> {
        let conn = self.storage.get_connection().await;
        LotteryStore::new(&conn)
            .get_lottery(id)?
            .ok_or_else(|| CoreError::not_found("Lottery", id))
    }

    pub async fn list_lotteries(&self, is_active: Option<bool>) -> Result<Vec<Lottery>> {
        let conn = self.storage.get_connection().await;
        LotteryStore::new(&conn).list_lotteries(is_active)
    }

    pub async fn update_lottery(&self, id: i64, request: UpdateLottery) -> Result<Lottery> {
        let mut v = Validator::new();
        if let Some(name) = &request.name {
            v.required(name, "name").max_len(name, "name", 100);
        }
        validate_offset(&mut v, request.utc_offset_minutes);
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = LotteryStore::new(&conn);
        let mut lottery = store
            .get_lottery(id)?
            .ok_or_else(|| CoreError::not_found("Lottery", id))?;

        if let Some(name) = request.name {
            lottery.name = name.trim().to_string();
        }
        if let Some(offset) = request.utc_offset_minutes {
            lottery.utc_offset_minutes = offset;
        }
        if let Some(active) = request.is_active {
            lottery.is_active = active;
        }
        lottery.updated_at = Utc::now();
        store.update_lottery(&lottery)?;

        Ok(lottery)
    }

    pub async fn create_draw(&self, request: CreateDraw) -> Result<Draw> {
        let mut v = Validator::new();
        v.required(&request.name, "name")
            .max_len(&request.name, "name", 100)
            .required(&request.abbreviation, "abbreviation")
            .max_len(&request.abbreviation, "abbreviation", 10)
            .check(!request.bet_types.is_empty(), "betTypes", "at least one bet type is required");
        validate_schedules(&mut v, &request.schedules);
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = LotteryStore::new(&conn);
        if store.get_lottery(request.lottery_id)?.is_none() {
            return Err(CoreError::not_found("Lottery", request.lottery_id));
        }

        let now = Utc::now();
        let mut bet_types = request.bet_types;
        bet_types.sort();
        bet_types.dedup();

        let mut draw = Draw {
            id: 0,
            lottery_id: request.lottery_id,
            name: request.name.trim().to_string(),
            abbreviation: request.abbreviation.trim().to_string(),
            draw_time: request.draw_time,
            bet_types,
            schedules: request.schedules,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        draw.id = store.insert_draw(&draw)?;

        tracing::info!("Created draw '{}' with ID: {}", draw.name, draw.id);
        Ok(draw)
    }

    pub async fn get_draw(&self, id: i64) -> Result<Draw> {
        let conn = self.storage.get_connection().await;
        LotteryStore::new(&conn)
            .get_draw(id)?
            .ok_or_else(|| CoreError::not_found("Draw", id))
    }

    pub async fn list_draws(&self, lottery_id: Option<i64>, is_active: Option<bool>) -> Result<Vec<Draw>> {
        let conn = self.storage.get_connection().await;
        LotteryStore::new(&conn).list_draws(lottery_id, is_active)
    }

    pub async fn update_draw(&self, id: i64, request: UpdateDraw) -> Result<Draw> {
        let mut v = Validator::new();
        if let Some(name) = &request.name {
            v.required(name, "name").max_len(name, "name", 100);
        }
        if let Some(abbreviation) = &request.abbreviation {
            v.required(abbreviation, "abbreviation")
                .max_len(abbreviation, "abbreviation", 10);
        }
        if let Some(bet_types) = &request.bet_types {
            v.check(!bet_types.is_empty(), "betTypes", "at least one bet type is required");
        }
        if let Some(schedules) = &request.schedules {
            validate_schedules(&mut v, schedules);
        }
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = LotteryStore::new(&conn);
        let mut draw = store
            .get_draw(id)?
            .ok_or_else(|| CoreError::not_found("Draw", id))?;

        if let Some(name) = request.name {
            draw.name = name.trim().to_string();
        }
        if let Some(abbreviation) = request.abbreviation {
            draw.abbreviation = abbreviation.trim().to_string();
        }
        if let Some(draw_time) = request.draw_time {
            draw.draw_time = draw_time;
        }
        if let Some(mut bet_types) = request.bet_types {
            bet_types.sort();
            bet_types.dedup();
            draw.bet_types = bet_types;
        }
        if let Some(schedules) = request.schedules {
            draw.schedules = schedules;
        }
        if let Some(active) = request.is_active {
            draw.is_active = active;
        }
        draw.updated_at = Utc::now();
        store.update_draw(&draw)?;

        Ok(draw)
    }

    pub async fn deactivate_draw(&self, id: i64) -> Result<Draw> {
        self.update_draw(
            id,
            UpdateDraw {
                is_active: Some(false),
                ..UpdateDraw::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::testing;

    fn schedule(day: u8) -> WeeklySchedule {
        WeeklySchedule {
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_lottery_and_draw_lifecycle() {
        let office = testing::backoffice().await;

        let lottery = office
            .create_lottery(CreateLottery {
                name: "Loteka".to_string(),
                code: "lk".to_string(),
                utc_offset_minutes: None,
            })
            .await
            .unwrap();
        assert_eq!(lottery.code, "LK");
        assert_eq!(lottery.utc_offset_minutes, -240);

        let duplicate = office
            .create_lottery(CreateLottery {
                name: "Otra".to_string(),
                code: "LK".to_string(),
                utc_offset_minutes: None,
            })
            .await;
        assert!(matches!(duplicate, Err(CoreError::Conflict(_))));

        let draw = office
            .create_draw(CreateDraw {
                lottery_id: lottery.id,
                name: "Loteka Noche".to_string(),
                abbreviation: "LK".to_string(),
                draw_time: NaiveTime::from_hms_opt(19, 55, 0).unwrap(),
                bet_types: vec![BetType::Pale, BetType::Directo, BetType::Pale],
                schedules: (0..7).map(schedule).collect(),
            })
            .await
            .unwrap();
        assert_eq!(draw.bet_types, vec![BetType::Directo, BetType::Pale]);

        let draw = office.deactivate_draw(draw.id).await.unwrap();
        assert!(!draw.is_active);
        assert!(office.list_draws(None, Some(true)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draw_validation() {
        let office = testing::backoffice().await;
        let mut bad = schedule(7);
        bad.end_time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();

        let result = office
            .create_draw(CreateDraw {
                lottery_id: 1,
                name: "".to_string(),
                abbreviation: "X".to_string(),
                draw_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                bet_types: vec![],
                schedules: vec![bad],
            })
            .await;

        match result {
            Err(CoreError::Validation(errors)) => assert!(errors.len() >= 4),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
