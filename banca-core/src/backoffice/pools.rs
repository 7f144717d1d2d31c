use super::Backoffice;
use crate::catalog::BetType;
use crate::error::{CoreError, Result};
use crate::storage::{
    BettingPool, LotteryStore, PoolConfig, PoolDraw, PoolFilter, PoolPrize, PoolStore, ZoneStore,
};
use crate::types::{DiscountMode, FallType, FutureSalesMode, Page, PageRequest};
use crate::validation::Validator;
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePool {
    /// Generated from the highest numeric code when absent.
    pub code: Option<String>,
    pub name: String,
    pub zone_id: i64,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub config: Option<PoolConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePool {
    pub name: Option<String>,
    pub zone_id: Option<i64>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolQuery {
    pub search: Option<String>,
    pub zone_id: Option<i64>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPrize {
    pub lottery_id: Option<i64>,
    pub bet_type: BetType,
    pub payouts: Option<Vec<i64>>,
    pub commission_percentage: Option<f64>,
    #[serde(default = "enabled")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPoolDraw {
    pub draw_id: i64,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
    pub anticipated_closing_minutes: Option<i64>,
}

fn enabled() -> bool {
    true
}

fn validate_config(v: &mut Validator, config: &PoolConfig) {
    v.check(
        (0.0..=100.0).contains(&config.fall_percentage),
        "fallPercentage",
        "must be between 0 and 100",
    );
    if config.fall_type == FallType::Off {
        v.check(
            config.fall_percentage == 0.0,
            "fallPercentage",
            "must be 0 when fallType is OFF",
        );
    }
    for (field, amount) in [
        ("dailySaleLimit", config.daily_sale_limit),
        ("creditLimit", config.credit_limit),
    ] {
        if let Some(amount) = amount {
            v.check(!amount.is_negative(), field, "must not be negative");
        }
    }
    if let Some(minutes) = config.cancel_minutes {
        v.check((0..=1440).contains(&minutes), "cancelMinutes", "must be between 0 and 1440");
    }
    if config.future_sales_mode == FutureSalesMode::Days {
        v.check(
            matches!(config.max_future_days, Some(days) if (1..=30).contains(&days)),
            "maxFutureDays",
            "must be between 1 and 30 when futureSalesMode is DAYS",
        );
    }
    if config.discount_mode != DiscountMode::Off {
        v.check(
            config.discount_amount.map_or(false, |a| a.is_positive()),
            "discountAmount",
            "must be positive when a discount mode is set",
        )
        .check(
            config.discount_per_every.map_or(false, |a| a.is_positive()),
            "discountPerEvery",
            "must be positive when a discount mode is set",
        );
    }
}

fn validate_payouts(v: &mut Validator, payouts: &Option<Vec<i64>>) {
    if let Some(payouts) = payouts {
        check_payouts(v, "payouts", payouts);
    }
}

pub(super) fn check_payouts(v: &mut Validator, field: &str, payouts: &[i64]) {
    v.check(
        !payouts.is_empty() && payouts.len() <= 4,
        field,
        "must have between 1 and 4 positions",
    )
    .check(payouts.iter().all(|p| *p >= 0), field, "must not be negative");
}

pub(super) fn require_pool(conn: &Connection, id: i64) -> Result<BettingPool> {
    PoolStore::new(conn)
        .get(id)?
        .ok_or_else(|| CoreError::not_found("Betting pool", id))
}

fn require_active_zone(conn: &Connection, zone_id: i64) -> Result<()> {
    match ZoneStore::new(conn).get(zone_id)? {
        Some(zone) if zone.is_active => Ok(()),
        Some(_) => Err(CoreError::invalid("zoneId", "zone is inactive")),
        None => Err(CoreError::not_found("Zone", zone_id)),
    }
}

impl Backoffice {
    pub async fn create_pool(&self, request: CreatePool) -> Result<BettingPool> {
        let mut v = Validator::new();
        v.required(&request.name, "name")
            .max_len(&request.name, "name", 100)
            .optional_max_len(request.code.as_deref(), "code", 20)
            .optional_max_len(request.address.as_deref(), "address", 200)
            .optional_max_len(request.phone.as_deref(), "phone", 20);
        if let Some(config) = &request.config {
            validate_config(&mut v, config);
        }
        v.finish()?;

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        require_active_zone(&tx, request.zone_id)?;

        let store = PoolStore::new(&tx);
        let code = match request.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code.to_string(),
            None => format!("{:04}", store.max_numeric_code()? + 1),
        };
        if store.code_exists(&code)? {
            return Err(CoreError::conflict(format!("Betting pool code '{}' already exists", code)));
        }

        let now = Utc::now();
        let mut pool = BettingPool {
            id: 0,
            code,
            name: request.name.trim().to_string(),
            zone_id: request.zone_id,
            zone_name: None,
            address: request.address,
            phone: request.phone,
            balance: Default::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        pool.id = store.insert(&pool)?;
        store.save_config(pool.id, &request.config.unwrap_or_default(), now)?;
        let pool = store
            .get(pool.id)?
            .ok_or_else(|| CoreError::internal("betting pool vanished after insert"))?;
        tx.commit()?;

        // Zone listings carry pool counts
        self.cache.remove_by_prefix("zones:");

        tracing::info!("Created betting pool '{}' with ID: {}", pool.code, pool.id);
        Ok(pool)
    }

    pub async fn get_pool(&self, id: i64) -> Result<BettingPool> {
        let conn = self.storage.get_connection().await;
        require_pool(&conn, id)
    }

    pub async fn list_pools(&self, query: PoolQuery) -> Result<Page<BettingPool>> {
        let paging = PageRequest::from_parts(query.page, query.page_size);
        paging.validate()?;

        let filter = PoolFilter {
            search: query.search,
            zone_id: query.zone_id,
            is_active: query.is_active,
        };
        let conn = self.storage.get_connection().await;
        let (pools, total) = PoolStore::new(&conn).list(&filter, paging)?;
        Ok(Page::new(pools, paging, total))
    }

    pub async fn next_pool_code(&self) -> Result<String> {
        let conn = self.storage.get_connection().await;
        Ok(format!("{:04}", PoolStore::new(&conn).max_numeric_code()? + 1))
    }

    pub async fn update_pool(&self, id: i64, request: UpdatePool) -> Result<BettingPool> {
        let mut v = Validator::new();
        if let Some(name) = &request.name {
            v.required(name, "name").max_len(name, "name", 100);
        }
        v.optional_max_len(request.address.as_deref(), "address", 200)
            .optional_max_len(request.phone.as_deref(), "phone", 20);
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let mut pool = require_pool(&conn, id)?;

        if let Some(zone_id) = request.zone_id {
            if zone_id != pool.zone_id {
                require_active_zone(&conn, zone_id)?;
            }
            pool.zone_id = zone_id;
        }
        if let Some(name) = request.name {
            pool.name = name.trim().to_string();
        }
        if request.address.is_some() {
            pool.address = request.address;
        }
        if request.phone.is_some() {
            pool.phone = request.phone;
        }
        if let Some(active) = request.is_active {
            pool.is_active = active;
        }
        pool.updated_at = Utc::now();

        let store = PoolStore::new(&conn);
        store.update(&pool)?;
        self.cache.remove_by_prefix("zones:");

        require_pool(&conn, id)
    }

    pub async fn deactivate_pool(&self, id: i64) -> Result<BettingPool> {
        let pool = self
            .update_pool(
                id,
                UpdatePool {
                    is_active: Some(false),
                    ..UpdatePool::default()
                },
            )
            .await?;
        tracing::info!("Deactivated betting pool {}", pool.code);
        Ok(pool)
    }

    pub async fn get_pool_config(&self, id: i64) -> Result<PoolConfig> {
        let conn = self.storage.get_connection().await;
        require_pool(&conn, id)?;
        PoolStore::new(&conn).get_config(id)
    }

    pub async fn update_pool_config(&self, id: i64, config: PoolConfig) -> Result<PoolConfig> {
        let mut v = Validator::new();
        validate_config(&mut v, &config);
        v.finish()?;

        let conn = self.storage.get_connection().await;
        require_pool(&conn, id)?;
        PoolStore::new(&conn).save_config(id, &config, Utc::now())?;

        tracing::info!("Updated configuration of betting pool {}", id);
        Ok(config)
    }

    pub async fn list_pool_prizes(&self, id: i64) -> Result<Vec<PoolPrize>> {
        let conn = self.storage.get_connection().await;
        require_pool(&conn, id)?;
        PoolStore::new(&conn).list_prizes(id)
    }

    pub async fn upsert_pool_prize(&self, id: i64, request: UpsertPrize) -> Result<PoolPrize> {
        let mut v = Validator::new();
        validate_payouts(&mut v, &request.payouts);
        if let Some(pct) = request.commission_percentage {
            v.check(
                (0.0..=100.0).contains(&pct),
                "commissionPercentage",
                "must be between 0 and 100",
            );
        }
        v.finish()?;

        let conn = self.storage.get_connection().await;
        require_pool(&conn, id)?;
        if let Some(lottery_id) = request.lottery_id {
            if LotteryStore::new(&conn).get_lottery(lottery_id)?.is_none() {
                return Err(CoreError::not_found("Lottery", lottery_id));
            }
        }

        let mut prize = PoolPrize {
            id: 0,
            betting_pool_id: id,
            lottery_id: request.lottery_id,
            bet_type: request.bet_type,
            payouts: request.payouts,
            commission_percentage: request.commission_percentage,
            is_active: request.is_active,
        };
        prize.id = PoolStore::new(&conn).upsert_prize(&prize)?;
        Ok(prize)
    }

    pub async fn list_pool_draws(&self, id: i64) -> Result<Vec<PoolDraw>> {
        let conn = self.storage.get_connection().await;
        require_pool(&conn, id)?;
        PoolStore::new(&conn).list_pool_draws(id)
    }

    pub async fn upsert_pool_draw(&self, id: i64, request: UpsertPoolDraw) -> Result<PoolDraw> {
        if let Some(minutes) = request.anticipated_closing_minutes {
            if !(0..=240).contains(&minutes) {
                return Err(CoreError::invalid(
                    "anticipatedClosingMinutes",
                    "must be between 0 and 240",
                ));
            }
        }

        let conn = self.storage.get_connection().await;
        require_pool(&conn, id)?;
        if LotteryStore::new(&conn).get_draw(request.draw_id)?.is_none() {
            return Err(CoreError::not_found("Draw", request.draw_id));
        }

        let pool_draw = PoolDraw {
            betting_pool_id: id,
            draw_id: request.draw_id,
            is_enabled: request.is_enabled,
            anticipated_closing_minutes: request.anticipated_closing_minutes,
        };
        PoolStore::new(&conn).upsert_pool_draw(&pool_draw)?;
        Ok(pool_draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::{testing, CreateZone};
    use crate::types::Money;

    fn create(name: &str, zone_id: i64) -> CreatePool {
        CreatePool {
            code: None,
            name: name.to_string(),
            zone_id,
            address: None,
            phone: None,
            config: None,
        }
    }

    async fn zone(office: &Backoffice) -> i64 {
        office
            .create_zone(CreateZone {
                name: "Capital".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_pool_generates_codes() {
        let office = testing::backoffice().await;
        let zone_id = zone(&office).await;

        let first = office.create_pool(create("Banca Uno", zone_id)).await.unwrap();
        assert_eq!(first.code, "0001");
        assert_eq!(first.zone_name.as_deref(), Some("Capital"));
        assert_eq!(first.balance, Money::ZERO);

        let mut explicit = create("Banca Diez", zone_id);
        explicit.code = Some("0010".to_string());
        office.create_pool(explicit).await.unwrap();
        assert_eq!(office.next_pool_code().await.unwrap(), "0011");

        let mut clash = create("Otra", zone_id);
        clash.code = Some("0001".to_string());
        assert!(matches!(
            office.create_pool(clash).await,
            Err(CoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_pool_requires_active_zone() {
        let office = testing::backoffice().await;
        assert!(matches!(
            office.create_pool(create("Banca", 42)).await,
            Err(CoreError::NotFound { .. })
        ));

        let zone_id = zone(&office).await;
        office.deactivate_zone(zone_id).await.unwrap();
        assert!(matches!(
            office.create_pool(create("Banca", zone_id)).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_config_validation_and_round_trip() {
        let office = testing::backoffice().await;
        let zone_id = zone(&office).await;
        let pool = office.create_pool(create("Banca", zone_id)).await.unwrap();

        let config = office.get_pool_config(pool.id).await.unwrap();
        assert_eq!(config, PoolConfig::default());

        let bad = PoolConfig {
            fall_percentage: 10.0,
            discount_mode: DiscountMode::Pool,
            ..PoolConfig::default()
        };
        match office.update_pool_config(pool.id, bad).await {
            Err(CoreError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }

        let good = PoolConfig {
            fall_type: FallType::Daily,
            fall_percentage: 10.0,
            credit_limit: Some(Money::from_units(5_000)),
            ..PoolConfig::default()
        };
        office.update_pool_config(pool.id, good.clone()).await.unwrap();
        assert_eq!(office.get_pool_config(pool.id).await.unwrap(), good);
    }

    #[tokio::test]
    async fn test_prizes_and_pool_draws() {
        let office = testing::backoffice().await;
        let zone_id = zone(&office).await;
        let pool = office.create_pool(create("Banca", zone_id)).await.unwrap();

        let prize = office
            .upsert_pool_prize(
                pool.id,
                UpsertPrize {
                    lottery_id: None,
                    bet_type: BetType::Directo,
                    payouts: Some(vec![70, 10, 5]),
                    commission_percentage: Some(12.0),
                    is_active: true,
                },
            )
            .await
            .unwrap();
        assert!(prize.id > 0);

        let bad = office
            .upsert_pool_prize(
                pool.id,
                UpsertPrize {
                    lottery_id: None,
                    bet_type: BetType::Pale,
                    payouts: Some(vec![1, 2, 3, 4, 5]),
                    commission_percentage: Some(120.0),
                    is_active: true,
                },
            )
            .await;
        assert!(matches!(bad, Err(CoreError::Validation(_))));
        assert_eq!(office.list_pool_prizes(pool.id).await.unwrap().len(), 1);

        let missing_draw = office
            .upsert_pool_draw(
                pool.id,
                UpsertPoolDraw {
                    draw_id: 77,
                    is_enabled: true,
                    anticipated_closing_minutes: Some(10),
                },
            )
            .await;
        assert!(matches!(missing_draw, Err(CoreError::NotFound { .. })));
    }
}
