use super::pools::{check_payouts, require_pool};
use super::Backoffice;
use crate::catalog::BetType;
use crate::error::{CoreError, Result};
use crate::storage::{Draw, DrawPrize, LotteryStore, PoolStore};
use crate::validation::Validator;
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawPrizeEntry {
    pub bet_type: BetType,
    pub payouts: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDrawPrizes {
    pub prizes: Vec<DrawPrizeEntry>,
}

/// Same payouts applied to several draws of one pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDrawPrizes {
    pub draw_ids: Vec<i64>,
    pub prizes: Vec<DrawPrizeEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDrawPrizes {
    pub created: usize,
    pub updated: usize,
    pub prizes: Vec<DrawPrize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDrawPrizesOutcome {
    pub draws_updated: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped_draw_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrizeSource {
    DrawSpecific,
    PoolDefault,
    SystemDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrize {
    pub bet_type: BetType,
    pub payouts: Vec<i64>,
    pub source: PrizeSource,
}

fn validate_entries(prizes: &[DrawPrizeEntry]) -> Result<()> {
    let mut v = Validator::new();
    v.check(!prizes.is_empty(), "prizes", "at least one prize is required");
    let mut seen = BTreeSet::new();
    for (i, entry) in prizes.iter().enumerate() {
        let field = format!("prizes[{}].payouts", i);
        check_payouts(&mut v, &field, &entry.payouts);
        v.check(
            seen.insert(entry.bet_type),
            &format!("prizes[{}].betType", i),
            format!("{} is listed more than once", entry.bet_type.code()),
        );
    }
    v.finish()
}

fn require_draw(conn: &Connection, draw_id: i64) -> Result<Draw> {
    LotteryStore::new(conn)
        .get_draw(draw_id)?
        .ok_or_else(|| CoreError::not_found("Draw", draw_id))
}

/// Returns (created, updated).
fn write_entries(
    store: &PoolStore<'_>,
    pool_id: i64,
    draw_id: i64,
    prizes: &[DrawPrizeEntry],
) -> Result<(usize, usize)> {
    let now = Utc::now();
    let mut created = 0;
    let mut updated = 0;
    for entry in prizes {
        let (_, is_new) = store.upsert_draw_prize(&DrawPrize {
            id: 0,
            betting_pool_id: pool_id,
            draw_id,
            bet_type: entry.bet_type,
            payouts: entry.payouts.clone(),
            created_at: now,
            updated_at: now,
        })?;
        if is_new {
            created += 1;
        } else {
            updated += 1;
        }
    }
    Ok((created, updated))
}

impl Backoffice {
    pub async fn list_draw_prizes(&self, pool_id: i64, draw_id: i64) -> Result<Vec<DrawPrize>> {
        let conn = self.storage.get_connection().await;
        require_pool(&conn, pool_id)?;
        require_draw(&conn, draw_id)?;
        PoolStore::new(&conn).list_draw_prizes(pool_id, draw_id)
    }

    pub async fn save_draw_prizes(
        &self,
        pool_id: i64,
        draw_id: i64,
        request: SaveDrawPrizes,
    ) -> Result<SavedDrawPrizes> {
        validate_entries(&request.prizes)?;

        let mut conn = self.storage.get_connection().await;
        require_pool(&conn, pool_id)?;
        require_draw(&conn, draw_id)?;

        let tx = conn.transaction()?;
        let store = PoolStore::new(&tx);
        let (created, updated) = write_entries(&store, pool_id, draw_id, &request.prizes)?;
        let prizes = store.list_draw_prizes(pool_id, draw_id)?;
        tx.commit()?;

        tracing::info!(
            "Saved draw prizes for pool {} draw {}: {} created, {} updated",
            pool_id,
            draw_id,
            created,
            updated
        );
        Ok(SavedDrawPrizes {
            created,
            updated,
            prizes,
        })
    }

    /// Unknown draws are skipped and reported back.
    pub async fn save_draw_prizes_batch(
        &self,
        pool_id: i64,
        request: BatchDrawPrizes,
    ) -> Result<BatchDrawPrizesOutcome> {
        validate_entries(&request.prizes)?;
        if request.draw_ids.is_empty() {
            return Err(CoreError::invalid("drawIds", "at least one draw is required"));
        }

        let mut conn = self.storage.get_connection().await;
        require_pool(&conn, pool_id)?;

        let tx = conn.transaction()?;
        let store = PoolStore::new(&tx);
        let draws = LotteryStore::new(&tx);
        let mut outcome = BatchDrawPrizesOutcome {
            draws_updated: 0,
            created: 0,
            updated: 0,
            skipped_draw_ids: Vec::new(),
        };
        let draw_ids: BTreeSet<i64> = request.draw_ids.iter().copied().collect();
        for draw_id in draw_ids {
            if draws.get_draw(draw_id)?.is_none() {
                tracing::warn!("Skipping unknown draw {} in prize batch for pool {}", draw_id, pool_id);
                outcome.skipped_draw_ids.push(draw_id);
                continue;
            }
            let (created, updated) = write_entries(&store, pool_id, draw_id, &request.prizes)?;
            outcome.created += created;
            outcome.updated += updated;
            outcome.draws_updated += 1;
        }
        tx.commit()?;

        tracing::info!(
            "Batch draw prizes for pool {}: {} draws, {} created, {} updated",
            pool_id,
            outcome.draws_updated,
            outcome.created,
            outcome.updated
        );
        Ok(outcome)
    }

    pub async fn delete_draw_prizes(&self, pool_id: i64, draw_id: i64) -> Result<usize> {
        let conn = self.storage.get_connection().await;
        require_pool(&conn, pool_id)?;
        require_draw(&conn, draw_id)?;
        let removed = PoolStore::new(&conn).delete_draw_prizes(pool_id, draw_id)?;

        tracing::info!("Removed {} draw prizes for pool {} draw {}", removed, pool_id, draw_id);
        Ok(removed)
    }

    /// Payouts that grading would use for each bet type the draw accepts.
    pub async fn resolved_draw_prizes(&self, pool_id: i64, draw_id: i64) -> Result<Vec<ResolvedPrize>> {
        let conn = self.storage.get_connection().await;
        require_pool(&conn, pool_id)?;
        let draw = require_draw(&conn, draw_id)?;
        let store = PoolStore::new(&conn);

        let mut resolved = Vec::with_capacity(draw.bet_types.len());
        for bet_type in &draw.bet_types {
            let bet_type = *bet_type;
            let entry = if let Some(over) = store.find_draw_prize(pool_id, draw_id, bet_type)? {
                ResolvedPrize {
                    bet_type,
                    payouts: over.payouts,
                    source: PrizeSource::DrawSpecific,
                }
            } else {
                let general = store
                    .find_prize(pool_id, draw.lottery_id, bet_type)?
                    .filter(|p| p.is_active)
                    .and_then(|p| p.payouts);
                match general {
                    Some(payouts) => ResolvedPrize {
                        bet_type,
                        payouts,
                        source: PrizeSource::PoolDefault,
                    },
                    None => ResolvedPrize {
                        bet_type,
                        payouts: bet_type.default_payouts().to_vec(),
                        source: PrizeSource::SystemDefault,
                    },
                }
            };
            resolved.push(entry);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::{testing, CreateDraw, CreateLottery, CreatePool, CreateZone, UpsertPrize};
    use chrono::NaiveTime;

    async fn setup(office: &Backoffice) -> (i64, Draw) {
        let zone = office
            .create_zone(CreateZone {
                name: "Capital".to_string(),
            })
            .await
            .unwrap();
        let pool = office
            .create_pool(CreatePool {
                code: None,
                name: "Banca".to_string(),
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
                utc_offset_minutes: None,
            })
            .await
            .unwrap();
        let draw = office
            .create_draw(CreateDraw {
                lottery_id: lottery.id,
                name: "Nacional Noche".to_string(),
                abbreviation: "LN".to_string(),
                draw_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
                bet_types: vec![BetType::Directo, BetType::Pale, BetType::Tripleta],
                schedules: vec![],
            })
            .await
            .unwrap();
        (pool.id, draw)
    }

    fn entry(bet_type: BetType, payouts: &[i64]) -> DrawPrizeEntry {
        DrawPrizeEntry {
            bet_type,
            payouts: payouts.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_resolved_prizes_follow_cascade() {
        let office = testing::backoffice().await;
        let (pool_id, draw) = setup(&office).await;

        office
            .upsert_pool_prize(
                pool_id,
                UpsertPrize {
                    lottery_id: None,
                    bet_type: BetType::Pale,
                    payouts: Some(vec![900, 900, 90]),
                    commission_percentage: None,
                    is_active: true,
                },
            )
            .await
            .unwrap();
        let saved = office
            .save_draw_prizes(
                pool_id,
                draw.id,
                SaveDrawPrizes {
                    prizes: vec![entry(BetType::Directo, &[75, 10, 5])],
                },
            )
            .await
            .unwrap();
        assert_eq!((saved.created, saved.updated), (1, 0));

        let resolved = office.resolved_draw_prizes(pool_id, draw.id).await.unwrap();
        let sources: Vec<PrizeSource> = resolved.iter().map(|r| r.source).collect();
        assert_eq!(
            sources,
            vec![PrizeSource::DrawSpecific, PrizeSource::PoolDefault, PrizeSource::SystemDefault]
        );
        assert_eq!(resolved[0].payouts, vec![75, 10, 5]);
        assert_eq!(resolved[2].payouts, BetType::Tripleta.default_payouts().to_vec());

        assert_eq!(office.delete_draw_prizes(pool_id, draw.id).await.unwrap(), 1);
        let resolved = office.resolved_draw_prizes(pool_id, draw.id).await.unwrap();
        assert_eq!(resolved[0].source, PrizeSource::SystemDefault);
    }

    #[tokio::test]
    async fn test_save_rejects_bad_entries() {
        let office = testing::backoffice().await;
        let (pool_id, draw) = setup(&office).await;

        let empty = office
            .save_draw_prizes(pool_id, draw.id, SaveDrawPrizes { prizes: vec![] })
            .await;
        assert!(matches!(empty, Err(CoreError::Validation(_))));

        let repeated = office
            .save_draw_prizes(
                pool_id,
                draw.id,
                SaveDrawPrizes {
                    prizes: vec![entry(BetType::Directo, &[60]), entry(BetType::Directo, &[-1])],
                },
            )
            .await;
        match repeated {
            Err(CoreError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {:?}", other),
        }

        let missing = office
            .save_draw_prizes(
                pool_id,
                draw.id + 50,
                SaveDrawPrizes {
                    prizes: vec![entry(BetType::Directo, &[60])],
                },
            )
            .await;
        assert!(matches!(missing, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_batch_skips_unknown_draws() {
        let office = testing::backoffice().await;
        let (pool_id, draw) = setup(&office).await;

        let outcome = office
            .save_draw_prizes_batch(
                pool_id,
                BatchDrawPrizes {
                    draw_ids: vec![draw.id, 404, draw.id],
                    prizes: vec![entry(BetType::Directo, &[70]), entry(BetType::Pale, &[1100])],
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.draws_updated, 1);
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.skipped_draw_ids, vec![404]);
        assert_eq!(office.list_draw_prizes(pool_id, draw.id).await.unwrap().len(), 2);
    }
}
