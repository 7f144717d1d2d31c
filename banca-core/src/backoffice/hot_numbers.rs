use super::Backoffice;
use crate::error::{CoreError, Result};
use crate::storage::{HotNumberLimit, HotNumberStore, LotteryStore};
use crate::types::Money;
use crate::validation::Validator;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotNumbers {
    pub selected_numbers: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHotNumbers {
    /// Values outside 0..=99 are dropped.
    pub selected_numbers: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHotNumberLimit {
    pub draw_ids: Vec<i64>,
    #[serde(default)]
    pub directo: Money,
    #[serde(default)]
    pub pale1_caliente: Money,
    #[serde(default)]
    pub pale2_caliente: Money,
    #[serde(default)]
    pub tripleta1_caliente: Money,
    #[serde(default)]
    pub tripleta2_caliente: Money,
    #[serde(default)]
    pub tripleta3_caliente: Money,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHotNumberLimit {
    pub draw_ids: Option<Vec<i64>>,
    pub directo: Option<Money>,
    pub pale1_caliente: Option<Money>,
    pub pale2_caliente: Option<Money>,
    pub tripleta1_caliente: Option<Money>,
    pub tripleta2_caliente: Option<Money>,
    pub tripleta3_caliente: Option<Money>,
}

fn check_amounts(v: &mut Validator, amounts: [(&str, Option<Money>); 6]) {
    for (field, amount) in amounts {
        if let Some(amount) = amount {
            v.check(!amount.is_negative(), field, "must not be negative");
        }
    }
}

fn amounts_of(limit: &HotNumberLimit) -> [(&'static str, Option<Money>); 6] {
    [
        ("directo", Some(limit.directo)),
        ("pale1Caliente", Some(limit.pale1_caliente)),
        ("pale2Caliente", Some(limit.pale2_caliente)),
        ("tripleta1Caliente", Some(limit.tripleta1_caliente)),
        ("tripleta2Caliente", Some(limit.tripleta2_caliente)),
        ("tripleta3Caliente", Some(limit.tripleta3_caliente)),
    ]
}

fn normalize_draws(draw_ids: &[i64]) -> Vec<i64> {
    draw_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Draws must exist and no other active limit may cover the same set.
fn check_limit_draws(conn: &rusqlite::Connection, limit: &HotNumberLimit) -> Result<()> {
    let draws = LotteryStore::new(conn);
    let mut v = Validator::new();
    for draw_id in &limit.draw_ids {
        v.check(
            draws.get_draw(*draw_id)?.is_some(),
            "drawIds",
            format!("draw {} does not exist", draw_id),
        );
    }
    v.finish()?;

    let clash = HotNumberStore::new(conn)
        .active_limits()?
        .into_iter()
        .any(|other| other.id != limit.id && other.covers_same_draws(&limit.draw_ids));
    if clash {
        return Err(CoreError::conflict(format!(
            "A hot number limit already exists for draws {:?}",
            limit.draw_ids
        )));
    }
    Ok(())
}

impl Backoffice {
    pub async fn get_hot_numbers(&self) -> Result<HotNumbers> {
        let conn = self.storage.get_connection().await;
        Ok(HotNumbers {
            selected_numbers: HotNumberStore::new(&conn).active_numbers()?,
        })
    }

    pub async fn update_hot_numbers(&self, request: UpdateHotNumbers) -> Result<HotNumbers> {
        let numbers: BTreeSet<u8> = request
            .selected_numbers
            .iter()
            .filter_map(|n| u8::try_from(*n).ok())
            .filter(|n| *n <= 99)
            .collect();

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        let store = HotNumberStore::new(&tx);
        let (added, removed) = store.replace_numbers(&numbers, Utc::now())?;
        let selected_numbers = store.active_numbers()?;
        tx.commit()?;

        tracing::info!(
            "Updated hot numbers: {} added, {} removed, {} active",
            added,
            removed,
            selected_numbers.len()
        );
        Ok(HotNumbers { selected_numbers })
    }

    /// Active limits; with `draw_ids`, only those sharing at least one draw.
    pub async fn list_hot_number_limits(&self, draw_ids: &[i64]) -> Result<Vec<HotNumberLimit>> {
        let conn = self.storage.get_connection().await;
        let limits = HotNumberStore::new(&conn).active_limits()?;
        if draw_ids.is_empty() {
            return Ok(limits);
        }
        Ok(limits
            .into_iter()
            .filter(|limit| limit.draw_ids.iter().any(|id| draw_ids.contains(id)))
            .collect())
    }

    pub async fn get_hot_number_limit(&self, id: i64) -> Result<HotNumberLimit> {
        let conn = self.storage.get_connection().await;
        HotNumberStore::new(&conn)
            .get_limit(id)?
            .filter(|limit| limit.is_active)
            .ok_or_else(|| CoreError::not_found("Hot number limit", id))
    }

    pub async fn create_hot_number_limit(&self, request: CreateHotNumberLimit) -> Result<HotNumberLimit> {
        let now = Utc::now();
        let mut limit = HotNumberLimit {
            id: 0,
            draw_ids: normalize_draws(&request.draw_ids),
            directo: request.directo,
            pale1_caliente: request.pale1_caliente,
            pale2_caliente: request.pale2_caliente,
            tripleta1_caliente: request.tripleta1_caliente,
            tripleta2_caliente: request.tripleta2_caliente,
            tripleta3_caliente: request.tripleta3_caliente,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut v = Validator::new();
        v.check(!limit.draw_ids.is_empty(), "drawIds", "at least one draw is required");
        check_amounts(&mut v, amounts_of(&limit));
        v.finish()?;

        let conn = self.storage.get_connection().await;
        check_limit_draws(&conn, &limit)?;

        let store = HotNumberStore::new(&conn);
        limit.id = store.insert_limit(&limit)?;

        tracing::info!("Created hot number limit {} for draws {:?}", limit.id, limit.draw_ids);
        Ok(limit)
    }

    pub async fn update_hot_number_limit(
        &self,
        id: i64,
        request: UpdateHotNumberLimit,
    ) -> Result<HotNumberLimit> {
        let mut v = Validator::new();
        if let Some(draw_ids) = &request.draw_ids {
            v.check(!draw_ids.is_empty(), "drawIds", "at least one draw is required");
        }
        check_amounts(
            &mut v,
            [
                ("directo", request.directo),
                ("pale1Caliente", request.pale1_caliente),
                ("pale2Caliente", request.pale2_caliente),
                ("tripleta1Caliente", request.tripleta1_caliente),
                ("tripleta2Caliente", request.tripleta2_caliente),
                ("tripleta3Caliente", request.tripleta3_caliente),
            ],
        );
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = HotNumberStore::new(&conn);
        let mut limit = store
            .get_limit(id)?
            .filter(|limit| limit.is_active)
            .ok_or_else(|| CoreError::not_found("Hot number limit", id))?;

        if let Some(draw_ids) = &request.draw_ids {
            limit.draw_ids = normalize_draws(draw_ids);
        }
        limit.directo = request.directo.unwrap_or(limit.directo);
        limit.pale1_caliente = request.pale1_caliente.unwrap_or(limit.pale1_caliente);
        limit.pale2_caliente = request.pale2_caliente.unwrap_or(limit.pale2_caliente);
        limit.tripleta1_caliente = request.tripleta1_caliente.unwrap_or(limit.tripleta1_caliente);
        limit.tripleta2_caliente = request.tripleta2_caliente.unwrap_or(limit.tripleta2_caliente);
        limit.tripleta3_caliente = request.tripleta3_caliente.unwrap_or(limit.tripleta3_caliente);
        limit.updated_at = Utc::now();

        if request.draw_ids.is_some() {
            check_limit_draws(&conn, &limit)?;
        }
        store.update_limit(&limit)?;
        Ok(limit)
    }

    pub async fn delete_hot_number_limit(&self, id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let store = HotNumberStore::new(&conn);
        if !store.get_limit(id)?.map_or(false, |limit| limit.is_active) {
            return Err(CoreError::not_found("Hot number limit", id));
        }
        store.deactivate_limit(id, Utc::now())?;

        tracing::info!("Deactivated hot number limit {}", id);
        Ok(())
    }

    pub async fn delete_all_hot_number_limits(&self) -> Result<usize> {
        let conn = self.storage.get_connection().await;
        let removed = HotNumberStore::new(&conn).deactivate_all_limits(Utc::now())?;

        tracing::info!("Deactivated {} hot number limits", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::{testing, CreateDraw, CreateLottery};
    use crate::catalog::BetType;
    use chrono::NaiveTime;

    async fn draws(office: &Backoffice, count: u32) -> Vec<i64> {
        let lottery = office
            .create_lottery(CreateLottery {
                name: "Nacional".to_string(),
                code: "LN".to_string(),
                utc_offset_minutes: None,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let draw = office
                .create_draw(CreateDraw {
                    lottery_id: lottery.id,
                    name: format!("Sorteo {}", i),
                    abbreviation: format!("S{}", i),
                    draw_time: NaiveTime::from_hms_opt(12 + i, 0, 0).unwrap(),
                    bet_types: vec![BetType::Directo],
                    schedules: vec![],
                })
                .await
                .unwrap();
            ids.push(draw.id);
        }
        ids
    }

    fn create(draw_ids: Vec<i64>, directo: i64) -> CreateHotNumberLimit {
        CreateHotNumberLimit {
            draw_ids,
            directo: Money::from_units(directo),
            pale1_caliente: Money::ZERO,
            pale2_caliente: Money::ZERO,
            tripleta1_caliente: Money::ZERO,
            tripleta2_caliente: Money::ZERO,
            tripleta3_caliente: Money::ZERO,
        }
    }

    #[tokio::test]
    async fn test_update_hot_numbers_filters_and_sorts() {
        let office = testing::backoffice().await;
        let updated = office
            .update_hot_numbers(UpdateHotNumbers {
                selected_numbers: vec![42, 7, 100, -3, 7, 0],
            })
            .await
            .unwrap();
        assert_eq!(updated.selected_numbers, vec![0, 7, 42]);

        office
            .update_hot_numbers(UpdateHotNumbers {
                selected_numbers: vec![99],
            })
            .await
            .unwrap();
        assert_eq!(office.get_hot_numbers().await.unwrap().selected_numbers, vec![99]);
    }

    #[tokio::test]
    async fn test_limit_lifecycle() {
        let office = testing::backoffice().await;
        let ids = draws(&office, 3).await;

        let limit = office
            .create_hot_number_limit(create(vec![ids[1], ids[0]], 500))
            .await
            .unwrap();
        assert_eq!(limit.draw_ids, vec![ids[0], ids[1]]);

        let same_set = office.create_hot_number_limit(create(vec![ids[0], ids[1]], 10)).await;
        assert!(matches!(same_set, Err(CoreError::Conflict(_))));

        let unknown = office.create_hot_number_limit(create(vec![ids[2] + 100], 10)).await;
        assert!(matches!(unknown, Err(CoreError::Validation(_))));
        let empty = office.create_hot_number_limit(create(vec![], 10)).await;
        assert!(matches!(empty, Err(CoreError::Validation(_))));

        let other = office.create_hot_number_limit(create(vec![ids[2]], 50)).await.unwrap();
        assert_eq!(office.list_hot_number_limits(&[ids[0]]).await.unwrap().len(), 1);
        assert_eq!(office.list_hot_number_limits(&[]).await.unwrap().len(), 2);

        let updated = office
            .update_hot_number_limit(
                other.id,
                UpdateHotNumberLimit {
                    pale1_caliente: Some(Money::from_units(25)),
                    ..UpdateHotNumberLimit::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.directo, Money::from_units(50));
        assert_eq!(updated.pale1_caliente, Money::from_units(25));

        office.delete_hot_number_limit(limit.id).await.unwrap();
        assert!(matches!(
            office.get_hot_number_limit(limit.id).await,
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            office.delete_hot_number_limit(limit.id).await,
            Err(CoreError::NotFound { .. })
        ));
        assert_eq!(office.delete_all_hot_number_limits().await.unwrap(), 1);
        assert!(office.list_hot_number_limits(&[]).await.unwrap().is_empty());
    }
}
