use super::Backoffice;
use crate::error::{CoreError, Result};
use crate::storage::{Zone, ZoneFilter, ZoneStore};
use crate::types::{Page, PageRequest};
use crate::validation::Validator;
use chrono::Utc;
use serde::Deserialize;

const CACHE_PREFIX: &str = "zones:";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateZone {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateZone {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

/// Zone listing parameters. Without `is_active` or `include_inactive` only
/// active zones are returned.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneQuery {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub include_inactive: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ZoneQuery {
    fn paging(&self) -> PageRequest {
        PageRequest::from_parts(self.page, self.page_size)
    }

    fn active_filter(&self) -> Option<bool> {
        match (self.is_active, self.include_inactive) {
            (Some(active), _) => Some(active),
            (None, true) => None,
            (None, false) => Some(true),
        }
    }

    fn cache_key(&self) -> String {
        format!(
            "{}list:{}:{:?}:{}:{}",
            CACHE_PREFIX,
            self.search.as_deref().unwrap_or("").trim().to_lowercase(),
            self.active_filter(),
            self.paging().page,
            self.paging().page_size
        )
    }
}

fn validate_name(v: &mut Validator, name: &str) {
    v.required(name, "name").max_len(name, "name", 100);
}

impl Backoffice {
    pub async fn create_zone(&self, request: CreateZone) -> Result<Zone> {
        let mut v = Validator::new();
        validate_name(&mut v, &request.name);
        v.finish()?;

        let name = request.name.trim();
        let conn = self.storage.get_connection().await;
        let store = ZoneStore::new(&conn);

        if store.name_taken(name, None)? {
            return Err(CoreError::conflict(format!("Zone '{}' already exists", name)));
        }

        let id = store.insert(name, Utc::now())?;
        let zone = store.get(id)?.ok_or_else(|| CoreError::not_found("Zone", id))?;
        self.cache.remove_by_prefix(CACHE_PREFIX);

        tracing::info!("Created zone '{}' with ID: {}", zone.name, zone.id);
        Ok(zone)
    }

    pub async fn get_zone(&self, id: i64) -> Result<Zone> {
        let conn = self.storage.get_connection().await;
        ZoneStore::new(&conn)
            .get(id)?
            .ok_or_else(|| CoreError::not_found("Zone", id))
    }

    pub async fn list_zones(&self, query: ZoneQuery) -> Result<Page<Zone>> {
        let paging = query.paging();
        paging.validate()?;

        let key = query.cache_key();
        if let Some(page) = self.cache.get::<Page<Zone>>(&key) {
            tracing::debug!("Zone list served from cache: {}", key);
            return Ok(page);
        }

        let filter = ZoneFilter {
            search: query.search.clone(),
            is_active: query.active_filter(),
        };
        let (zones, total) = {
            let conn = self.storage.get_connection().await;
            ZoneStore::new(&conn).list(&filter, paging)?
        };

        let page = Page::new(zones, paging, total);
        self.cache.insert(key, &page)?;
        Ok(page)
    }

    pub async fn update_zone(&self, id: i64, request: UpdateZone) -> Result<Zone> {
        let mut v = Validator::new();
        if let Some(name) = &request.name {
            validate_name(&mut v, name);
        }
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = ZoneStore::new(&conn);
        let zone = store.get(id)?.ok_or_else(|| CoreError::not_found("Zone", id))?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&zone.name)
            .to_string();
        if store.name_taken(&name, Some(id))? {
            return Err(CoreError::conflict(format!("Zone '{}' already exists", name)));
        }

        store.update(id, &name, request.is_active.unwrap_or(zone.is_active), Utc::now())?;
        self.cache.remove_by_prefix(CACHE_PREFIX);

        store.get(id)?.ok_or_else(|| CoreError::not_found("Zone", id))
    }

    /// Soft delete: the zone stays referenced by its pools.
    pub async fn deactivate_zone(&self, id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        if !ZoneStore::new(&conn).set_active(id, false, Utc::now())? {
            return Err(CoreError::not_found("Zone", id));
        }
        self.cache.remove_by_prefix(CACHE_PREFIX);

        tracing::info!("Deactivated zone {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::testing;

    fn create(name: &str) -> CreateZone {
        CreateZone {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_zone_rejects_duplicate_names() {
        let office = testing::backoffice().await;
        office.create_zone(create("Norte")).await.unwrap();

        let result = office.create_zone(create("  norte ")).await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));

        let result = office.create_zone(create("")).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_default_list_hides_inactive_zones() {
        let office = testing::backoffice().await;
        let norte = office.create_zone(create("Norte")).await.unwrap();
        office.create_zone(create("Sur")).await.unwrap();

        // Prime the cache, then make sure deactivation invalidates it
        let page = office.list_zones(ZoneQuery::default()).await.unwrap();
        assert_eq!(page.total_count, 2);

        office.deactivate_zone(norte.id).await.unwrap();
        let page = office.list_zones(ZoneQuery::default()).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].name, "Sur");

        let all = office
            .list_zones(ZoneQuery {
                include_inactive: true,
                ..ZoneQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(all.total_count, 2);
    }

    #[tokio::test]
    async fn test_update_zone() {
        let office = testing::backoffice().await;
        let zone = office.create_zone(create("Este")).await.unwrap();
        office.create_zone(create("Oeste")).await.unwrap();

        let renamed = office
            .update_zone(
                zone.id,
                UpdateZone {
                    name: Some("Este Central".to_string()),
                    is_active: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Este Central");
        assert!(renamed.is_active);

        let clash = office
            .update_zone(
                zone.id,
                UpdateZone {
                    name: Some("oeste".to_string()),
                    is_active: None,
                },
            )
            .await;
        assert!(matches!(clash, Err(CoreError::Conflict(_))));

        assert!(matches!(
            office.deactivate_zone(999).await,
            Err(CoreError::NotFound { .. })
        ));
    }
}
