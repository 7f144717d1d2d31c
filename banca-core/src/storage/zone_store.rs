use super::{from_timestamp, to_timestamp, SqlFilter};
use crate::error::Result;
use crate::types::PageRequest;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub betting_pool_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ZoneFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

pub struct ZoneStore<'a> {
    conn: &'a Connection,
}

const ZONE_SELECT: &str = "SELECT z.id, z.name, z.is_active,
        (SELECT COUNT(*) FROM betting_pools p WHERE p.zone_id = z.id),
        z.created_at, z.updated_at
     FROM zones z";

fn zone_from_row(row: &Row<'_>) -> rusqlite::Result<Zone> {
    Ok(Zone {
        id: row.get(0)?,
        name: row.get(1)?,
        is_active: row.get(2)?,
        betting_pool_count: row.get(3)?,
        created_at: from_timestamp(row.get(4)?),
        updated_at: from_timestamp(row.get(5)?),
    })
}

impl<'a> ZoneStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, name: &str, now: DateTime<Utc>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO zones (name, is_active, created_at, updated_at) VALUES (?1, 1, ?2, ?2)",
            params![name, to_timestamp(now)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<Zone>> {
        let sql = format!("{} WHERE z.id = ?1", ZONE_SELECT);
        Ok(self.conn.query_row(&sql, params![id], zone_from_row).optional()?)
    }

    /// Case-insensitive name lookup, optionally ignoring one zone id.
    pub fn name_taken(&self, name: &str, except_id: Option<i64>) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM zones WHERE lower(name) = lower(?1) AND id != ?2",
            params![name, except_id.unwrap_or(0)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list(&self, filter: &ZoneFilter, page: PageRequest) -> Result<(Vec<Zone>, i64)> {
        let mut sql_filter = SqlFilter::new();
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            sql_filter.push_contains(&["z.name"], search.trim());
        }
        if let Some(active) = filter.is_active {
            sql_filter.push("z.is_active = ?", active);
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM zones z{}", sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "{}{} ORDER BY z.name{}",
            ZONE_SELECT,
            sql_filter.where_sql(),
            sql_filter.limit_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(sql_filter.paged_params(page.limit(), page.offset())),
            zone_from_row,
        )?;

        let mut zones = Vec::new();
        for zone in rows {
            zones.push(zone?);
        }
        Ok((zones, total))
    }

    pub fn active(&self) -> Result<Vec<Zone>> {
        let sql = format!("{} WHERE z.is_active = 1 ORDER BY z.name", ZONE_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], zone_from_row)?;

        let mut zones = Vec::new();
        for zone in rows {
            zones.push(zone?);
        }
        Ok(zones)
    }

    pub fn update(&self, id: i64, name: &str, is_active: bool, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE zones SET name = ?2, is_active = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, name, is_active, to_timestamp(now)],
        )?;
        Ok(())
    }

    pub fn set_active(&self, id: i64, is_active: bool, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE zones SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, is_active, to_timestamp(now)],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let store = ZoneStore::new(&conn);
        let now = Utc::now();

        let norte = store.insert("Norte", now).unwrap();
        store.insert("Sur", now).unwrap();
        store.insert("Noroeste", now).unwrap();
        store.set_active(norte, false, now).unwrap();

        let (zones, total) = store
            .list(
                &ZoneFilter {
                    search: Some("no".to_string()),
                    is_active: None,
                },
                PageRequest::default(),
            )
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(zones[0].name, "Noroeste");

        let (active, total) = store
            .list(
                &ZoneFilter {
                    search: None,
                    is_active: Some(true),
                },
                PageRequest::new(1, 1),
            )
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(active.len(), 1);

        assert!(store.name_taken("SUR", None).unwrap());
        assert!(!store.name_taken("Norte", Some(norte)).unwrap());
    }
}
