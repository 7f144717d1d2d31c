use super::{from_timestamp, to_timestamp, SqlFilter};
use crate::error::Result;
use crate::types::PageRequest;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A person the pool's operators reach by phone or Telegram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub betting_pool_id: i64,
    pub contact_name: String,
    pub phone: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub betting_pool_id: Option<i64>,
    pub search: Option<String>,
}

pub struct ContactStore<'a> {
    conn: &'a Connection,
}

const CONTACT_SELECT: &str = "SELECT id, betting_pool_id, contact_name, phone, telegram_chat_id,
        created_at, updated_at
     FROM contacts";

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        betting_pool_id: row.get(1)?,
        contact_name: row.get(2)?,
        phone: row.get(3)?,
        telegram_chat_id: row.get(4)?,
        created_at: from_timestamp(row.get(5)?),
        updated_at: from_timestamp(row.get(6)?),
    })
}

impl<'a> ContactStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, contact: &Contact) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO contacts (betting_pool_id, contact_name, phone, telegram_chat_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                contact.betting_pool_id,
                contact.contact_name,
                contact.phone,
                contact.telegram_chat_id,
                to_timestamp(contact.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<Contact>> {
        let sql = format!("{} WHERE id = ?1", CONTACT_SELECT);
        Ok(self.conn.query_row(&sql, params![id], contact_from_row).optional()?)
    }

    pub fn list(&self, filter: &ContactFilter, page: PageRequest) -> Result<(Vec<Contact>, i64)> {
        let mut sql_filter = SqlFilter::new();
        if let Some(pool_id) = filter.betting_pool_id {
            sql_filter.push("betting_pool_id = ?", pool_id);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            sql_filter.push_contains(&["contact_name", "phone"], search.trim());
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM contacts{}", sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "{}{} ORDER BY contact_name, id{}",
            CONTACT_SELECT,
            sql_filter.where_sql(),
            sql_filter.limit_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(sql_filter.paged_params(page.limit(), page.offset())),
            contact_from_row,
        )?;

        let mut contacts = Vec::new();
        for contact in rows {
            contacts.push(contact?);
        }
        Ok((contacts, total))
    }

    pub fn update(&self, contact: &Contact) -> Result<()> {
        self.conn.execute(
            "UPDATE contacts SET contact_name = ?2, phone = ?3, telegram_chat_id = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                contact.id,
                contact.contact_name,
                contact.phone,
                contact.telegram_chat_id,
                to_timestamp(contact.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.conn.execute("DELETE FROM contacts WHERE id = ?1", params![id])? > 0)
    }

    pub fn delete_for_pool(&self, pool_id: i64) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM contacts WHERE betting_pool_id = ?1", params![pool_id])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Storage, ZoneStore};

    fn contact(pool_id: i64, name: &str, phone: Option<&str>) -> Contact {
        Contact {
            id: 0,
            betting_pool_id: pool_id,
            contact_name: name.to_string(),
            phone: phone.map(str::to_string),
            telegram_chat_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_search_and_delete_for_pool() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let zone_id = ZoneStore::new(&conn).insert("Norte", Utc::now()).unwrap();
        for code in ["0001", "0002"] {
            conn.execute(
                "INSERT INTO betting_pools (code, name, zone_id, balance, is_active, created_at, updated_at)
                 VALUES (?1, ?1, ?2, 0, 1, 0, 0)",
                params![code, zone_id],
            )
            .unwrap();
        }

        let store = ContactStore::new(&conn);
        store.insert(&contact(1, "Pedro", Some("809-555-0101"))).unwrap();
        store.insert(&contact(1, "Ana", None)).unwrap();
        store.insert(&contact(2, "Luis", Some("829-555-0199"))).unwrap();

        let by_phone = ContactFilter {
            betting_pool_id: None,
            search: Some("555-01".to_string()),
        };
        let (found, total) = store.list(&by_phone, PageRequest::new(1, 10)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(found[0].contact_name, "Luis");

        let of_pool = ContactFilter {
            betting_pool_id: Some(1),
            search: None,
        };
        let (found, _) = store.list(&of_pool, PageRequest::new(1, 10)).unwrap();
        assert_eq!(
            found.iter().map(|c| c.contact_name.as_str()).collect::<Vec<_>>(),
            vec!["Ana", "Pedro"]
        );

        assert_eq!(store.delete_for_pool(1).unwrap(), 2);
        assert_eq!(store.delete_for_pool(1).unwrap(), 0);
        assert!(!store.delete(999).unwrap());
    }
}
