use super::{from_timestamp, to_timestamp, SqlFilter};
use crate::error::Result;
use crate::types::PageRequest;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub betting_pool_id: Option<i64>,
    pub is_admin: bool,
    pub is_active: bool,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub betting_pool_id: Option<i64>,
    pub is_active: Option<bool>,
}

pub struct UserStore<'a> {
    conn: &'a Connection,
}

const USER_COLUMNS: &str = "id, username, full_name, email, password_hash, betting_pool_id,
    is_admin, is_active, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        betting_pool_id: row.get(5)?,
        is_admin: row.get(6)?,
        is_active: row.get(7)?,
        permissions: Vec::new(),
        created_at: from_timestamp(row.get(8)?),
        updated_at: from_timestamp(row.get(9)?),
    })
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, user: &User) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (username, full_name, email, password_hash, betting_pool_id, is_admin, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.username,
                user.full_name,
                user.email,
                user.password_hash,
                user.betting_pool_id,
                user.is_admin,
                user.is_active,
                to_timestamp(user.created_at),
                to_timestamp(user.updated_at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.set_permissions(id, &user.permissions)?;
        Ok(id)
    }

    pub fn update(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET full_name = ?2, email = ?3, betting_pool_id = ?4, is_admin = ?5,
                is_active = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                user.id,
                user.full_name,
                user.email,
                user.betting_pool_id,
                user.is_admin,
                user.is_active,
                to_timestamp(user.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn set_password(&self, id: i64, password_hash: &str, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, password_hash, to_timestamp(now)],
        )?;
        Ok(())
    }

    pub fn set_permissions(&self, id: i64, codes: &[String]) -> Result<()> {
        self.conn
            .execute("DELETE FROM user_permissions WHERE user_id = ?1", params![id])?;
        for code in codes {
            self.conn.execute(
                "INSERT OR IGNORE INTO user_permissions (user_id, code) VALUES (?1, ?2)",
                params![id, code],
            )?;
        }
        Ok(())
    }

    fn load_permissions(&self, id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT code FROM user_permissions WHERE user_id = ?1 ORDER BY code")?;
        let rows = stmt.query_map(params![id], |row| row.get(0))?;

        let mut codes = Vec::new();
        for code in rows {
            codes.push(code?);
        }
        Ok(codes)
    }

    pub fn get(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        self.with_permissions(self.conn.query_row(&sql, params![id], user_from_row).optional()?)
    }

    pub fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE lower(username) = lower(?1)",
            USER_COLUMNS
        );
        self.with_permissions(
            self.conn
                .query_row(&sql, params![username], user_from_row)
                .optional()?,
        )
    }

    fn with_permissions(&self, user: Option<User>) -> Result<Option<User>> {
        match user {
            Some(mut user) => {
                user.permissions = self.load_permissions(user.id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<(Vec<User>, i64)> {
        let mut sql_filter = SqlFilter::new();
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            sql_filter.push_contains(&["username", "full_name"], search.trim());
        }
        if let Some(pool_id) = filter.betting_pool_id {
            sql_filter.push("betting_pool_id = ?", pool_id);
        }
        if let Some(active) = filter.is_active {
            sql_filter.push("is_active = ?", active);
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM users{}", sql_filter.where_sql()),
            params_from_iter(sql_filter.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM users{} ORDER BY username{}",
            USER_COLUMNS,
            sql_filter.where_sql(),
            sql_filter.limit_sql()
        );
        let mut users = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params_from_iter(sql_filter.paged_params(page.limit(), page.offset())),
                user_from_row,
            )?;
            let mut users = Vec::new();
            for user in rows {
                users.push(user?);
            }
            users
        };

        for user in users.iter_mut() {
            user.permissions = self.load_permissions(user.id)?;
        }
        Ok((users, total))
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn test_user_with_permissions() {
        let storage = Storage::in_memory().await.unwrap();
        let conn = storage.get_connection().await;
        let store = UserStore::new(&conn);
        let now = Utc::now();

        let id = store
            .insert(&User {
                id: 0,
                username: "Maria".to_string(),
                full_name: "María Pérez".to_string(),
                email: None,
                password_hash: "x".to_string(),
                betting_pool_id: None,
                is_admin: false,
                is_active: true,
                permissions: vec!["TICKET_CREATE".to_string(), "TICKET_PAY".to_string()],
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let user = store.get_by_username("maria").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.permissions, vec!["TICKET_CREATE", "TICKET_PAY"]);

        store.set_permissions(id, &["MANAGE_USERS".to_string()]).unwrap();
        let (users, total) = store
            .list(&UserFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].permissions, vec!["MANAGE_USERS"]);

        let json = serde_json::to_value(&users[0]).unwrap();
        assert!(json.get("passwordHash").is_none());
    }
}
