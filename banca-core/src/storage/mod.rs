pub mod contact_store;
pub mod hot_number_store;
pub mod limit_store;
pub mod lottery_store;
pub mod pool_store;
pub mod result_store;
pub mod ticket_store;
pub mod transaction_store;
pub mod user_store;
pub mod zone_store;

pub use contact_store::{Contact, ContactFilter, ContactStore};
pub use hot_number_store::{HotNumberLimit, HotNumberStore};
pub use limit_store::{LimitFilter, LimitRule, LimitStore, SOURCE_MANUAL, SOURCE_RANDOM_BLOCK};
pub use lottery_store::{Draw, Lottery, LotteryStore, WeeklySchedule};
pub use pool_store::{
    BettingPool, DrawPrize, PoolConfig, PoolDraw, PoolFilter, PoolPrize, PoolStore,
};
pub use result_store::{DrawResult, ResultStore};
pub use ticket_store::{
    DrawSalesAggregate, NumberUsage, PoolSalesAggregate, SalesQuery, Ticket, TicketLine,
    TicketListTotals, TicketQuery, TicketStore, UsageKey, WinningPlay, WinningPlayQuery,
    WinningPlayTotals,
};
pub use transaction_store::{AccountTransaction, TransactionFilter, TransactionStore};
pub use user_store::{User, UserFilter, UserStore};
pub use zone_store::{Zone, ZoneFilter, ZoneStore};

use crate::error::{CoreError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    CoreError::internal(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Lotteries table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS lotteries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                code TEXT UNIQUE NOT NULL,
                utc_offset_minutes INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Draws table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS draws (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lottery_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                abbreviation TEXT NOT NULL,
                draw_time INTEGER NOT NULL,
                bet_types TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (lottery_id) REFERENCES lotteries(id)
            )",
            [],
        )?;

        // Weekly draw schedules, day 0 = Sunday
        conn.execute(
            "CREATE TABLE IF NOT EXISTS draw_schedules (
                draw_id INTEGER NOT NULL,
                day_of_week INTEGER NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (draw_id) REFERENCES draws(id),
                PRIMARY KEY (draw_id, day_of_week)
            )",
            [],
        )?;

        // Zones table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS zones (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Betting pools table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS betting_pools (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                zone_id INTEGER NOT NULL,
                address TEXT,
                phone TEXT,
                balance INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (zone_id) REFERENCES zones(id)
            )",
            [],
        )?;

        // Per-pool sales configuration, stored as JSON
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pool_configs (
                betting_pool_id INTEGER PRIMARY KEY,
                config TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id)
            )",
            [],
        )?;

        // Prize payouts and commissions per bet type
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pool_prizes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                betting_pool_id INTEGER NOT NULL,
                lottery_id INTEGER,
                bet_type TEXT NOT NULL,
                payouts TEXT,
                commission_percentage REAL,
                is_active INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id),
                FOREIGN KEY (lottery_id) REFERENCES lotteries(id)
            )",
            [],
        )?;

        // Draw settings per pool
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pool_draws (
                betting_pool_id INTEGER NOT NULL,
                draw_id INTEGER NOT NULL,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                anticipated_closing_minutes INTEGER,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id),
                FOREIGN KEY (draw_id) REFERENCES draws(id),
                PRIMARY KEY (betting_pool_id, draw_id)
            )",
            [],
        )?;

        // Users table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                full_name TEXT NOT NULL,
                email TEXT,
                password_hash TEXT NOT NULL,
                betting_pool_id INTEGER,
                is_admin INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_permissions (
                user_id INTEGER NOT NULL,
                code TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                PRIMARY KEY (user_id, code)
            )",
            [],
        )?;

        // Tickets table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT UNIQUE NOT NULL,
                barcode TEXT UNIQUE NOT NULL,
                betting_pool_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                ticket_date TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                global_multiplier INTEGER NOT NULL,
                line_count INTEGER NOT NULL,
                total_bet INTEGER NOT NULL,
                total_with_multiplier INTEGER NOT NULL,
                total_commission INTEGER NOT NULL,
                total_discount INTEGER NOT NULL,
                total_net INTEGER NOT NULL,
                grand_total INTEGER NOT NULL,
                total_prize INTEGER NOT NULL DEFAULT 0,
                winning_lines INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                special_flags TEXT,
                lottery_ids TEXT NOT NULL,
                earliest_draw_time INTEGER,
                latest_draw_time INTEGER,
                customer_name TEXT,
                customer_phone TEXT,
                customer_email TEXT,
                terminal_id TEXT,
                ip_address TEXT,
                cancelled_at INTEGER,
                cancelled_by INTEGER,
                cancel_reason TEXT,
                paid_at INTEGER,
                paid_by INTEGER,
                payment_method TEXT,
                payment_reference TEXT,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            [],
        )?;

        // Ticket lines table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ticket_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id INTEGER NOT NULL,
                line_number INTEGER NOT NULL,
                draw_id INTEGER NOT NULL,
                lottery_id INTEGER NOT NULL,
                draw_date TEXT NOT NULL,
                bet_number TEXT NOT NULL,
                bet_type TEXT NOT NULL,
                bet_amount INTEGER NOT NULL,
                multiplier INTEGER NOT NULL,
                subtotal INTEGER NOT NULL,
                total_with_multiplier INTEGER NOT NULL,
                commission_percentage REAL NOT NULL,
                commission_amount INTEGER NOT NULL,
                net_amount INTEGER NOT NULL,
                prize_amount INTEGER NOT NULL DEFAULT 0,
                is_winner INTEGER NOT NULL DEFAULT 0,
                winning_position INTEGER,
                status TEXT NOT NULL,
                FOREIGN KEY (ticket_id) REFERENCES tickets(id),
                FOREIGN KEY (draw_id) REFERENCES draws(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ticket_lines_usage
             ON ticket_lines (draw_id, draw_date, bet_type, bet_number)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tickets_pool_date
             ON tickets (betting_pool_id, ticket_date)",
            [],
        )?;

        // Limit rules table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS limit_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                draw_id INTEGER,
                bet_type TEXT,
                zone_id INTEGER,
                betting_pool_id INTEGER,
                bet_number_pattern TEXT,
                max_bet_per_number INTEGER,
                max_bet_per_ticket INTEGER,
                max_bet_per_betting_pool INTEGER,
                max_bet_global INTEGER,
                priority INTEGER,
                effective_from INTEGER,
                effective_to INTEGER,
                source TEXT NOT NULL DEFAULT 'MANUAL',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Key/value settings (automatic limits, random block)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Published draw results
        conn.execute(
            "CREATE TABLE IF NOT EXISTS draw_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                draw_id INTEGER NOT NULL,
                result_date TEXT NOT NULL,
                numbers TEXT NOT NULL,
                cash3 TEXT,
                play4 TEXT,
                pick5 TEXT,
                published_by INTEGER NOT NULL,
                published_at INTEGER NOT NULL,
                FOREIGN KEY (draw_id) REFERENCES draws(id),
                UNIQUE (draw_id, result_date)
            )",
            [],
        )?;

        // Accountable transactions table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS account_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                betting_pool_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                amount INTEGER NOT NULL,
                initial_balance INTEGER NOT NULL,
                final_balance INTEGER NOT NULL,
                description TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id)
            )",
            [],
        )?;

        // Per-draw payout overrides of a pool
        conn.execute(
            "CREATE TABLE IF NOT EXISTS draw_prizes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                betting_pool_id INTEGER NOT NULL,
                draw_id INTEGER NOT NULL,
                bet_type TEXT NOT NULL,
                payouts TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id),
                FOREIGN KEY (draw_id) REFERENCES draws(id),
                UNIQUE (betting_pool_id, draw_id, bet_type)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS hot_numbers (
                number INTEGER PRIMARY KEY CHECK (number BETWEEN 0 AND 99),
                is_active INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS hot_number_limits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                draw_ids TEXT NOT NULL,
                directo INTEGER NOT NULL,
                pale1_caliente INTEGER NOT NULL,
                pale2_caliente INTEGER NOT NULL,
                tripleta1_caliente INTEGER NOT NULL,
                tripleta2_caliente INTEGER NOT NULL,
                tripleta3_caliente INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                betting_pool_id INTEGER NOT NULL,
                contact_name TEXT NOT NULL,
                phone TEXT,
                telegram_chat_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (betting_pool_id) REFERENCES betting_pools(id)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Dynamic `WHERE` clause builder for list queries.
#[derive(Debug, Default)]
pub struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause using `?` for its single parameter.
    pub fn push(&mut self, clause: &str, value: impl Into<Value>) -> &mut Self {
        let index = self.params.len() + 1;
        self.clauses.push(clause.replace('?', &format!("?{}", index)));
        self.params.push(value.into());
        self
    }

    /// Substring match of `term` against any of `columns`. `%`, `_` and `\`
    /// in the term match literally.
    pub fn push_contains(&mut self, columns: &[&str], term: &str) -> &mut Self {
        let clause = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(&format!("({})", clause), format!("%{}%", escape_like(term)))
    }

    pub fn push_raw(&mut self, clause: impl Into<String>) -> &mut Self {
        self.clauses.push(clause.into());
        self
    }

    /// Add `column IN (...)` for a non-empty list of ids.
    pub fn push_in(&mut self, column: &str, ids: &[i64]) -> &mut Self {
        self.push_in_clause(&format!("{} IN ({{ids}})", column), ids)
    }

    /// Add a clause whose `{ids}` marker expands to one placeholder per id.
    /// Empty lists add nothing.
    pub fn push_in_clause(&mut self, template: &str, ids: &[i64]) -> &mut Self {
        if ids.is_empty() {
            return self;
        }
        let start = self.params.len() + 1;
        let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", start + i)).collect();
        self.clauses
            .push(template.replace("{ids}", &placeholders.join(", ")));
        self.params.extend(ids.iter().map(|id| Value::Integer(*id)));
        self
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameters followed by a trailing LIMIT/OFFSET pair.
    pub fn paged_params(&self, limit: i64, offset: i64) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        params
    }

    /// `LIMIT ?n OFFSET ?n+1` numbered after the filter parameters.
    pub fn limit_sql(&self) -> String {
        let n = self.params.len() + 1;
        format!(" LIMIT ?{} OFFSET ?{}", n, n + 1)
    }
}

pub(crate) fn to_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub(crate) fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

pub(crate) fn time_to_secs(t: NaiveTime) -> i64 {
    t.num_seconds_from_midnight() as i64
}

pub(crate) fn secs_to_time(secs: i64) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(secs.clamp(0, 86_399) as u32, 0)
        .unwrap_or(NaiveTime::MIN)
}

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(idx: usize, raw: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_enum<T: std::str::FromStr>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: String,
) -> rusqlite::Result<T> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params_from_iter;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_schema_is_idempotent_on_disk() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("banca.db");

        let storage = Storage::new(&path).await.unwrap();
        drop(storage);
        let storage = Storage::new(&path).await.unwrap();

        let conn = storage.get_connection().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tickets'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sql_filter_numbering() {
        let mut filter = SqlFilter::new();
        filter
            .push("name LIKE ?", "%nor%".to_string())
            .push_in("zone_id", &[1, 2])
            .push("is_active = ?", 1i64);

        assert_eq!(
            filter.where_sql(),
            " WHERE name LIKE ?1 AND zone_id IN (?2, ?3) AND is_active = ?4"
        );
        assert_eq!(filter.limit_sql(), " LIMIT ?5 OFFSET ?6");
        assert_eq!(filter.paged_params(10, 0).len(), 6);
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let mut filter = SqlFilter::new();
        filter.push_contains(&["code", "name"], "50%_off");
        assert_eq!(
            filter.where_sql(),
            " WHERE (code LIKE ?1 ESCAPE '\\' OR name LIKE ?1 ESCAPE '\\')"
        );
        assert_eq!(filter.params()[0], Value::Text("%50\\%\\_off%".to_string()));

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (code TEXT, name TEXT);
             INSERT INTO items VALUES ('A1', '50%_off'), ('A2', '50 percent off'), ('A3', '501off');",
        )
        .unwrap();
        let count = |term: &str| -> i64 {
            let mut filter = SqlFilter::new();
            filter.push_contains(&["code", "name"], term);
            conn.query_row(
                &format!("SELECT COUNT(*) FROM items{}", filter.where_sql()),
                params_from_iter(filter.params()),
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(count("50%_off"), 1);
        assert_eq!(count("%"), 1);
        assert_eq!(count("_"), 1);
        assert_eq!(count("50"), 3);
    }

    #[test]
    fn test_time_and_date_helpers() {
        let t = NaiveTime::from_hms_opt(14, 55, 0).unwrap();
        assert_eq!(secs_to_time(time_to_secs(t)), t);
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(date_to_sql(d), "2024-03-09");
        assert_eq!(parse_date(0, "2024-03-09".to_string()).unwrap(), d);
    }
}
