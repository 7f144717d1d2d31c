use super::{from_timestamp, parse_enum, to_timestamp, SqlFilter};
use crate::error::Result;
use crate::types::{Money, TransactionKind};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTransaction {
    pub id: i64,
    pub betting_pool_id: i64,
    pub kind: TransactionKind,
    pub amount: Money,
    pub initial_balance: Money,
    pub final_balance: Money,
    pub description: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub betting_pool_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub struct TransactionStore<'a> {
    conn: &'a Connection,
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<AccountTransaction> {
    Ok(AccountTransaction {
        id: row.get(0)?,
        betting_pool_id: row.get(1)?,
        kind: parse_enum(2, row.get(2)?)?,
        amount: Money::from_cents(row.get(3)?),
        initial_balance: Money::from_cents(row.get(4)?),
        final_balance: Money::from_cents(row.get(5)?),
        description: row.get(6)?,
        created_by: row.get(7)?,
        created_at: from_timestamp(row.get(8)?),
    })
}

impl<'a> TransactionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, tx: &AccountTransaction) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO account_transactions (betting_pool_id, kind, amount, initial_balance,
                final_balance, description, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tx.betting_pool_id,
                tx.kind.as_str(),
                tx.amount.cents(),
                tx.initial_balance.cents(),
                tx.final_balance.cents(),
                tx.description,
                tx.created_by,
                to_timestamp(tx.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list(&self, filter: &TransactionFilter) -> Result<Vec<AccountTransaction>> {
        let mut sql_filter = SqlFilter::new();
        if let Some(pool_id) = filter.betting_pool_id {
            sql_filter.push("betting_pool_id = ?", pool_id);
        }
        if let Some(from) = filter.from {
            sql_filter.push("created_at >= ?", to_timestamp(from));
        }
        if let Some(to) = filter.to {
            sql_filter.push("created_at <= ?", to_timestamp(to));
        }

        let sql = format!(
            "SELECT id, betting_pool_id, kind, amount, initial_balance, final_balance, description,
                created_by, created_at
             FROM account_transactions{} ORDER BY created_at, id",
            sql_filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_filter.params()), transaction_from_row)?;

        let mut transactions = Vec::new();
        for tx in rows {
            transactions.push(tx?);
        }
        Ok(transactions)
    }
}
