use super::{date_to_sql, from_timestamp, parse_date, parse_json, to_timestamp, SqlFilter};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Winning numbers of one draw on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawResult {
    pub id: i64,
    pub draw_id: i64,
    pub result_date: NaiveDate,
    /// First, second and third prize, two digits each.
    pub numbers: Vec<String>,
    pub cash3: Option<String>,
    pub play4: Option<String>,
    pub pick5: Option<String>,
    pub published_by: i64,
    pub published_at: DateTime<Utc>,
}

pub struct ResultStore<'a> {
    conn: &'a Connection,
}

const RESULT_COLUMNS: &str =
    "id, draw_id, result_date, numbers, cash3, play4, pick5, published_by, published_at";

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<DrawResult> {
    Ok(DrawResult {
        id: row.get(0)?,
        draw_id: row.get(1)?,
        result_date: parse_date(2, row.get(2)?)?,
        numbers: parse_json(3, row.get(3)?)?,
        cash3: row.get(4)?,
        play4: row.get(5)?,
        pick5: row.get(6)?,
        published_by: row.get(7)?,
        published_at: from_timestamp(row.get(8)?),
    })
}

impl<'a> ResultStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or correct the result for (draw, date). Returns the row id.
    pub fn upsert(&self, result: &DrawResult) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO draw_results (draw_id, result_date, numbers, cash3, play4, pick5, published_by, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (draw_id, result_date) DO UPDATE SET
                numbers = excluded.numbers, cash3 = excluded.cash3, play4 = excluded.play4,
                pick5 = excluded.pick5, published_by = excluded.published_by,
                published_at = excluded.published_at",
            params![
                result.draw_id,
                date_to_sql(result.result_date),
                serde_json::to_string(&result.numbers)?,
                result.cash3,
                result.play4,
                result.pick5,
                result.published_by,
                to_timestamp(result.published_at),
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM draw_results WHERE draw_id = ?1 AND result_date = ?2",
            params![result.draw_id, date_to_sql(result.result_date)],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get(&self, draw_id: i64, date: NaiveDate) -> Result<Option<DrawResult>> {
        let sql = format!(
            "SELECT {} FROM draw_results WHERE draw_id = ?1 AND result_date = ?2",
            RESULT_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![draw_id, date_to_sql(date)], result_from_row)
            .optional()?)
    }

    pub fn list(&self, date: Option<NaiveDate>, draw_id: Option<i64>) -> Result<Vec<DrawResult>> {
        let mut filter = SqlFilter::new();
        if let Some(date) = date {
            filter.push("result_date = ?", date_to_sql(date));
        }
        if let Some(draw_id) = draw_id {
            filter.push("draw_id = ?", draw_id);
        }
        let sql = format!(
            "SELECT {} FROM draw_results{} ORDER BY result_date DESC, draw_id",
            RESULT_COLUMNS,
            filter.where_sql()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.params()), result_from_row)?;

        let mut results = Vec::new();
        for result in rows {
            results.push(result?);
        }
        Ok(results)
    }
}
