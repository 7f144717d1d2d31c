use super::{grade_pending, TicketDesk};
use crate::error::Result;
use crate::schedule::business_today;
use banca_core::notify::{Audience, Event, ResultNotice};
use banca_core::storage::{DrawResult, LotteryStore, ResultStore, Ticket};
use banca_core::validation::Validator;
use banca_core::{Claims, CoreError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub draw_id: i64,
    #[serde(default)]
    pub result_date: Option<NaiveDate>,
    pub numbers: Vec<String>,
    #[serde(default)]
    pub cash3: Option<String>,
    #[serde(default)]
    pub play4: Option<String>,
    #[serde(default)]
    pub pick5: Option<String>,
}

fn digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PublishResult {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.check(self.numbers.len() == 3, "numbers", "exactly three numbers are drawn");
        for (idx, number) in self.numbers.iter().enumerate() {
            v.check(
                digits(number.trim(), 2),
                &format!("numbers[{}]", idx),
                "must be two digits",
            );
        }
        for (field, value, len) in [
            ("cash3", clean(&self.cash3), 3),
            ("play4", clean(&self.play4), 4),
            ("pick5", clean(&self.pick5), 5),
        ] {
            if let Some(value) = value {
                v.check(digits(&value, len), field, format!("must be {} digits", len));
            }
        }
        Ok(v.finish()?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultQuery {
    pub draw_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub result: DrawResult,
    pub graded_lines: usize,
    pub winning_tickets: Vec<Ticket>,
}

impl TicketDesk {
    /// Store the winning numbers of a draw and grade every pending line
    /// sold for it. Publishing again for the same date corrects the numbers;
    /// lines graded earlier keep their outcome.
    pub async fn publish_result(&self, request: PublishResult, claims: &Claims) -> Result<PublishOutcome> {
        request.validate()?;

        let now = Utc::now();
        let result_date = request
            .result_date
            .unwrap_or_else(|| business_today(now, self.business_offset()));
        let mut result = DrawResult {
            id: 0,
            draw_id: request.draw_id,
            result_date,
            numbers: request.numbers.iter().map(|n| n.trim().to_string()).collect(),
            cash3: clean(&request.cash3),
            play4: clean(&request.play4),
            pick5: clean(&request.pick5),
            published_by: claims.user_id(),
            published_at: now,
        };

        let (draw, graded_lines, winners) = {
            let mut conn = self.office.storage().get_connection().await;
            let tx = conn.transaction()?;
            let draw = LotteryStore::new(&tx)
                .get_draw(request.draw_id)?
                .ok_or_else(|| CoreError::not_found("Draw", request.draw_id))?;
            result.id = ResultStore::new(&tx).upsert(&result)?;
            let (graded, winners) = grade_pending(&tx, &result)?;
            tx.commit()?;
            (draw, graded, winners)
        };

        tracing::info!(
            "Result for {} on {} published by user {}: {:?} ({} lines graded, {} winners)",
            draw.name,
            result_date,
            claims.user_id(),
            result.numbers,
            graded_lines,
            winners.len()
        );

        self.office.notifier().publish(
            vec![Audience::Global, Audience::Draw(draw.id)],
            Event::ResultPublished(ResultNotice {
                draw_id: draw.id,
                draw_name: draw.name.clone(),
                result_date,
                numbers: result.numbers.clone(),
                winning_tickets: winners.len(),
            }),
        );
        for ticket in &winners {
            self.publish_ticket(Event::TicketWon, ticket, None, None);
        }

        Ok(PublishOutcome {
            result,
            graded_lines,
            winning_tickets: winners,
        })
    }

    pub async fn list_results(&self, query: ResultQuery) -> Result<Vec<DrawResult>> {
        let conn = self.office.storage().get_connection().await;
        Ok(ResultStore::new(&conn).list(query.date, query.draw_id)?)
    }
}
