use super::{ensure_pool_access, TicketDesk};
use crate::error::Result;
use banca_core::notify::Event;
use banca_core::storage::{PoolStore, Ticket, TicketListTotals, TicketQuery, TicketStore};
use banca_core::types::{Page, PageRequest, TicketStatus};
use banca_core::validation::Validator;
use banca_core::{BetType, Claims, CoreError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const PAYMENT_METHODS: [&str; 4] = ["cash", "transfer", "check", "card"];

pub const TICKET_ALREADY_CANCELLED: &str = "TICKET_ALREADY_CANCELLED";
pub const TICKET_ALREADY_PAID: &str = "TICKET_ALREADY_PAID";
pub const CANCELLATION_TIME_EXPIRED: &str = "CANCELLATION_TIME_EXPIRED";
pub const TICKET_CANCELLED: &str = "TICKET_CANCELLED";
pub const TICKET_WITHOUT_PRIZE: &str = "TICKET_WITHOUT_PRIZE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub betting_pool_id: Option<i64>,
    pub lottery_id: Option<i64>,
    pub draw_id: Option<i64>,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub zone_ids: Vec<i64>,
    /// `all`, `winner`, `pending`, `loser`, `cancelled` or `paid`.
    pub status: Option<String>,
    pub bet_type: Option<BetType>,
    pub bet_number: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl TicketFilter {
    fn has_criteria(&self) -> bool {
        self.betting_pool_id.is_some()
            || self.lottery_id.is_some()
            || self.draw_id.is_some()
            || self.date.is_some()
            || !self.zone_ids.is_empty()
            || self.status.is_some()
            || self.bet_type.is_some()
            || self.bet_number.as_deref().map_or(false, |n| !n.trim().is_empty())
            || self.search.as_deref().map_or(false, |s| !s.trim().is_empty())
    }

    fn status(&self) -> Result<Option<TicketStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
            Some(s) => s
                .to_ascii_uppercase()
                .parse::<TicketStatus>()
                .map(Some)
                .map_err(|_| {
                    CoreError::invalid(
                        "status",
                        "must be one of all, winner, pending, loser, cancelled, paid",
                    )
                    .into()
                }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPage {
    #[serde(flatten)]
    pub page: Page<Ticket>,
    pub totals: TicketListTotals,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTicket {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayTicket {
    pub payment_method: String,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

impl TicketDesk {
    /// Look up a ticket with its lines. Users bound to a betting pool can
    /// only read that pool's tickets.
    pub async fn get_ticket(&self, id: i64, claims: &Claims) -> Result<Ticket> {
        let ticket = self.load_ticket(id).await?;
        ensure_pool_access(claims, ticket.betting_pool_id, "read tickets")?;
        Ok(ticket)
    }

    pub async fn get_by_barcode(&self, barcode: &str, claims: &Claims) -> Result<Ticket> {
        let conn = self.office.storage().get_connection().await;
        let store = TicketStore::new(&conn);
        let mut ticket = store
            .get_by_barcode(barcode.trim())?
            .ok_or_else(|| CoreError::not_found("Ticket", barcode))?;
        ensure_pool_access(claims, ticket.betting_pool_id, "read tickets")?;
        ticket.lines = store.lines_for(ticket.id)?;
        Ok(ticket)
    }

    pub(crate) async fn load_ticket(&self, id: i64) -> Result<Ticket> {
        let conn = self.office.storage().get_connection().await;
        let store = TicketStore::new(&conn);
        let mut ticket = store
            .get(id)?
            .ok_or_else(|| CoreError::not_found("Ticket", id))?;
        ticket.lines = store.lines_for(id)?;
        Ok(ticket)
    }

    /// Search tickets. Users bound to a betting pool only see that pool.
    pub async fn filter_tickets(&self, filter: TicketFilter, claims: &Claims) -> Result<TicketPage> {
        if !filter.has_criteria() {
            return Err(CoreError::invalid("filter", "at least one search criterion is required").into());
        }
        let page = PageRequest::from_parts(filter.page, filter.page_size);
        page.validate()?;

        let betting_pool_id = match (claims.admin, claims.pool) {
            (false, Some(bound)) => Some(bound),
            _ => filter.betting_pool_id,
        };
        let query = TicketQuery {
            betting_pool_id,
            user_id: None,
            lottery_id: filter.lottery_id,
            draw_id: filter.draw_id,
            date: filter.date,
            zone_ids: filter.zone_ids.clone(),
            status: filter.status()?,
            bet_type: filter.bet_type,
            bet_number: filter.bet_number.as_ref().map(|n| n.trim().to_string()),
            search: filter.search.clone(),
        };

        let conn = self.office.storage().get_connection().await;
        let (tickets, total, totals) = TicketStore::new(&conn).search(&query, page)?;
        Ok(TicketPage {
            page: Page::new(tickets, page, total),
            totals,
        })
    }

    pub async fn cancel_ticket(&self, id: i64, request: CancelTicket, claims: &Claims) -> Result<Ticket> {
        let mut v = Validator::new();
        v.required(&request.reason, "reason")
            .max_len(&request.reason, "reason", 250);
        v.finish()?;

        let now = Utc::now();
        let (ticket, zone_id) = {
            let mut conn = self.office.storage().get_connection().await;
            let tx = conn.transaction()?;
            let tickets = TicketStore::new(&tx);
            let pools = PoolStore::new(&tx);

            let ticket = tickets
                .get(id)?
                .ok_or_else(|| CoreError::not_found("Ticket", id))?;
            ensure_pool_access(claims, ticket.betting_pool_id, "cancel tickets")?;
            match ticket.status {
                TicketStatus::Cancelled => {
                    return Err(CoreError::rule(TICKET_ALREADY_CANCELLED, "The ticket is already cancelled").into())
                }
                TicketStatus::Paid => {
                    return Err(CoreError::rule(TICKET_ALREADY_PAID, "A paid ticket cannot be cancelled").into())
                }
                _ => {}
            }

            let cancel_minutes = pools
                .get_config(ticket.betting_pool_id)?
                .cancel_minutes
                .unwrap_or(self.office.config().default_cancel_minutes);
            let elapsed = now - ticket.created_at;
            if elapsed.num_seconds() > cancel_minutes * 60 {
                return Err(CoreError::rule_with(
                    CANCELLATION_TIME_EXPIRED,
                    format!("Tickets can only be cancelled within {} minutes", cancel_minutes),
                    json!({ "maxMinutes": cancel_minutes }),
                )
                .into());
            }

            tickets.mark_cancelled(id, claims.user_id(), request.reason.trim(), now)?;
            let zone_id = pools.get(ticket.betting_pool_id)?.map(|p| p.zone_id);
            tx.commit()?;
            (ticket, zone_id)
        };

        tracing::info!(
            "Cancelled ticket {} by user {}: {}",
            ticket.code,
            claims.user_id(),
            request.reason.trim()
        );

        let ticket = self.load_ticket(ticket.id).await?;
        self.publish_ticket(
            Event::TicketCancelled,
            &ticket,
            zone_id,
            Some(request.reason.trim().to_string()),
        );
        Ok(ticket)
    }

    pub async fn pay_ticket(&self, id: i64, request: PayTicket, claims: &Claims) -> Result<Ticket> {
        let method = request.payment_method.trim().to_ascii_lowercase();
        let mut v = Validator::new();
        v.check(
            PAYMENT_METHODS.contains(&method.as_str()),
            "paymentMethod",
            format!("must be one of {}", PAYMENT_METHODS.join(", ")),
        )
        .optional_max_len(request.payment_reference.as_deref(), "paymentReference", 100);
        v.finish()?;

        let now = Utc::now();
        let (ticket, zone_id) = {
            let mut conn = self.office.storage().get_connection().await;
            let tx = conn.transaction()?;
            let tickets = TicketStore::new(&tx);

            let ticket = tickets
                .get(id)?
                .ok_or_else(|| CoreError::not_found("Ticket", id))?;
            ensure_pool_access(claims, ticket.betting_pool_id, "pay tickets")?;
            match ticket.status {
                TicketStatus::Cancelled => {
                    return Err(CoreError::rule(TICKET_CANCELLED, "A cancelled ticket cannot be paid").into())
                }
                TicketStatus::Paid => {
                    return Err(CoreError::rule(TICKET_ALREADY_PAID, "The ticket is already paid").into())
                }
                _ => {}
            }
            if !ticket.total_prize.is_positive() {
                return Err(CoreError::rule(TICKET_WITHOUT_PRIZE, "The ticket has no prize to pay").into());
            }

            tickets.mark_paid(id, claims.user_id(), &method, request.payment_reference.as_deref(), now)?;
            let zone_id = PoolStore::new(&tx).get(ticket.betting_pool_id)?.map(|p| p.zone_id);
            tx.commit()?;
            (ticket, zone_id)
        };

        tracing::info!(
            "Paid ticket {} ({}) by user {} via {}",
            ticket.code,
            ticket.total_prize,
            claims.user_id(),
            method
        );

        let ticket = self.load_ticket(ticket.id).await?;
        self.publish_ticket(Event::TicketPaid, &ticket, zone_id, None);
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::testing::{claims_for, fixture};
    use crate::desk::{CreateTicket, NewTicketLine};
    use crate::error::LotteryError;
    use banca_core::Money;

    fn directo(draw_id: i64, number: &str) -> NewTicketLine {
        NewTicketLine {
            draw_id,
            bet_number: number.to_string(),
            bet_type: BetType::Directo,
            bet_amount: Money::from_units(10),
            multiplier: 0,
        }
    }

    async fn sell(f: &crate::desk::testing::Fixture, number: &str) -> Ticket {
        let request = CreateTicket {
            betting_pool_id: f.pool.id,
            ticket_date: None,
            global_multiplier: 1,
            apply_discount: false,
            allow_past_date: false,
            lines: vec![directo(f.draw.id, number)],
            customer_name: Some("Maria Perez".to_string()),
            customer_phone: None,
            customer_email: None,
            terminal_id: None,
            ip_address: None,
        };
        f.desk.create_ticket(request, &f.seller).await.unwrap()
    }

    fn rule_code(err: LotteryError) -> String {
        match err {
            LotteryError::Core(CoreError::Rule { code, .. }) => code,
            other => panic!("expected a rule violation, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_by_id_and_barcode() {
        let f = fixture().await;
        let ticket = sell(&f, "11").await;

        let by_id = f.desk.get_ticket(ticket.id, &f.seller).await.unwrap();
        assert_eq!(by_id.code, ticket.code);
        assert_eq!(by_id.lines.len(), 1);

        let by_barcode = f.desk.get_by_barcode(&ticket.barcode, &f.seller).await.unwrap();
        assert_eq!(by_barcode.id, ticket.id);

        assert!(matches!(
            f.desk.get_ticket(9999, &f.admin).await,
            Err(LotteryError::Core(CoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_seller_of_another_pool_is_forbidden() {
        let f = fixture().await;
        let ticket = sell(&f, "15").await;
        let outsider = claims_for(77, Some(f.pool.id + 100), false, &[]);
        let forbidden = |r: Result<Ticket>| matches!(r, Err(LotteryError::Core(CoreError::Forbidden(_))));

        assert!(forbidden(f.desk.get_ticket(ticket.id, &outsider).await));
        assert!(forbidden(f.desk.get_by_barcode(&ticket.barcode, &outsider).await));
        assert!(forbidden(
            f.desk
                .cancel_ticket(
                    ticket.id,
                    CancelTicket {
                        reason: "ajena".to_string(),
                    },
                    &outsider,
                )
                .await
        ));
        assert!(forbidden(
            f.desk
                .pay_ticket(
                    ticket.id,
                    PayTicket {
                        payment_method: "cash".to_string(),
                        payment_reference: None,
                    },
                    &outsider,
                )
                .await
        ));

        let untouched = f.desk.get_ticket(ticket.id, &f.admin).await.unwrap();
        assert_eq!(untouched.status, TicketStatus::Pending);
        assert!(untouched.cancelled_by.is_none());
    }

    #[tokio::test]
    async fn test_failed_cancel_leaves_ticket_and_lines_untouched() {
        let f = fixture().await;
        let ticket = sell(&f, "16").await;
        {
            let conn = f.desk.backoffice().storage().get_connection().await;
            conn.execute_batch(
                "CREATE TRIGGER lines_locked BEFORE UPDATE ON ticket_lines
                 BEGIN SELECT RAISE(ABORT, 'lines locked'); END;",
            )
            .unwrap();
        }

        let result = f
            .desk
            .cancel_ticket(
                ticket.id,
                CancelTicket {
                    reason: "error".to_string(),
                },
                &f.seller,
            )
            .await;
        assert!(result.is_err());

        let reloaded = f.desk.get_ticket(ticket.id, &f.admin).await.unwrap();
        assert_eq!(reloaded.status, TicketStatus::Pending);
        assert!(reloaded.cancelled_at.is_none());
        assert!(reloaded
            .lines
            .iter()
            .all(|l| l.status == banca_core::types::LineStatus::Pending));
    }

    #[tokio::test]
    async fn test_cancel_twice() {
        let f = fixture().await;
        let ticket = sell(&f, "12").await;
        let reason = CancelTicket {
            reason: "Cliente desistió".to_string(),
        };

        let cancelled = f.desk.cancel_ticket(ticket.id, reason.clone(), &f.seller).await.unwrap();
        assert_eq!(cancelled.status, TicketStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(f.seller.sub));
        assert!(cancelled
            .lines
            .iter()
            .all(|l| l.status == banca_core::types::LineStatus::Cancelled));

        let err = f.desk.cancel_ticket(ticket.id, reason, &f.seller).await.unwrap_err();
        assert_eq!(rule_code(err), TICKET_ALREADY_CANCELLED);
    }

    #[tokio::test]
    async fn test_cancel_after_window() {
        let f = fixture().await;
        let ticket = sell(&f, "13").await;
        {
            let conn = f.desk.backoffice().storage().get_connection().await;
            conn.execute(
                "UPDATE tickets SET created_at = created_at - 600 WHERE id = ?1",
                [ticket.id],
            )
            .unwrap();
        }

        let err = f
            .desk
            .cancel_ticket(
                ticket.id,
                CancelTicket {
                    reason: "tarde".to_string(),
                },
                &f.seller,
            )
            .await
            .unwrap_err();
        match err {
            LotteryError::Core(CoreError::Rule { code, details, .. }) => {
                assert_eq!(code, CANCELLATION_TIME_EXPIRED);
                assert_eq!(details["maxMinutes"], json!(5));
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[tokio::test]
    async fn test_pay_requires_prize() {
        let f = fixture().await;
        let ticket = sell(&f, "14").await;

        let pay = PayTicket {
            payment_method: "cash".to_string(),
            payment_reference: None,
        };
        let err = f.desk.pay_ticket(ticket.id, pay, &f.seller).await.unwrap_err();
        assert_eq!(rule_code(err), TICKET_WITHOUT_PRIZE);

        let bad_method = PayTicket {
            payment_method: "voucher".to_string(),
            payment_reference: None,
        };
        assert!(matches!(
            f.desk.pay_ticket(ticket.id, bad_method, &f.seller).await,
            Err(LotteryError::Core(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_filter_tickets() {
        let f = fixture().await;
        let first = sell(&f, "21").await;
        sell(&f, "22").await;
        f.desk
            .cancel_ticket(
                first.id,
                CancelTicket {
                    reason: "error".to_string(),
                },
                &f.seller,
            )
            .await
            .unwrap();

        assert!(f.desk.filter_tickets(TicketFilter::default(), &f.admin).await.is_err());

        let all = f
            .desk
            .filter_tickets(
                TicketFilter {
                    betting_pool_id: Some(f.pool.id),
                    status: Some("all".to_string()),
                    ..TicketFilter::default()
                },
                &f.admin,
            )
            .await
            .unwrap();
        assert_eq!(all.page.total_count, 2);
        assert_eq!(all.totals.cancelled_count, 1);
        assert_eq!(all.totals.total_sold, Money::from_units(10));

        let pending = f
            .desk
            .filter_tickets(
                TicketFilter {
                    status: Some("pending".to_string()),
                    bet_number: Some("22".to_string()),
                    ..TicketFilter::default()
                },
                &f.seller,
            )
            .await
            .unwrap();
        assert_eq!(pending.page.items.len(), 1);
        assert_eq!(pending.page.items[0].lines.len(), 0);

        let bad_status = TicketFilter {
            status: Some("lost".to_string()),
            ..TicketFilter::default()
        };
        assert!(f.desk.filter_tickets(bad_status, &f.admin).await.is_err());
    }
}
