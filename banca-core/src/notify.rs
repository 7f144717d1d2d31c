//! Real-time notification bus.
//!
//! Services publish [`Event`]s addressed to one or more [`Audience`] groups.
//! Hub connections subscribe to the bus and forward whatever matches the
//! groups they joined.

use crate::catalog::BetType;
use crate::types::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    Global,
    BettingPool(i64),
    Zone(i64),
    Draw(i64),
    User(i64),
}

impl Audience {
    pub fn group_name(&self) -> String {
        match self {
            Audience::Global => "global".to_string(),
            Audience::BettingPool(id) => format!("bettingpool_{}", id),
            Audience::Zone(id) => format!("zone_{}", id),
            Audience::Draw(id) => format!("draw_{}", id),
            Audience::User(id) => format!("user_{}", id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketNotice {
    pub ticket_id: i64,
    pub ticket_code: String,
    pub betting_pool_id: i64,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitNotice {
    pub draw_id: i64,
    pub draw_date: NaiveDate,
    pub bet_type: BetType,
    pub bet_number: String,
    pub used: Money,
    pub cap: Money,
    pub percent_used: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRuleNotice {
    pub limit_id: i64,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultNotice {
    pub draw_id: i64,
    pub draw_name: String,
    pub result_date: NaiveDate,
    pub numbers: Vec<String>,
    pub winning_tickets: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesNotice {
    pub betting_pool_id: i64,
    pub date: NaiveDate,
    pub total_sold: Money,
    pub ticket_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub title: String,
    pub message: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    TicketCreated(TicketNotice),
    TicketCancelled(TicketNotice),
    TicketWon(TicketNotice),
    TicketPaid(TicketNotice),
    LimitWarning(LimitNotice),
    LimitReached(LimitNotice),
    LimitUpdated(LimitRuleNotice),
    ResultPublished(ResultNotice),
    SalesUpdate(SalesNotice),
    SystemAnnouncement(Announcement),
    Pong(Pong),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl Notification {
    pub fn new(event: Event) -> Self {
        Self {
            notification_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub audiences: Vec<Audience>,
    pub notification: Notification,
}

impl Envelope {
    pub fn is_for(&self, groups: &std::collections::HashSet<Audience>) -> bool {
        self.audiences.iter().any(|a| groups.contains(a))
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Arc<Envelope>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to the given groups. Returns the number of live subscribers;
    /// zero subscribers is not an error.
    pub fn publish(&self, audiences: Vec<Audience>, event: Event) -> usize {
        let envelope = Envelope {
            audiences,
            notification: Notification::new(event),
        };
        match self.tx.send(Arc::new(envelope)) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("No hub subscribers for notification");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.tx.subscribe()
    }
}
