use crate::rate_limit::RateLimiter;
use banca_core::Backoffice;
use banca_lottery::TicketDesk;
use std::sync::Arc;

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub office: Arc<Backoffice>,
    pub desk: Arc<TicketDesk>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(office: Arc<Backoffice>) -> Self {
        let limiter = Arc::new(RateLimiter::new(&office.config().rate_limit));
        Self {
            desk: Arc::new(TicketDesk::new(office.clone())),
            office,
            limiter,
        }
    }
}
