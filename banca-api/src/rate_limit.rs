//! Fixed-window request limiting per client IP.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use banca_core::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    permits: u32,
    window: Duration,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            permits: config.permits,
            window: Duration::from_secs(config.window_secs),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request. On rejection returns the seconds until the
    /// client's window resets.
    pub fn check(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut clients = self.clients.lock();
        let entry = clients.entry(ip).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.permits {
            let reset = self.window.saturating_sub(now.duration_since(entry.started));
            return Err(reset.as_secs().max(1));
        }
        entry.count += 1;
        Ok(())
    }

    /// Drop windows that have already expired.
    pub fn purge(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, w| now.duration_since(w.started) < self.window);
        before - clients.len()
    }
}

fn client_ip(request: &Request) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());
    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn limit_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);
    match state.limiter.check(ip, Instant::now()) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            tracing::warn!("Rate limit exceeded for {}", ip);
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
