//! Sliding-window admission control
//!
//! In-memory, single-process, best-effort: a protective gate in front of the
//! loan transaction service, not a correctness mechanism.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// Per-client sliding window of request timestamps.
///
/// Timestamps are inserted in monotonic order, so eviction only ever pops
/// from the front of each queue (amortized O(1) per check).
pub struct SlidingWindowRateLimiter {
    capacity: usize,
    window: Duration,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request for `client_id`, recording its timestamp
    /// when admitted.
    pub fn check(&self, client_id: &str) -> bool {
        self.check_at(client_id, Instant::now())
    }

    fn check_at(&self, client_id: &str, now: Instant) -> bool {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let window = clients.entry(client_id.to_string()).or_default();

        while let Some(front) = window.front() {
            if now.duration_since(*front) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.capacity {
            window.push_back(now);
            true
        } else {
            false
        }
    }
}

/// Axum middleware gating requests before they reach the loan service
pub async fn admission_control(
    State(state): State<crate::AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_id = client_identity(&request);
    if !state.rate_limiter.check(&client_id) {
        tracing::warn!("Rate limit exceeded for client {}", client_id);
        return Err(AppError::RateLimited(
            "Too many requests. Please try again in a minute.".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Caller identity: first hop of `x-forwarded-for` when present (deployments
/// behind a proxy), otherwise the socket peer address.
fn client_identity(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
