use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use governor::{clock::{Clock, DefaultClock}, DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::{config::RateLimitConfig, AppError, AppResult};

// Idle keys are dropped once the table grows past this.
const SHRINK_AT: usize = 10_000;

/// Per-IP request budget shared by every API route. A client may spend the
/// whole budget at once; it then refills evenly over the window.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    max_requests: u32,
}

impl RateLimit {
    pub fn new(config: &RateLimitConfig) -> RateLimit {
        let max_requests = NonZeroU32::new(config.max_requests).unwrap_or(NonZeroU32::MIN);
        let period = config.window / max_requests.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(max_requests))
            .allow_burst(max_requests);

        debug!(window = ?config.window, max_requests = max_requests.get(), "rate limiter ready");

        RateLimit {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            max_requests: max_requests.get(),
        }
    }

    fn check(&self, ip: IpAddr) -> Option<u64> {
        if self.limiter.len() > SHRINK_AT {
            self.limiter.retain_recent();
        }

        match self.limiter.check_key(&ip) {
            Ok(()) => None,
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Some(wait.as_secs().max(1))
            }
        }
    }
}

/// Requests that arrive without a peer address (in-process callers) share
/// one bucket.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(
    State(limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let ip = client_ip(&request);

    if let Some(retry_after) = limit.check(ip) {
        warn!(%ip, path = request.uri().path(), retry_after, "rate limit exceeded");
        return Err(AppError::RateLimited { retry_after });
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(limit.max_requests),
    );
    Ok(response)
}
