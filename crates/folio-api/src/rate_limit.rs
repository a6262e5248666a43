//! Per-client rate limiting for the chat endpoints
//!
//! Clients are keyed by IP: the first of `X-Forwarded-For`, `X-Real-IP` and
//! `Forwarded`, then the peer address. A client holds `requests` permits that
//! refill evenly over `window_secs`; an empty bucket answers
//! `429 Too Many Requests` with the wait in seconds.

use folio_core::config::RateLimitConfig;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::{GovernorConfig, GovernorConfigBuilder},
    key_extractor::SmartIpKeyExtractor,
};

pub use tower_governor::GovernorLayer;

/// Limiter settings for the chat routes, `None` when limiting is off
pub fn chat_rate_limit_config(
    limits: &RateLimitConfig,
) -> Option<Arc<GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>>> {
    if !limits.enabled {
        return None;
    }

    let requests = limits.requests.max(1);
    let window = Duration::from_secs(limits.window_secs.max(1));
    let replenish = (window / requests).max(Duration::from_millis(1));

    let config = GovernorConfigBuilder::default()
        .period(replenish)
        .burst_size(requests)
        .key_extractor(SmartIpKeyExtractor)
        .finish();

    match config {
        Some(config) => {
            tracing::info!(
                "Chat rate limit: {} requests per {}s per client",
                requests,
                window.as_secs()
            );
            Some(Arc::new(config))
        }
        None => {
            tracing::warn!("Invalid rate limit settings {:?}; chat is unlimited", limits);
            None
        }
    }
}
