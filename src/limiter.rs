// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding window rate limiter for signup submissions.
//!
//! Each source address keeps the timestamps of its accepted submissions for
//! the trailing window (15 minutes by default). A submission is allowed while
//! fewer than `max_requests` timestamps remain in the window.
//!
//! State is process-local and resets on restart. The handler only sees the
//! [`RateLimit`] trait, so a shared counter can replace it.

use crate::config::RateLimitConfig;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining submissions in the current window
        remaining: u32,
    },
    /// Request is rate limited
    Limited {
        /// Time until the oldest submission leaves the window
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Gate for repeated submissions from one source.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Check `key` and record the submission if it is allowed.
    async fn check(&self, key: &str) -> RateLimitResult;

    /// Drop state that can no longer affect a decision.
    async fn cleanup(&self) {}

    /// Convenience wrapper over [`RateLimit::check`].
    async fn allow(&self, key: &str) -> bool {
        self.check(key).await.is_allowed()
    }
}

/// In-process sliding window limiter.
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    windows: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Number of source addresses currently tracked.
    pub async fn tracked_sources(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[async_trait]
impl RateLimit for SlidingWindowLimiter {
    async fn check(&self, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let window = self.config.window_duration();

        let mut windows = self.windows.write().await;
        let times = windows.entry(key.to_string()).or_default();

        while times
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            times.pop_front();
        }

        let max = self.config.max_requests as usize;
        if times.len() >= max {
            let retry_after = times
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            debug!(source = %key, ?retry_after, "Submission rate limit exceeded");
            return RateLimitResult::Limited { retry_after };
        }

        times.push_back(now);
        RateLimitResult::Allowed {
            remaining: (max - times.len()) as u32,
        }
    }

    async fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window_duration();

        let mut windows = self.windows.write().await;
        windows.retain(|_, times| {
            times.retain(|t| now.duration_since(*t) < window);
            !times.is_empty()
        });
    }
}
