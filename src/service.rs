// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Signup request handling, independent of transport.
//!
//! Every entry point (the HTTP server, the function adapter) funnels into
//! [`SignupService::handle`]:
//!
//! receive → rate limit → parse → validate → build → store → notify admin
//! → confirm subscriber → respond
//!
//! Failures before the store step have no side effects beyond the rate limit
//! record. Notification failures after the store step are absorbed.

use crate::config::{Config, StorageMode};
use crate::error::{Result, SignupError};
use crate::limiter::{RateLimit, RateLimitResult, SlidingWindowLimiter};
use crate::notifier::Notifier;
use crate::signup::Signup;
use crate::store::{JsonFileStore, NullStore, SignupStore};
use crate::validator::{SignupValidator, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Message returned for an accepted signup.
pub const SUCCESS_MESSAGE: &str = "Successfully subscribed! Check your email for confirmation.";

/// Body returned for every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
}

/// Transport-neutral outcome of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReply {
    pub status: u16,
    pub body: SubmitResponse,
    pub retry_after_secs: Option<u64>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub dry_run: bool,
    pub storage_mode: StorageMode,
}

/// Orchestrates the signup pipeline.
pub struct SignupService {
    limiter: Arc<dyn RateLimit>,
    validator: SignupValidator,
    store: Arc<dyn SignupStore>,
    notifier: Notifier,
    storage_mode: StorageMode,
}

impl SignupService {
    /// Wire the default collaborators from configuration.
    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn SignupStore> = match config.storage.storage_mode {
            StorageMode::File => Arc::new(JsonFileStore::new(&config.storage)),
            StorageMode::None => Arc::new(NullStore),
        };

        Self::new(
            Arc::new(SlidingWindowLimiter::new(config.rate_limit.clone())),
            SignupValidator::new(config.validation.clone()),
            store,
            Notifier::from_config(&config.email, &config.site_name),
            config.storage.storage_mode,
        )
    }

    pub fn new(
        limiter: Arc<dyn RateLimit>,
        validator: SignupValidator,
        store: Arc<dyn SignupStore>,
        notifier: Notifier,
        storage_mode: StorageMode,
    ) -> Self {
        Self {
            limiter,
            validator,
            store,
            notifier,
            storage_mode,
        }
    }

    pub fn limiter(&self) -> Arc<dyn RateLimit> {
        self.limiter.clone()
    }

    pub fn store(&self) -> Arc<dyn SignupStore> {
        self.store.clone()
    }

    pub fn is_dry_run(&self) -> bool {
        self.notifier.is_dry_run()
    }

    /// Run the pipeline for a raw body received from `source`.
    pub async fn submit(&self, source: &str, body: &[u8]) -> Result<Signup> {
        if let RateLimitResult::Limited { retry_after } = self.limiter.check(source).await {
            info!(source = %source, retry_after_secs = retry_after.as_secs(), "Submission rate limited");
            return Err(SignupError::RateLimited { retry_after });
        }

        let payload: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            debug!(source = %source, error = %e, "Unparsable request body");
            ValidationError::InvalidBody
        })?;

        let input = self.validator.validate(&payload).map_err(|e| {
            info!(source = %source, reason = %e, "Signup rejected");
            e
        })?;

        let signup = Signup::accept(input, source);

        if let Err(e) = self.store.append(&signup).await {
            error!(id = %signup.id, error = %e, "Failed to store signup");
            return Err(e.into());
        }

        self.notifier.notify_admin(&signup).await;
        self.notifier.confirm_subscriber(&signup).await;

        info!(id = %signup.id, source = %source, "Signup accepted");
        Ok(signup)
    }

    /// Run the pipeline and map the outcome to a reply.
    pub async fn handle(&self, source: &str, body: &[u8]) -> SubmitReply {
        match self.submit(source, body).await {
            Ok(_) => SubmitReply {
                status: 200,
                body: SubmitResponse {
                    success: true,
                    message: SUCCESS_MESSAGE.to_string(),
                },
                retry_after_secs: None,
            },
            Err(e) => SubmitReply {
                status: e.status_code(),
                body: SubmitResponse {
                    success: false,
                    message: e.public_message(),
                },
                retry_after_secs: e.retry_after_secs(),
            },
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            dry_run: self.is_dry_run(),
            storage_mode: self.storage_mode,
        }
    }
}
