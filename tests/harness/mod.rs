// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for signup abuse simulation.
//!
//! Builds services wired to temporary storage and recording email
//! transports, plus generators for hostile payloads.

pub mod generators;

use async_trait::async_trait;
use signup_capture::{
    config::{Config, EmailConfig, StorageMode},
    notifier::{EmailMessage, EmailTransport, Notifier, NotifyError},
    JsonFileStore, SignupService, SignupValidator, SlidingWindowLimiter,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Transport that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Transport that always fails like a provider outage.
pub struct FailingTransport;

#[async_trait]
impl EmailTransport for FailingTransport {
    async fn send(&self, _message: &EmailMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Provider {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

/// A service over a temporary signups file.
pub struct TestService {
    pub service: SignupService,
    pub store: JsonFileStore,
    pub dir: TempDir,
}

/// Build a file-backed service. `transport: None` runs in dry-run mode.
pub fn file_service(transport: Option<Arc<dyn EmailTransport>>) -> TestService {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.storage_path = dir.path().join("signups.json");
    config.email = EmailConfig {
        email_from: "hello@launch.example".to_string(),
        email_to: "ops@launch.example".to_string(),
        ..Default::default()
    };

    let store = JsonFileStore::new(&config.storage);
    let service = SignupService::new(
        Arc::new(SlidingWindowLimiter::new(config.rate_limit.clone())),
        SignupValidator::new(config.validation.clone()),
        Arc::new(store.clone()),
        Notifier::new(transport, &config.email, "Launch"),
        StorageMode::File,
    );

    TestService {
        service,
        store,
        dir,
    }
}
