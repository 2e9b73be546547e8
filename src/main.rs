// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Signup Capture Service
//!
//! Backend for the coming-soon landing page. Accepts email signups on
//! `POST /subscribe`, stores them, and sends notification emails.
//!
//! ## Configuration
//!
//! An optional JSON file named by `CONFIG_FILE` is read first (keys such as
//! `emailProvider`, `emailApiKey`, `emailFrom`, `emailTo`, `storageMode`),
//! then environment variables override it:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `EMAIL_PROVIDER`: `resend` or `sendgrid` (default: resend)
//! - `EMAIL_API_KEY`: Provider key; unset or empty means dry-run
//! - `EMAIL_FROM` / `EMAIL_TO`: Sender and operator addresses
//! - `STORAGE_MODE`: `file` or `none` (default: file)
//! - `SIGNUPS_FILE`: JSON array file (default: data/signups.json)
//! - `SITE_NAME`: Name used in email copy
//! - `RATE_LIMIT_MAX`: Submissions per source per window (default: 5)
//! - `RATE_LIMIT_WINDOW_SECS`: Window length (default: 900)

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use signup_capture::{
    config::Config,
    limiter::RateLimit,
    service::SignupService,
    transport::http::{router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = load_config()?;
    info!(
        bind_addr = %config.bind_addr,
        provider = ?config.email.email_provider,
        dry_run = config.email.is_dry_run(),
        storage_mode = %config.storage.storage_mode,
        storage_path = %config.storage.storage_path.display(),
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Starting signup capture service"
    );
    if config.email.is_dry_run() {
        warn!("No email API key configured, emails will only be logged");
    }

    let state = Arc::new(AppState {
        service: SignupService::from_config(&config),
    });

    // Spawn cleanup task
    let limiter = state.service.limiter();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid BIND_ADDR {}", config.bind_addr))?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Load configuration from `CONFIG_FILE` and environment variables.
fn load_config() -> anyhow::Result<Config> {
    let mut config = match std::env::var("CONFIG_FILE") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config file {path}"))?
        }
        Err(_) => Config::default(),
    };

    if let Ok(v) = std::env::var("BIND_ADDR") {
        config.bind_addr = v;
    }
    if let Ok(v) = std::env::var("SITE_NAME") {
        config.site_name = v;
    }
    if let Ok(v) = std::env::var("EMAIL_PROVIDER") {
        config.email.email_provider = v.parse().map_err(anyhow::Error::msg)?;
    }
    if let Ok(v) = std::env::var("EMAIL_API_KEY") {
        config.email.email_api_key = Some(v);
    }
    if let Ok(v) = std::env::var("EMAIL_FROM") {
        config.email.email_from = v;
    }
    if let Ok(v) = std::env::var("EMAIL_TO") {
        config.email.email_to = v;
    }
    if let Ok(v) = std::env::var("STORAGE_MODE") {
        config.storage.storage_mode = v.parse().map_err(anyhow::Error::msg)?;
    }
    if let Ok(v) = std::env::var("SIGNUPS_FILE") {
        config.storage.storage_path = PathBuf::from(v);
    }
    if let Some(v) = env_parse("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = v;
    }
    if let Some(v) = env_parse("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = v;
    }

    Ok(config)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
