// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the signup capture service.
//!
//! The configuration object deserializes from JSON using the camelCase keys
//! the landing page deployment already knows about (`emailProvider`,
//! `emailApiKey`, `emailFrom`, `emailTo`, `storageMode`). Anything not
//! supplied falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the signup capture service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Name used in outgoing email copy
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Email delivery configuration
    #[serde(flatten)]
    pub email: EmailConfig,

    /// Signup persistence configuration
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Supported email providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Resend,
    Sendgrid,
}

impl std::str::FromStr for EmailProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resend" => Ok(Self::Resend),
            "sendgrid" => Ok(Self::Sendgrid),
            other => Err(format!("unknown email provider: {other}")),
        }
    }
}

/// Email delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    /// Provider used when an API key is present (default: resend)
    #[serde(default = "default_email_provider")]
    pub email_provider: EmailProvider,

    /// Provider credential. Absent means dry-run mode.
    #[serde(default)]
    pub email_api_key: Option<String>,

    /// Sender address for both templates
    #[serde(default = "default_email_from")]
    pub email_from: String,

    /// Operator address receiving the signup notice
    #[serde(default = "default_email_to")]
    pub email_to: String,
}

/// Where accepted signups go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Append to a JSON array file
    File,
    /// Accept without persisting
    None,
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "none" => Ok(Self::None),
            other => Err(format!("unknown storage mode: {other}")),
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Signup persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Storage mode (default: file)
    #[serde(default = "default_storage_mode")]
    pub storage_mode: StorageMode,

    /// JSON array file (default: data/signups.json)
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Lock acquisition attempts before giving up (default: 10)
    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,

    /// Delay between lock attempts in milliseconds (default: 100)
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Maximum submissions per source address per window (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Sliding window length in seconds (default: 900)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Field caps applied by the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Maximum characters kept from `name` (default: 100)
    #[serde(default = "default_name_max_chars")]
    pub name_max_chars: usize,

    /// Maximum characters kept from `userAgent` and `referrer` (default: 500)
    #[serde(default = "default_meta_max_chars")]
    pub meta_max_chars: usize,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_site_name() -> String {
    "IndieWeb2 Bastion".to_string()
}

fn default_email_provider() -> EmailProvider {
    EmailProvider::Resend
}

fn default_email_from() -> String {
    "noreply@example.com".to_string()
}

fn default_email_to() -> String {
    "admin@example.com".to_string()
}

fn default_storage_mode() -> StorageMode {
    StorageMode::File
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/signups.json")
}

fn default_lock_attempts() -> u32 {
    10
}

fn default_lock_retry_ms() -> u64 {
    100
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_name_max_chars() -> usize {
    100
}

fn default_meta_max_chars() -> usize {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            site_name: default_site_name(),
            email: EmailConfig::default(),
            storage: StorageConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            email_provider: default_email_provider(),
            email_api_key: None,
            email_from: default_email_from(),
            email_to: default_email_to(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_mode: default_storage_mode(),
            storage_path: default_storage_path(),
            lock_attempts: default_lock_attempts(),
            lock_retry_ms: default_lock_retry_ms(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            name_max_chars: default_name_max_chars(),
            meta_max_chars: default_meta_max_chars(),
        }
    }
}

impl EmailConfig {
    /// The configured credential, treating a blank key as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.email_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Dry-run mode: no credential, nothing is transmitted.
    pub fn is_dry_run(&self) -> bool {
        self.api_key().is_none()
    }
}

impl StorageConfig {
    /// Sidecar file holding the advisory lock.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.storage_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Get the delay between lock attempts
    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }
}

impl RateLimitConfig {
    /// Get the sliding window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_duration(), Duration::from_secs(900));
        assert_eq!(config.storage.lock_attempts, 10);
        assert_eq!(config.storage.lock_retry_delay(), Duration::from_millis(100));
        assert_eq!(config.validation.name_max_chars, 100);
        assert!(config.email.is_dry_run());
    }

    #[test]
    fn test_deserialize_recognized_keys() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "emailProvider": "sendgrid",
            "emailApiKey": "SG.key",
            "emailFrom": "hello@launch.example",
            "emailTo": "ops@launch.example",
            "storageMode": "none"
        }))
        .unwrap();

        assert_eq!(config.email.email_provider, EmailProvider::Sendgrid);
        assert_eq!(config.email.api_key(), Some("SG.key"));
        assert_eq!(config.email.email_from, "hello@launch.example");
        assert_eq!(config.email.email_to, "ops@launch.example");
        assert_eq!(config.storage.storage_mode, StorageMode::None);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_blank_api_key_is_dry_run() {
        let email = EmailConfig {
            email_api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(email.is_dry_run());
    }

    #[test]
    fn test_lock_path_is_sidecar() {
        let storage = StorageConfig {
            storage_path: PathBuf::from("/var/lib/signups.json"),
            ..Default::default()
        };
        assert_eq!(storage.lock_path(), PathBuf::from("/var/lib/signups.json.lock"));
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("FILE".parse::<StorageMode>().unwrap(), StorageMode::File);
        assert_eq!(" resend ".parse::<EmailProvider>().unwrap(), EmailProvider::Resend);
        assert!("postmark".parse::<EmailProvider>().is_err());
    }
}
