// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Signup notification emails.
//!
//! Two templates are sent per accepted signup: a notice to the operator
//! address and a confirmation to the subscriber. Delivery is best effort.
//! Once a signup is stored, a failed send is logged and otherwise ignored.
//!
//! Without a provider credential the notifier runs in dry-run mode and only
//! logs what it would have sent.

use crate::config::{EmailConfig, EmailProvider};
use crate::signup::Signup;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Notification error types. Never surfaced to the caller.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Email transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Email provider rejected message with status {status}: {body}")]
    Provider { status: u16, body: String },
}

/// A rendered message ready for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Provider send API.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Resend HTTP API client.
pub struct ResendTransport {
    api_key: String,
    client: reqwest::Client,
}

impl ResendTransport {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailTransport for ResendTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": message.from,
                "to": [message.to],
                "subject": message.subject,
                "html": message.html,
            }))
            .send()
            .await?;

        check_status(response).await
    }
}

/// SendGrid v3 mail API client.
pub struct SendGridTransport {
    api_key: String,
    client: reqwest::Client,
}

impl SendGridTransport {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailTransport for SendGridTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "personalizations": [{ "to": [{ "email": message.to }] }],
                "from": { "email": message.from },
                "subject": message.subject,
                "content": [{ "type": "text/html", "value": message.html }],
            }))
            .send()
            .await?;

        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Provider {
        status: status.as_u16(),
        body,
    })
}

/// Sends the admin notice and the subscriber confirmation.
pub struct Notifier {
    transport: Option<Arc<dyn EmailTransport>>,
    from: String,
    admin_to: String,
    site_name: String,
}

impl Notifier {
    /// Build the notifier for the configured provider, or dry-run without a key.
    pub fn from_config(config: &EmailConfig, site_name: &str) -> Self {
        let transport: Option<Arc<dyn EmailTransport>> =
            config.api_key().map(|key| -> Arc<dyn EmailTransport> {
                match config.email_provider {
                    EmailProvider::Resend => Arc::new(ResendTransport::new(key.to_string())),
                    EmailProvider::Sendgrid => Arc::new(SendGridTransport::new(key.to_string())),
                }
            });
        Self::new(transport, config, site_name)
    }

    /// Build with an explicit transport. `None` means dry-run.
    pub fn new(
        transport: Option<Arc<dyn EmailTransport>>,
        config: &EmailConfig,
        site_name: &str,
    ) -> Self {
        Self {
            transport,
            from: config.email_from.clone(),
            admin_to: config.email_to.clone(),
            site_name: site_name.to_string(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.transport.is_none()
    }

    /// Send one message. Returns whether it was handed off (or logged in dry-run).
    pub async fn send_email(&self, to: &str, subject: &str, html: &str) -> bool {
        let Some(transport) = &self.transport else {
            info!(to = %to, subject = %subject, "Dry run, email not sent");
            debug!(body = %html, "Dry run email body");
            return true;
        };

        let message = EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        };

        match transport.send(&message).await {
            Ok(()) => {
                debug!(to = %to, subject = %subject, "Email sent");
                true
            }
            Err(e) => {
                warn!(to = %to, subject = %subject, error = %e, "Failed to send email");
                false
            }
        }
    }

    /// Notice to the operator address listing every field of the signup.
    pub async fn notify_admin(&self, signup: &Signup) -> bool {
        let subject = format!("New signup: {}", signup.email);
        self.send_email(&self.admin_to, &subject, &self.admin_body(signup))
            .await
    }

    /// Confirmation to the subscriber. Skipped in dry-run mode.
    pub async fn confirm_subscriber(&self, signup: &Signup) -> bool {
        if self.is_dry_run() {
            debug!(id = %signup.id, "Dry run, skipping subscriber confirmation");
            return false;
        }
        let subject = format!("Welcome to {}!", self.site_name);
        self.send_email(&signup.email, &subject, &self.confirmation_body(signup))
            .await
    }

    fn admin_body(&self, signup: &Signup) -> String {
        let rows = [
            ("ID", signup.id.as_str()),
            ("Email", signup.email.as_str()),
            ("Name", signup.name.as_deref().unwrap_or("(not provided)")),
            ("Consent", if signup.consent { "yes" } else { "no" }),
            ("Timestamp", signup.timestamp.as_str()),
            ("User agent", signup.user_agent.as_deref().unwrap_or("(unknown)")),
            ("Referrer", signup.referrer.as_deref().unwrap_or("(direct)")),
            ("IP", signup.ip.as_str()),
        ];

        let mut body = format!(
            "<h2>New signup for {}</h2>\n<table>\n",
            escape_html(&self.site_name)
        );
        for (label, value) in rows {
            body.push_str(&format!(
                "<tr><th align=\"left\">{label}</th><td>{}</td></tr>\n",
                escape_html(value)
            ));
        }
        body.push_str(&format!(
            "<tr><th align=\"left\">Received</th><td>{}</td></tr>\n</table>\n",
            signup.created_at.to_rfc3339()
        ));
        body
    }

    fn confirmation_body(&self, signup: &Signup) -> String {
        format!(
            "<p>Hi {name},</p>\n\
             <p>Thanks for signing up! You're on the list and we'll email you \
             as soon as {site} launches.</p>\n\
             <p>If you didn't sign up, you can ignore this message.</p>\n",
            name = escape_html(signup.display_name()),
            site = escape_html(&self.site_name),
        )
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signup::SignupInput;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailTransport for RecordingTransport {
        async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    struct RejectingTransport;

    #[async_trait]
    impl EmailTransport for RejectingTransport {
        async fn send(&self, _message: &EmailMessage) -> Result<(), NotifyError> {
            Err(NotifyError::Provider {
                status: 401,
                body: "bad key".to_string(),
            })
        }
    }

    fn signup() -> Signup {
        Signup::accept(
            SignupInput {
                email: "ada@example.com".to_string(),
                name: Some("Ada & co".to_string()),
                consent: true,
                timestamp: "2026-01-01T00:00:00.000Z".to_string(),
                user_agent: Some("Mozilla/5.0".to_string()),
                referrer: None,
            },
            "203.0.113.9",
        )
    }

    #[tokio::test]
    async fn test_dry_run_without_key() {
        let notifier = Notifier::from_config(&EmailConfig::default(), "Launch");
        assert!(notifier.is_dry_run());
        assert!(notifier.notify_admin(&signup()).await);
        assert!(!notifier.confirm_subscriber(&signup()).await);
    }

    #[tokio::test]
    async fn test_key_selects_live_transport() {
        let config = EmailConfig {
            email_api_key: Some("re_123".to_string()),
            ..Default::default()
        };
        assert!(!Notifier::from_config(&config, "Launch").is_dry_run());
    }

    #[tokio::test]
    async fn test_templates_reach_both_recipients() {
        let transport = Arc::new(RecordingTransport::default());
        let config = EmailConfig {
            email_from: "hello@launch.example".to_string(),
            email_to: "ops@launch.example".to_string(),
            ..Default::default()
        };
        let notifier = Notifier::new(Some(transport.clone()), &config, "Launch");
        let signup = signup();

        assert!(notifier.notify_admin(&signup).await);
        assert!(notifier.confirm_subscriber(&signup).await);

        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 2);

        assert_eq!(sent[0].to, "ops@launch.example");
        assert_eq!(sent[0].from, "hello@launch.example");
        assert_eq!(sent[0].subject, "New signup: ada@example.com");
        assert!(sent[0].html.contains(&signup.id));
        assert!(sent[0].html.contains("203.0.113.9"));
        assert!(sent[0].html.contains("Ada &amp; co"));

        assert_eq!(sent[1].to, "ada@example.com");
        assert_eq!(sent[1].subject, "Welcome to Launch!");
        assert!(sent[1].html.contains("Hi Ada &amp; co"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_swallowed() {
        let notifier = Notifier::new(
            Some(Arc::new(RejectingTransport)),
            &EmailConfig::default(),
            "Launch",
        );
        assert!(!notifier.notify_admin(&signup()).await);
        assert!(!notifier.confirm_subscriber(&signup()).await);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">'"), "&lt;a href=&quot;x&quot;&gt;&#39;");
    }
}
