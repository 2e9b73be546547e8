// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Signup payload validator.
//!
//! Turns an untyped request body into sanitized [`SignupInput`] fields.
//! Rules are applied in order and the first failure wins:
//! - Body must be a JSON object
//! - `email` must be present and a string
//! - Trimmed, lower-cased email must match the address grammar
//! - `consent` must be truthy
//!
//! Optional fields are sanitized rather than rejected. `name` loses only
//! complete tags; `userAgent`, `referrer` and `timestamp` are capped and then
//! lose any tag left open by the cap.

use crate::config::ValidationConfig;
use crate::signup::SignupInput;
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Validation error types. The display text is shown to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid request body")]
    InvalidBody,

    #[error("Email is required")]
    MissingEmail,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Consent is required")]
    MissingConsent,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$",
        )
        .expect("email pattern is valid")
    })
}

/// Signup payload validator.
pub struct SignupValidator {
    config: ValidationConfig,
}

impl SignupValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a parsed request body.
    pub fn validate(&self, body: &Value) -> Result<SignupInput, ValidationError> {
        let Value::Object(fields) = body else {
            debug!("Request body is not an object");
            return Err(ValidationError::InvalidBody);
        };

        let email = match fields.get("email") {
            Some(Value::String(email)) => email.trim().to_lowercase(),
            _ => {
                debug!("Missing email field");
                return Err(ValidationError::MissingEmail);
            }
        };

        if !is_valid_email(&email) {
            debug!(email = %email, "Email failed grammar check");
            return Err(ValidationError::InvalidEmail);
        }

        if !fields.get("consent").is_some_and(is_truthy) {
            debug!(email = %email, "Consent not given");
            return Err(ValidationError::MissingConsent);
        }

        let name = string_field(fields, "name")
            .map(|name| truncate_chars(strip_markup(name).trim(), self.config.name_max_chars))
            .filter(|name| !name.is_empty());

        let timestamp = self
            .sanitize_meta(fields, "timestamp")
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        Ok(SignupInput {
            email,
            name,
            consent: true,
            timestamp,
            user_agent: self.sanitize_meta(fields, "userAgent"),
            referrer: self.sanitize_meta(fields, "referrer"),
        })
    }

    /// Truncate first, then strip markup (including a tag cut open by the cap).
    fn sanitize_meta(&self, fields: &Map<String, Value>, key: &str) -> Option<String> {
        string_field(fields, key)
            .map(|raw| strip_tags(&truncate_chars(raw, self.config.meta_max_chars)))
            .filter(|value| !value.is_empty())
    }
}

/// Check an already-normalized address against the grammar.
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email_pattern().is_match(email)
}

/// Dynamic-language truthiness: false, null, 0, "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Remove every `<...>` span. An unterminated trailing `<...` is dropped too.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Remove complete `<...>` spans only. A `<` with no closing `>` is dropped
/// on its own and the text after it is kept.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        rest = match rest[open..].find('>') {
            Some(close) => &rest[open + close + 1..],
            None => &rest[open + 1..],
        };
    }
    out.push_str(rest);
    out
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn default_validator() -> SignupValidator {
        SignupValidator::new(ValidationConfig::default())
    }

    #[test]
    fn test_valid_payload_is_normalized() {
        let input = default_validator()
            .validate(&json!({"name": "Ada", "email": "  ADA@Example.COM ", "consent": true}))
            .unwrap();

        assert_eq!(input.email, "ada@example.com");
        assert_eq!(input.name.as_deref(), Some("Ada"));
        assert!(input.consent);
        assert!(!input.timestamp.is_empty());
    }

    #[test]
    fn test_rejects_non_object_body() {
        let validator = default_validator();
        for body in [json!(null), json!("email"), json!([1, 2]), json!(42)] {
            assert_eq!(validator.validate(&body), Err(ValidationError::InvalidBody));
        }
    }

    #[test]
    fn test_rejects_missing_or_non_string_email() {
        let validator = default_validator();
        assert_eq!(
            validator.validate(&json!({"consent": true})),
            Err(ValidationError::MissingEmail)
        );
        assert_eq!(
            validator.validate(&json!({"email": 12, "consent": true})),
            Err(ValidationError::MissingEmail)
        );
    }

    #[test]
    fn test_rejects_malformed_email() {
        let validator = default_validator();
        for email in ["not-an-email", "", "a@", "@b.com", "a b@c.com", "a@-b.com", "a@b..com"] {
            let result = validator.validate(&json!({"email": email, "consent": true}));
            assert_eq!(result, Err(ValidationError::InvalidEmail), "{email:?} should be rejected");
            assert!(result.unwrap_err().to_string().to_lowercase().contains("email"));
        }
    }

    #[test]
    fn test_email_checked_before_consent() {
        let result = default_validator().validate(&json!({"email": "nope", "consent": false}));
        assert_eq!(result, Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn test_rejects_falsy_consent() {
        let validator = default_validator();
        for consent in [json!(false), json!(null), json!(0), json!("")] {
            assert_eq!(
                validator.validate(&json!({"email": "a@b.com", "consent": consent})),
                Err(ValidationError::MissingConsent)
            );
        }
        assert_eq!(
            validator.validate(&json!({"email": "a@b.com"})),
            Err(ValidationError::MissingConsent)
        );
    }

    #[test]
    fn test_truthy_consent_values() {
        let validator = default_validator();
        for consent in [json!(true), json!(1), json!("yes"), json!("false"), json!({})] {
            assert!(validator
                .validate(&json!({"email": "a@b.com", "consent": consent}))
                .is_ok());
        }
    }

    #[test]
    fn test_name_is_stripped_and_capped() {
        let validator = default_validator();
        let input = validator
            .validate(&json!({
                "email": "a@b.com",
                "consent": true,
                "name": "  <b>Grace</b> <script>alert(1)</script>Hopper "
            }))
            .unwrap();
        assert_eq!(input.name.as_deref(), Some("Grace alert(1)Hopper"));

        let long = "x".repeat(250);
        let input = validator
            .validate(&json!({"email": "a@b.com", "consent": true, "name": long}))
            .unwrap();
        assert_eq!(input.name.unwrap().chars().count(), 100);
    }

    #[test]
    fn test_name_keeps_text_after_lone_angle_bracket() {
        let input = default_validator()
            .validate(&json!({"email": "a@b.com", "consent": true, "name": " Tom <3 Jerry "}))
            .unwrap();
        assert_eq!(input.name.as_deref(), Some("Tom 3 Jerry"));
    }

    #[test]
    fn test_markup_only_name_is_absent() {
        let input = default_validator()
            .validate(&json!({"email": "a@b.com", "consent": true, "name": "<img src=x>"}))
            .unwrap();
        assert_eq!(input.name, None);
    }

    #[test]
    fn test_meta_fields_never_keep_markup() {
        let validator = default_validator();
        // A tag straddling the 500 char cap leaves an unterminated fragment.
        let user_agent = format!("{}<script>evil</script>", "a".repeat(495));
        let input = validator
            .validate(&json!({
                "email": "a@b.com",
                "consent": true,
                "userAgent": user_agent,
                "referrer": "https://ref.example/<i>x</i>"
            }))
            .unwrap();

        let ua = input.user_agent.unwrap();
        assert_eq!(ua, "a".repeat(495));
        assert_eq!(input.referrer.as_deref(), Some("https://ref.example/x"));
    }

    #[test]
    fn test_supplied_timestamp_is_kept() {
        let input = default_validator()
            .validate(&json!({
                "email": "a@b.com",
                "consent": true,
                "timestamp": "2026-03-01T12:00:00.000Z"
            }))
            .unwrap();
        assert_eq!(input.timestamp, "2026-03-01T12:00:00.000Z");
    }

    #[test]
    fn test_supplied_timestamp_is_stripped_and_capped() {
        let validator = default_validator();
        let input = validator
            .validate(&json!({
                "email": "a@b.com",
                "consent": true,
                "timestamp": "2026-03-01<script>x</script>T12:00:00Z"
            }))
            .unwrap();
        assert_eq!(input.timestamp, "2026-03-01xT12:00:00Z");

        let input = validator
            .validate(&json!({"email": "a@b.com", "consent": true, "timestamp": "9".repeat(2000)}))
            .unwrap();
        assert_eq!(input.timestamp.chars().count(), 500);

        // Nothing left after stripping falls back to server time.
        let input = validator
            .validate(&json!({"email": "a@b.com", "consent": true, "timestamp": "<b></b>"}))
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&input.timestamp).is_ok());
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("a<b>c</b>d"), "acd");
        assert_eq!(strip_markup("Tom <3 Jerry"), "Tom 3 Jerry");
        assert_eq!(strip_markup("x < y"), "x  y");
        assert_eq!(strip_markup("1 > 0"), "1 > 0");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("plain"), "plain");
        assert_eq!(strip_tags("a<b>c</b>d"), "acd");
        assert_eq!(strip_tags("tail <scr"), "tail ");
        assert_eq!(strip_tags("1 > 0"), "1 > 0");
    }

    #[test]
    fn test_email_grammar() {
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
        assert!(is_valid_email("o'brien@example.ie"));
        assert!(!is_valid_email("UPPER@example.com"));
        assert!(!is_valid_email("trailing@example.com."));
    }
}
