// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! The signup record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sanitized fields produced by the validator, before acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupInput {
    pub email: String,
    pub name: Option<String>,
    pub consent: bool,
    pub timestamp: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// One accepted email-capture record, as stored in the signups file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signup {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub consent: bool,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

impl Signup {
    /// Accept validated input from `source`, assigning an id and acceptance time.
    pub fn accept(input: SignupInput, source: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: input.email,
            name: input.name,
            consent: input.consent,
            timestamp: input.timestamp,
            user_agent: input.user_agent,
            referrer: input.referrer,
            ip: source.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Name for greetings, falling back to the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}
