// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Function-as-a-service adapter.
//!
//! Serverless platforms hand the function a JSON event describing the HTTP
//! request and expect a JSON description of the response back. This module
//! maps that shape onto [`SignupService::handle`].

use super::{first_forwarded, UNKNOWN_SOURCE};
use crate::service::{SignupService, SubmitResponse};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Headers checked, in order, for the caller's address.
const SOURCE_HEADERS: &[&str] = &["x-forwarded-for", "x-nf-client-connection-ip", "client-ip"];

/// Incoming function event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRequest {
    pub http_method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Function response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FunctionRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn source_address(&self) -> String {
        SOURCE_HEADERS
            .iter()
            .filter_map(|name| self.header(name))
            .find_map(first_forwarded)
            .unwrap_or(UNKNOWN_SOURCE)
            .to_string()
    }

    fn body_bytes(&self) -> Option<Vec<u8>> {
        let body = self.body.as_deref().unwrap_or_default();
        if self.is_base64_encoded {
            base64::engine::general_purpose::STANDARD.decode(body).ok()
        } else {
            Some(body.as_bytes().to_vec())
        }
    }
}

/// Handle one function invocation.
pub async fn handle_event(service: &SignupService, event: FunctionRequest) -> FunctionResponse {
    match event.http_method.to_ascii_uppercase().as_str() {
        "OPTIONS" => return respond(204, None, String::new()),
        "POST" => {}
        other => {
            debug!(method = %other, "Rejecting non-POST invocation");
            return json_response(405, None, false, "Method not allowed");
        }
    }

    let source = event.source_address();
    // An undecodable base64 body becomes an empty body, which fails parsing.
    let body = event.body_bytes().unwrap_or_default();
    let reply = service.handle(&source, &body).await;

    json_response(
        reply.status,
        reply.retry_after_secs,
        reply.body.success,
        &reply.body.message,
    )
}

fn json_response(status: u16, retry_after: Option<u64>, success: bool, message: &str) -> FunctionResponse {
    let body = SubmitResponse {
        success,
        message: message.to_string(),
    };
    // Serializing a bool and a string cannot fail.
    let body = serde_json::to_string(&body).unwrap_or_default();
    let mut response = respond(status, retry_after, body);
    response
        .headers
        .insert("Content-Type".to_string(), "application/json".to_string());
    response
}

fn respond(status: u16, retry_after: Option<u64>, body: String) -> FunctionResponse {
    let mut headers = BTreeMap::from([
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ("Access-Control-Allow-Headers".to_string(), "Content-Type".to_string()),
        ("Access-Control-Allow-Methods".to_string(), "POST, OPTIONS".to_string()),
    ]);
    if let Some(secs) = retry_after {
        headers.insert("Retry-After".to_string(), secs.to_string());
    }
    FunctionResponse {
        status_code: status,
        headers,
        body,
    }
}
