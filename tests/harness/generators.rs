// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Payload generators for abuse simulation.

use serde_json::{json, Value};

/// Generate a pool of distinct source addresses.
pub fn generate_sources(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("10.{}.{}.{}", (i >> 16) & 0xFF, (i >> 8) & 0xFF, i & 0xFF))
        .collect()
}

/// A valid signup payload for address `i`.
pub fn valid_payload(i: usize) -> Value {
    json!({
        "name": format!("Subscriber {i}"),
        "email": format!("Subscriber.{i}@Example.COM"),
        "consent": true,
    })
}

/// Malformed email addresses that must never be stored.
pub fn generate_malformed_emails() -> Vec<&'static str> {
    vec![
        "",
        "   ",
        "not-an-email",
        "@example.com",
        "user@",
        "user@@example.com",
        "user@exa mple.com",
        "user@-example.com",
        "user@example..com",
        "<script>@example.com",
        "user@example.com<script>",
    ]
}

/// Markup-laden optional fields.
pub fn generate_markup_payloads() -> Vec<Value> {
    vec![
        json!({
            "email": "xss1@example.com",
            "consent": true,
            "name": "<script>alert('x')</script>Eve",
            "userAgent": "<img src=x onerror=alert(1)>Mozilla",
            "referrer": "https://evil.example/<iframe src=//x></iframe>",
        }),
        json!({
            "email": "xss2@example.com",
            "consent": true,
            "name": "<b onmouseover=steal()>Mallory</b>",
            "userAgent": format!("{}<svg/onload=alert(1)>", "A".repeat(497)),
            "referrer": "<a href='javascript:alert(1)'>click</a>",
        }),
    ]
}
