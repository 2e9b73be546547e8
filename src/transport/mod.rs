// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Thin adapters feeding deployment-specific requests into
//! [`SignupService`](crate::service::SignupService).

pub mod function;
pub mod http;

/// Used when no source address can be determined.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// First hop of an `X-Forwarded-For` style header value.
pub fn first_forwarded(value: &str) -> Option<&str> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
}
