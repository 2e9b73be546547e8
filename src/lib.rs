// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Signup Capture
//!
//! Backend for the coming-soon landing page email signup form:
//!
//! - Payload validation and sanitizing (email grammar, consent, markup stripping)
//! - Per-source sliding window rate limiting (5 per 15 minutes default)
//! - Append-only JSON file storage under a cross-process file lock
//! - Operator notice and subscriber confirmation emails (Resend or SendGrid)
//! - Dry-run mode when no provider key is configured
//!
//! One [`SignupService`] implements the pipeline; the HTTP server and the
//! function adapter in [`transport`] only translate requests into it.

pub mod config;
pub mod error;
pub mod limiter;
pub mod notifier;
pub mod service;
pub mod signup;
pub mod store;
pub mod transport;
pub mod validator;

pub use config::Config;
pub use error::SignupError;
pub use limiter::{RateLimit, RateLimitResult, SlidingWindowLimiter};
pub use notifier::{EmailTransport, Notifier};
pub use service::{SignupService, SubmitReply, SubmitResponse};
pub use signup::Signup;
pub use store::{JsonFileStore, NullStore, SignupStore, StoreError};
pub use validator::{SignupValidator, ValidationError};
