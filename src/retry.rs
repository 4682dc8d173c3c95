// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry policy with bounded exponential backoff for dynamic updates.
//!
//! The policy is a pure function of the attempt number and the failure kind, so it
//! can be tested without a clock. Transient failures (timeouts, I/O errors, SERVFAIL)
//! are retried; TSIG, authorization and malformed-request statuses fail fast since
//! repeating them cannot change a key or policy mismatch.
//!
//! # Retry Schedule
//!
//! With the defaults, a transiently failing message is tried at most three times:
//!
//! 1. immediately
//! 2. after 200ms
//! 3. after 400ms

use std::fmt;
use std::time::Duration;

use hickory_proto::op::ResponseCode;

use crate::constants::{
    BACKOFF_MULTIPLIER, MAX_UPDATE_ATTEMPTS, UPDATE_RETRY_INITIAL_MILLIS, UPDATE_RETRY_MAX_MILLIS,
};

/// Why an update attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// No response within the request timeout
    Timeout,
    /// Connection or socket failure
    Io(String),
    /// The exchange failed on TSIG signing or verification
    Tsig(String),
    /// The server answered with a non-success response code
    Status(ResponseCode),
}

impl FailureKind {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Io(_) => true,
            Self::Tsig(_) => false,
            Self::Status(code) => *code == ResponseCode::ServFail,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("request timed out"),
            Self::Io(reason) => write!(f, "I/O error: {reason}"),
            Self::Tsig(reason) => write!(f, "TSIG failure: {reason}"),
            Self::Status(code) => write!(f, "server returned {code}"),
        }
    }
}

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wait this long, then try again
    RetryAfter(Duration),
    /// Stop and report the failure
    GiveUp,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Ceiling for any single delay
    pub max_interval: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_UPDATE_ATTEMPTS,
            initial_interval: Duration::from_millis(UPDATE_RETRY_INITIAL_MILLIS),
            max_interval: Duration::from_millis(UPDATE_RETRY_MAX_MILLIS),
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Policy retrying up to `max_attempts` times without waiting.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed with `failure`.
    #[must_use]
    pub fn decide(&self, attempt: u32, failure: &FailureKind) -> Decision {
        if !failure.is_transient() || attempt >= self.max_attempts {
            return Decision::GiveUp;
        }
        Decision::RetryAfter(self.delay_before_retry(attempt))
    }

    /// Delay after the `attempt`-th failure: `initial * multiplier^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_before_retry(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
