// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for hcloud-dns-sync.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries, zone transfers and dynamic updates
pub const DNS_PORT: u16 = 53;

/// Default TTL for managed A/AAAA records (10 minutes)
pub const DEFAULT_RECORD_TTL_SECS: u32 = 600;

/// TSIG fudge window in seconds (RFC 8945 recommends 300)
pub const TSIG_FUDGE_TIME_SECS: u64 = 300;

/// Conservative UPDATE message budget for UDP transport (RFC 1035 classic limit)
pub const UDP_MAX_MESSAGE_BYTES: usize = 512;

/// UPDATE message budget for TCP transport
pub const TCP_MAX_MESSAGE_BYTES: usize = 16_384;

/// Bytes reserved in every message for the TSIG record appended at signing time
pub const TSIG_RESERVED_BYTES: usize = 160;

/// Upper bound on update operations packed into a single message
pub const DEFAULT_MAX_OPERATIONS_PER_MESSAGE: usize = 64;

/// Number of update messages allowed in flight at once
pub const DEFAULT_UPDATE_CONCURRENCY: usize = 4;

/// EDNS payload size advertised on UPDATE messages
pub const EDNS_MAX_PAYLOAD: u16 = 1232;

// ============================================================================
// Timeout Constants
// ============================================================================

/// Default timeout for a single provider API or DNS request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Extra time granted to a blocking DNS exchange before the async guard gives up
pub const DNS_TIMEOUT_GRACE_MILLIS: u64 = 500;

// ============================================================================
// Retry Constants
// ============================================================================

/// Total attempts (first try included) for a transiently failing update message
pub const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Delay before the first update retry
pub const UPDATE_RETRY_INITIAL_MILLIS: u64 = 200;

/// Ceiling for the delay between update retries
pub const UPDATE_RETRY_MAX_MILLIS: u64 = 5_000;

/// Backoff multiplier (exponential growth factor)
pub const BACKOFF_MULTIPLIER: u32 = 2;

// ============================================================================
// Hetzner Cloud API Constants
// ============================================================================

/// Base URL of the Hetzner Cloud API
pub const HCLOUD_API_BASE_URL: &str = "https://api.hetzner.cloud/v1";

/// Environment variable carrying the Hetzner Cloud API token
pub const HCLOUD_TOKEN_ENV: &str = "HCLOUD_API_TOKEN";

/// Page size used when listing servers
pub const HCLOUD_PAGE_SIZE: u32 = 50;

/// User agent sent with provider API requests
pub const USER_AGENT: &str = concat!("hcloud-dns-sync/", env!("CARGO_PKG_VERSION"));
