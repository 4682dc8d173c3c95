// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for every stage of a reconciliation run.
//!
//! This module provides specialized error types for:
//! - Invocation and key-file configuration problems
//! - Hetzner Cloud inventory lookups
//! - Zone transfers used to observe the current zone contents
//! - TSIG-signed dynamic updates (RFC 2136)
//!
//! Read-phase errors ([`InventoryError`], [`ZoneReadError`]) are always fatal and are
//! raised before anything is written. [`UpdateError`] is reported per message and
//! aggregated by the reconciler into the run summary.

use hickory_proto::op::ResponseCode;
use thiserror::Error;

use crate::diff::Change;

/// Errors in the invocation surface, raised before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required input was not supplied or is empty
    #[error("Missing required configuration value '{field}'")]
    MissingValue {
        /// The configuration field that is missing
        field: &'static str,
    },

    /// An input was supplied but cannot be used
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The configuration field that is invalid
        field: &'static str,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The DNS server address does not have the `(udp|tcp)://host:port` shape
    #[error("Invalid DNS server address '{address}': {reason}")]
    InvalidServerAddress {
        /// The address as given
        address: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The TSIG key file could not be read or parsed
    #[error("Invalid TSIG key file '{path}': {reason}")]
    InvalidKeyFile {
        /// Path of the key file
        path: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors raised while building the desired state from the provider inventory.
///
/// All variants are fatal: acting on a partial inventory would delete records for
/// servers the tool failed to see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// No private network carries the configured name
    #[error("Private network '{network}' not found in the Hetzner Cloud project")]
    NetworkNotFound {
        /// The configured network name
        network: String,
    },

    /// More than one private network carries the configured name
    #[error("Private network name '{network}' is ambiguous: {count} networks match")]
    AmbiguousNetwork {
        /// The configured network name
        network: String,
        /// How many networks matched
        count: usize,
    },

    /// The provider API could not be used (transport, auth, status or decoding failure)
    #[error("Hetzner Cloud inventory unavailable: {reason}")]
    InventoryUnavailable {
        /// Specific reason for the failure
        reason: String,
    },
}

/// Errors raised while reading the zone's current records.
///
/// All variants are fatal: a diff against an unknown or partially read zone is never
/// applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneReadError {
    /// Connection to the DNS server failed or timed out
    #[error("DNS server {server} unreachable while reading zone '{zone}': {reason}")]
    ZoneUnreachable {
        /// The zone being read
        zone: String,
        /// The DNS server (IP:port)
        server: String,
        /// Reason for the connection failure
        reason: String,
    },

    /// The server refused the zone transfer (ACL, TSIG or authority problem)
    #[error("Zone transfer for '{zone}' denied by {server} ({status})")]
    ZoneTransferDenied {
        /// The zone being read
        zone: String,
        /// The DNS server (IP:port)
        server: String,
        /// Response code or TSIG failure reported by the server
        status: String,
    },

    /// The reply could not be interpreted as records of the zone
    #[error("Malformed zone transfer response for '{zone}' from {server}: {reason}")]
    MalformedResponse {
        /// The zone being read
        zone: String,
        /// The DNS server (IP:port)
        server: String,
        /// Explanation of what is malformed
        reason: String,
    },
}

/// Errors for a single dynamic update message.
///
/// Each variant carries the operations of the failed message. The message is atomic
/// on the server, so none of those operations can be assumed applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// The server answered with a non-success response code
    #[error("DNS UPDATE rejected by {server} with response code {status} ({} operation(s) not applied)", .operations.len())]
    Rejected {
        /// The DNS server (IP:port)
        server: String,
        /// Response code returned by the server
        status: ResponseCode,
        /// Operations carried by the rejected message
        operations: Vec<Change>,
    },

    /// Transient failures persisted through every permitted attempt
    #[error("DNS UPDATE to {server} failed after {attempts} attempt(s): {reason}")]
    RetriesExhausted {
        /// The DNS server (IP:port)
        server: String,
        /// Number of attempts made
        attempts: u32,
        /// Description of the last failure
        reason: String,
        /// Operations carried by the failed message
        operations: Vec<Change>,
    },

    /// The message could not be built or sent at all
    #[error("DNS UPDATE to {server} could not be sent: {reason}")]
    Transport {
        /// The DNS server (IP:port)
        server: String,
        /// Specific reason for the failure
        reason: String,
        /// Operations carried by the message
        operations: Vec<Change>,
    },
}

impl UpdateError {
    /// Operations of the failed message.
    #[must_use]
    pub fn operations(&self) -> &[Change] {
        match self {
            Self::Rejected { operations, .. }
            | Self::RetriesExhausted { operations, .. }
            | Self::Transport { operations, .. } => operations,
        }
    }
}

/// Fatal errors that stop a run before or instead of producing a summary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Invocation inputs are missing or invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Desired state could not be fetched
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Observed state could not be fetched
    #[error(transparent)]
    ZoneRead(#[from] ZoneReadError),

    /// Two servers on the network map to the same DNS name
    #[error("Servers {first} and {second} both map to '{name}'; refusing to guess which one owns it")]
    DuplicateHostname {
        /// The colliding FQDN
        name: String,
        /// Hostname of the first server
        first: String,
        /// Hostname of the second server
        second: String,
    },

    /// A server hostname cannot be turned into a name under the zone
    #[error("Server hostname '{hostname}' is not a valid name under zone '{zone}': {reason}")]
    InvalidHostname {
        /// The offending hostname
        hostname: String,
        /// The configured zone
        zone: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
