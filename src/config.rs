// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Run configuration.
//!
//! The binary fills a [`Config`] from command-line arguments and the environment;
//! [`Config::validate`] then rejects anything unusable before a single network call
//! is made.

use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::{Host, Url};

use crate::constants::{
    DEFAULT_MAX_OPERATIONS_PER_MESSAGE, DEFAULT_RECORD_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_UPDATE_CONCURRENCY, DNS_PORT, HCLOUD_API_BASE_URL, TCP_MAX_MESSAGE_BYTES,
    TSIG_RESERVED_BYTES, UDP_MAX_MESSAGE_BYTES,
};
use crate::errors::ConfigError;
use crate::records::parse_zone_name;
use crate::tsig::{KeyAlgorithm, SecretEncoding};

/// Transport used to talk to the DNS server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Connectionless delivery (default)
    Udp,
    /// Connection-oriented delivery
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// DNS server address in the form `(udp|tcp)://<host>:<port>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    /// Transport selected by the scheme
    pub transport: Transport,
    /// Host name or IP literal
    pub host: String,
    /// Port, defaulting to 53
    pub port: u16,
}

impl ServerAddress {
    /// Resolve the address to a socket address.
    ///
    /// IP literals resolve without touching the network; host names go through the
    /// system resolver and the first result is used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServerAddress`] when the host does not resolve.
    pub fn resolve(&self) -> Result<SocketAddr, ConfigError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConfigError::InvalidServerAddress {
                address: self.to_string(),
                reason: format!("failed to resolve host: {e}"),
            })?
            .next()
            .ok_or_else(|| ConfigError::InvalidServerAddress {
                address: self.to_string(),
                reason: "host resolved to no addresses".to_string(),
            })
    }
}

impl FromStr for ServerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidServerAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(s.trim()).map_err(|e| invalid(&e.to_string()))?;
        let transport = match url.scheme() {
            "udp" => Transport::Udp,
            "tcp" => Transport::Tcp,
            _ => return Err(invalid("scheme must be udp:// or tcp://")),
        };

        if !(url.path().is_empty() || url.path() == "/") || url.query().is_some() {
            return Err(invalid("address must not carry a path or query"));
        }

        let host = match url.host() {
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            Some(Host::Domain(domain)) if !domain.is_empty() => {
                // Non-special schemes keep bracketed IPv6 literals as opaque hosts.
                domain.trim_start_matches('[').trim_end_matches(']').to_string()
            }
            _ => return Err(invalid("missing host")),
        };

        Ok(Self {
            transport,
            host,
            port: url.port().unwrap_or(DNS_PORT),
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.transport, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.transport, self.host, self.port)
        }
    }
}

/// Options controlling how a change set is packed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Largest UPDATE message sent over UDP, TSIG record included
    pub udp_max_message_bytes: usize,
    /// Largest UPDATE message sent over TCP, TSIG record included
    pub tcp_max_message_bytes: usize,
    /// Most operations packed into one message
    pub max_operations_per_message: usize,
    /// Messages in flight at once
    pub concurrency: usize,
    /// Timeout for a single request/response exchange
    pub request_timeout: Duration,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            udp_max_message_bytes: UDP_MAX_MESSAGE_BYTES,
            tcp_max_message_bytes: TCP_MAX_MESSAGE_BYTES,
            max_operations_per_message: DEFAULT_MAX_OPERATIONS_PER_MESSAGE,
            concurrency: DEFAULT_UPDATE_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl UpdateOptions {
    /// Message budget for `transport`.
    #[must_use]
    pub fn max_message_bytes(&self, transport: Transport) -> usize {
        match transport {
            Transport::Udp => self.udp_max_message_bytes,
            Transport::Tcp => self.tcp_max_message_bytes,
        }
    }
}

/// Everything one reconciliation run needs.
#[derive(Clone)]
pub struct Config {
    /// Zone the records live in, e.g. `internal.example.com`
    pub zone: String,
    /// Authoritative DNS server accepting updates and transfers
    pub server: ServerAddress,
    /// Path to the TSIG key file
    pub key_file: PathBuf,
    /// TSIG key name configured on the server
    pub key_name: String,
    /// Algorithm for raw secret key files
    pub key_algorithm: KeyAlgorithm,
    /// How raw secret key files are read
    pub key_encoding: SecretEncoding,
    /// Name of the Hetzner Cloud private network
    pub network_name: String,
    /// Hetzner Cloud API token
    pub api_token: String,
    /// Hetzner Cloud API base URL
    pub api_base_url: String,
    /// TTL for managed records
    pub record_ttl: u32,
    /// Compute and log the change set without applying it
    pub dry_run: bool,
    /// Update packing and transport options
    pub update: UpdateOptions,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("zone", &self.zone)
            .field("server", &self.server)
            .field("key_file", &self.key_file)
            .field("key_name", &self.key_name)
            .field("key_algorithm", &self.key_algorithm)
            .field("key_encoding", &self.key_encoding)
            .field("network_name", &self.network_name)
            .field("api_token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("record_ttl", &self.record_ttl)
            .field("dry_run", &self.dry_run)
            .field("update", &self.update)
            .finish()
    }
}

impl Config {
    /// Configuration with the required inputs and defaults for everything else.
    #[must_use]
    pub fn new(
        zone: impl Into<String>,
        server: ServerAddress,
        key_file: impl Into<PathBuf>,
        key_name: impl Into<String>,
        network_name: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            zone: zone.into(),
            server,
            key_file: key_file.into(),
            key_name: key_name.into(),
            key_algorithm: KeyAlgorithm::default(),
            key_encoding: SecretEncoding::default(),
            network_name: network_name.into(),
            api_token: api_token.into(),
            api_base_url: HCLOUD_API_BASE_URL.to_string(),
            record_ttl: DEFAULT_RECORD_TTL_SECS,
            dry_run: false,
            update: UpdateOptions::default(),
        }
    }

    /// Check every field without performing I/O.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("zone", &self.zone)?;
        require("key_name", &self.key_name)?;
        require("network_name", &self.network_name)?;
        require("api_token", &self.api_token)?;
        require("server", &self.server.host)?;

        if self.key_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue { field: "key_file" });
        }

        parse_zone_name(&self.zone).map_err(|e| ConfigError::InvalidValue {
            field: "zone",
            reason: format!("{e:#}"),
        })?;

        Url::parse(&self.api_base_url).map_err(|e| ConfigError::InvalidValue {
            field: "api_base_url",
            reason: e.to_string(),
        })?;

        if self.record_ttl == 0 || self.record_ttl > i32::MAX as u32 {
            return Err(ConfigError::InvalidValue {
                field: "record_ttl",
                reason: format!("{} is outside 1..=2147483647", self.record_ttl),
            });
        }

        let smallest_budget = self
            .update
            .udp_max_message_bytes
            .min(self.update.tcp_max_message_bytes);
        if smallest_budget <= TSIG_RESERVED_BYTES {
            return Err(ConfigError::InvalidValue {
                field: "max_message_bytes",
                reason: format!("must exceed the {TSIG_RESERVED_BYTES} bytes reserved for TSIG"),
            });
        }
        if self.update.tcp_max_message_bytes > usize::from(u16::MAX) {
            return Err(ConfigError::InvalidValue {
                field: "tcp_max_message_bytes",
                reason: "DNS messages are limited to 65535 bytes".to_string(),
            });
        }
        if self.update.max_operations_per_message == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_operations_per_message",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.update.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.update.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingValue { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
