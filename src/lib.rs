// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # hcloud-dns-sync - Hetzner Cloud private network to DNS
//!
//! Keeps an authoritative DNS zone in sync with the servers attached to a Hetzner
//! Cloud private network. Every server resolves by hostname to its private address;
//! servers leaving the network lose their records.
//!
//! ## Overview
//!
//! Each run is a stateless batch pass:
//!
//! - Fetch the servers on the network from the Hetzner Cloud API
//! - Read the zone's current A/AAAA records with a TSIG-signed zone transfer
//! - Compute the minimal ordered change set
//! - Apply it with TSIG-signed RFC 2136 dynamic updates
//!
//! ## Modules
//!
//! - [`config`] - Run configuration and validation
//! - [`inventory`] - Hetzner Cloud API client (desired state)
//! - [`zone_reader`] - Zone transfer client (observed state)
//! - [`records`] - Record model and owned name space
//! - [`diff`] - Pure diff engine
//! - [`update`] - Batched, signed dynamic updates with retries
//! - [`reconciler`] - Orchestration of a run and its summary
//!
//! ## Example
//!
//! ```rust,no_run
//! use hcloud_dns_sync::config::{Config, ServerAddress};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server: ServerAddress = "udp://10.0.0.2:53".parse()?;
//! let config = Config::new(
//!     "internal.example.com",
//!     server,
//!     "/etc/hcloud-dns-sync/tsig.key",
//!     "sync-key",
//!     "backend",
//!     std::env::var("HCLOUD_API_TOKEN")?,
//! );
//!
//! let summary = hcloud_dns_sync::reconciler::run(&config).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod diff;
pub mod errors;
pub mod inventory;
pub mod reconciler;
pub mod records;
pub mod retry;
pub mod tsig;
pub mod update;
pub mod zone_reader;

pub use config::Config;
pub use errors::RunError;
pub use reconciler::{run, Reconciler, Summary};
