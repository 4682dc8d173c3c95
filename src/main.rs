// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use hcloud_dns_sync::config::{Config, ServerAddress, UpdateOptions};
use hcloud_dns_sync::constants::{
    DEFAULT_MAX_OPERATIONS_PER_MESSAGE, DEFAULT_RECORD_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_UPDATE_CONCURRENCY, HCLOUD_API_BASE_URL, HCLOUD_TOKEN_ENV, TCP_MAX_MESSAGE_BYTES,
    UDP_MAX_MESSAGE_BYTES,
};
use hcloud_dns_sync::tsig::{KeyAlgorithm, SecretEncoding};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

/// Sync the servers of a Hetzner Cloud private network into a DNS zone.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// DNS zone name, e.g. internal.example.com
    #[arg(long)]
    zone_name: String,

    /// Address of the DNS server in the format "tcp|udp://host:port"
    #[arg(long)]
    server_address: String,

    /// Path to the TSIG key: a BIND key clause, or a raw secret whose file bytes are
    /// used as the key unchanged (see --tsig-key-base64)
    #[arg(long)]
    tsig_key_path: PathBuf,

    /// Treat a raw secret key file as base64 text and decode it
    #[arg(long)]
    tsig_key_base64: bool,

    /// Name of the TSIG key
    #[arg(long)]
    tsig_key_name: String,

    /// TSIG algorithm for raw secret key files
    #[arg(long, default_value = "hmac-sha256")]
    tsig_algorithm: String,

    /// Name of the private network in the Hetzner Cloud project
    #[arg(long)]
    private_network_name: String,

    /// Hetzner Cloud API token
    #[arg(long, env = HCLOUD_TOKEN_ENV, hide_env_values = true)]
    hcloud_api_token: String,

    /// Hetzner Cloud API base URL
    #[arg(long, default_value = HCLOUD_API_BASE_URL)]
    hcloud_api_url: String,

    /// TTL of the managed records in seconds
    #[arg(long, default_value_t = DEFAULT_RECORD_TTL_SECS)]
    record_ttl: u32,

    /// Timeout for each API request and DNS exchange in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Largest UPDATE message sent over UDP, in bytes
    #[arg(long, default_value_t = UDP_MAX_MESSAGE_BYTES)]
    udp_max_message_bytes: usize,

    /// Largest UPDATE message sent over TCP, in bytes
    #[arg(long, default_value_t = TCP_MAX_MESSAGE_BYTES)]
    tcp_max_message_bytes: usize,

    /// Most operations packed into one UPDATE message
    #[arg(long, default_value_t = DEFAULT_MAX_OPERATIONS_PER_MESSAGE)]
    max_operations_per_message: usize,

    /// UPDATE messages in flight at once
    #[arg(long, default_value_t = DEFAULT_UPDATE_CONCURRENCY)]
    concurrency: usize,

    /// Compute and log the changes without applying them
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let server: ServerAddress = self
            .server_address
            .parse()
            .context("Invalid --server-address")?;
        let key_algorithm: KeyAlgorithm = self
            .tsig_algorithm
            .parse()
            .context("Invalid --tsig-algorithm")?;

        let mut config = Config::new(
            self.zone_name,
            server,
            self.tsig_key_path,
            self.tsig_key_name,
            self.private_network_name,
            self.hcloud_api_token,
        );
        config.key_algorithm = key_algorithm;
        if self.tsig_key_base64 {
            config.key_encoding = SecretEncoding::Base64;
        }
        config.api_base_url = self.hcloud_api_url;
        config.record_ttl = self.record_ttl;
        config.dry_run = self.dry_run;
        config.update = UpdateOptions {
            udp_max_message_bytes: self.udp_max_message_bytes,
            tcp_max_message_bytes: self.tcp_max_message_bytes,
            max_operations_per_message: self.max_operations_per_message,
            concurrency: self.concurrency,
            request_timeout: Duration::from_secs(self.timeout_secs),
        };
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    // Build Tokio runtime with custom thread names
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .thread_name("hcloud-dns-sync")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(args)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = ?e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(args: Args) -> Result<bool> {
    let config = args.into_config()?;
    info!(
        zone = %config.zone,
        server = %config.server,
        network = %config.network_name,
        dry_run = config.dry_run,
        "Starting hcloud-dns-sync"
    );

    let summary = hcloud_dns_sync::run(&config)
        .await
        .context("Reconciliation failed")?;

    info!(%summary, clean = summary.is_clean(), "Run summary");
    Ok(summary.is_clean())
}

/// Install the global subscriber.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or text).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
