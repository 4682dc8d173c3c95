// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - argument parsing and conversion into `Config`

#[cfg(test)]
mod tests {
    use super::super::Args;
    use clap::Parser;
    use hcloud_dns_sync::config::Transport;
    use hcloud_dns_sync::tsig::{KeyAlgorithm, SecretEncoding};
    use std::time::Duration;

    const REQUIRED: &[&str] = &[
        "hcloud-dns-sync",
        "--zone-name",
        "internal.example.com",
        "--server-address",
        "tcp://10.0.0.2:5353",
        "--tsig-key-path",
        "/etc/tsig.key",
        "--tsig-key-name",
        "sync-key",
        "--private-network-name",
        "backend",
        "--hcloud-api-token",
        "token-123",
    ];

    #[test]
    fn test_required_arguments_build_config_with_defaults() {
        let args = Args::try_parse_from(REQUIRED).expect("arguments should parse");
        let config = args.into_config().expect("config should build");

        assert_eq!(config.zone, "internal.example.com");
        assert_eq!(config.server.transport, Transport::Tcp);
        assert_eq!(config.server.port, 5353);
        assert_eq!(config.key_name, "sync-key");
        assert_eq!(config.key_algorithm, KeyAlgorithm::HmacSha256);
        assert_eq!(config.key_encoding, SecretEncoding::Raw);
        assert_eq!(config.network_name, "backend");
        assert_eq!(config.record_ttl, 600);
        assert_eq!(config.update.request_timeout, Duration::from_secs(10));
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_argument_is_rejected() {
        let args: Vec<&str> = REQUIRED
            .iter()
            .copied()
            .filter(|a| *a != "--zone-name" && *a != "internal.example.com")
            .collect();
        assert!(Args::try_parse_from(args).is_err());
    }

    #[test]
    fn test_tunables_override_defaults() {
        let mut args = REQUIRED.to_vec();
        args.extend([
            "--record-ttl",
            "120",
            "--tsig-algorithm",
            "hmac-sha512",
            "--concurrency",
            "2",
            "--max-operations-per-message",
            "8",
            "--tsig-key-base64",
            "--dry-run",
        ]);
        let config = Args::try_parse_from(args)
            .expect("arguments should parse")
            .into_config()
            .expect("config should build");

        assert_eq!(config.record_ttl, 120);
        assert_eq!(config.key_algorithm, KeyAlgorithm::HmacSha512);
        assert_eq!(config.update.concurrency, 2);
        assert_eq!(config.update.max_operations_per_message, 8);
        assert_eq!(config.key_encoding, SecretEncoding::Base64);
        assert!(config.dry_run);
    }

    #[test]
    fn test_invalid_server_scheme_fails_conversion() {
        let args: Vec<&str> = REQUIRED
            .iter()
            .map(|a| if *a == "tcp://10.0.0.2:5353" { "http://10.0.0.2" } else { a })
            .collect();
        let parsed = Args::try_parse_from(args).expect("arguments should parse");
        assert!(parsed.into_config().is_err());
    }

    #[test]
    fn test_unknown_algorithm_fails_conversion() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--tsig-algorithm", "hmac-sha3"]);
        let parsed = Args::try_parse_from(args).expect("arguments should parse");
        assert!(parsed.into_config().is_err());
    }
}
