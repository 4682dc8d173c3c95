// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end reconciliation tests
//!
//! A wiremock server stands in for the Hetzner Cloud API and an in-memory zone
//! stands in for the authoritative DNS server. Runs go through the public API.

mod common;

use common::{mount_network, InMemoryZone};
use hcloud_dns_sync::config::UpdateOptions;
use hcloud_dns_sync::errors::{InventoryError, RunError};
use hcloud_dns_sync::inventory::HcloudInventory;
use hcloud_dns_sync::records::{parse_zone_name, ManagedRecord};
use hcloud_dns_sync::retry::RetryPolicy;
use hcloud_dns_sync::update::UpdateClient;
use hcloud_dns_sync::{Reconciler, Summary};
use hickory_proto::rr::Name;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

const ZONE: &str = "internal.example.com";

fn zone() -> Name {
    parse_zone_name(ZONE).unwrap()
}

fn record(host: &str, ip: &str) -> ManagedRecord {
    ManagedRecord::new(
        Name::from_str(&format!("{host}.{ZONE}.")).unwrap(),
        ip.parse().unwrap(),
        600,
    )
}

fn reconciler(api: &MockServer, dns: &InMemoryZone) -> Reconciler {
    let inventory = HcloudInventory::new(
        &format!("{}/v1", api.uri()),
        "integration-token",
        Duration::from_secs(5),
    )
    .unwrap();
    let options = UpdateOptions {
        max_operations_per_message: 2,
        ..UpdateOptions::default()
    };
    let updater = UpdateClient::with_transport(zone(), Arc::new(dns.clone()), 512, options)
        .with_retry_policy(RetryPolicy::immediate(3));

    Reconciler::new(
        zone(),
        "backend",
        600,
        Box::new(inventory),
        Box::new(dns.clone()),
        updater,
    )
}

async fn run(api: &MockServer, dns: &InMemoryZone) -> Result<Summary, RunError> {
    reconciler(api, dns).run().await
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_first_run_populates_zone_and_second_run_is_noop() {
    let api = MockServer::start().await;
    mount_network(
        &api,
        "backend",
        &[("web1", "10.0.0.5"), ("web2", "10.0.0.6"), ("db1", "fd00::7")],
    )
    .await;
    let dns = InMemoryZone::default();

    let first = run(&api, &dns).await.unwrap();
    assert_eq!(first.additions_applied, 3);
    assert!(first.is_clean());
    assert_eq!(
        dns.records(),
        vec![
            record("db1", "fd00::7"),
            record("web1", "10.0.0.5"),
            record("web2", "10.0.0.6"),
        ]
        .into_iter()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
    );

    let messages = dns.messages();
    let second = run(&api, &dns).await.unwrap();
    assert_eq!(second.unchanged, 3);
    assert_eq!(second.additions_applied + second.removals_applied, 0);
    assert_eq!(dns.messages(), messages);
}

#[tokio::test]
async fn test_membership_changes_converge() {
    let api = MockServer::start().await;
    mount_network(&api, "backend", &[("web1", "10.0.0.9"), ("web3", "10.0.0.7")]).await;
    let dns = InMemoryZone::with_records([
        record("web1", "10.0.0.5"),
        record("web2", "10.0.0.6"),
    ]);

    let summary = run(&api, &dns).await.unwrap();
    assert_eq!(summary.removals_applied, 2);
    assert_eq!(summary.additions_applied, 2);
    assert!(summary.is_clean());

    let after = run(&api, &dns).await.unwrap();
    assert_eq!(after.unchanged, 2);
    assert_eq!(after.additions_applied + after.removals_applied, 0);
}

#[tokio::test]
async fn test_inventory_outage_leaves_zone_untouched() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&api)
        .await;
    let dns = InMemoryZone::with_records([record("web1", "10.0.0.5")]);

    let result = run(&api, &dns).await;

    assert!(matches!(result, Err(RunError::Inventory(_))));
    assert_eq!(dns.messages(), 0);
    assert_eq!(dns.records(), vec![record("web1", "10.0.0.5")]);
}

#[tokio::test]
async fn test_unknown_network_is_fatal() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "networks": [] })))
        .mount(&api)
        .await;
    let dns = InMemoryZone::default();

    let result = run(&api, &dns).await;
    assert!(matches!(
        result,
        Err(RunError::Inventory(InventoryError::NetworkNotFound { .. }))
    ));
    assert_eq!(dns.messages(), 0);
}
