// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

use async_trait::async_trait;
use hcloud_dns_sync::errors::ZoneReadError;
use hcloud_dns_sync::records::{ManagedRecord, ObservedState};
use hcloud_dns_sync::retry::FailureKind;
use hcloud_dns_sync::update::UpdateTransport;
use hcloud_dns_sync::zone_reader::ZoneReader;
use hickory_proto::op::{Message, ResponseCode, UpdateMessage};
use hickory_proto::rr::{DNSClass, Name};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory authoritative zone that serves transfers and applies UPDATE messages.
#[derive(Clone, Default)]
pub struct InMemoryZone {
    records: Arc<Mutex<BTreeSet<ManagedRecord>>>,
    messages: Arc<Mutex<usize>>,
}

impl InMemoryZone {
    pub fn with_records(records: impl IntoIterator<Item = ManagedRecord>) -> Self {
        let zone = Self::default();
        zone.records.lock().unwrap().extend(records);
        zone
    }

    pub fn records(&self) -> Vec<ManagedRecord> {
        self.records.lock().unwrap().iter().cloned().collect()
    }

    pub fn messages(&self) -> usize {
        *self.messages.lock().unwrap()
    }
}

#[async_trait]
impl ZoneReader for InMemoryZone {
    async fn fetch(&self, zone: &Name) -> Result<ObservedState, ZoneReadError> {
        Ok(ObservedState::new(zone, self.records()))
    }
}

#[async_trait]
impl UpdateTransport for InMemoryZone {
    fn server(&self) -> String {
        "udp://127.0.0.1:53".to_string()
    }

    async fn exchange(&self, message: Message) -> Result<ResponseCode, FailureKind> {
        *self.messages.lock().unwrap() += 1;

        let mut records = self.records.lock().unwrap();
        for update in message.updates() {
            let Ok(Some(record)) = ManagedRecord::from_wire(update) else {
                return Ok(ResponseCode::FormErr);
            };
            if update.dns_class() == DNSClass::NONE {
                records.retain(|existing| {
                    !(existing.key() == record.key() && existing.address == record.address)
                });
            } else {
                records.insert(record);
            }
        }
        Ok(ResponseCode::NoError)
    }
}

/// Serve a network named `network` (id 42) holding `servers` as (name, private ip).
pub async fn mount_network(server: &MockServer, network: &str, servers: &[(&str, &str)]) {
    let ids: Vec<u64> = (1..=servers.len() as u64).collect();
    Mock::given(method("GET"))
        .and(path("/v1/networks"))
        .and(query_param("name", network))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "networks": [{ "id": 42, "name": network, "servers": ids }]
        })))
        .mount(server)
        .await;

    let listed: Vec<serde_json::Value> = servers
        .iter()
        .zip(ids)
        .map(|((name, ip), id)| {
            json!({
                "id": id,
                "name": name,
                "private_net": [{ "network": 42, "ip": ip }]
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/v1/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "servers": listed,
            "meta": { "pagination": { "page": 1, "next_page": null } }
        })))
        .mount(server)
        .await;
}
