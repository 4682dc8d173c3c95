// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state inventory from the Hetzner Cloud API.
//!
//! # Lookups
//!
//! 1. `GET /networks?name=<name>` resolves the private network to an id
//! 2. `GET /servers?page=N&per_page=50` lists servers, following
//!    `meta.pagination.next_page`
//! 3. Servers attached to the network contribute their name and the `ip` of the
//!    matching `private_net` entry
//!
//! Every failure is fatal for the run and nothing is retried: the next scheduled
//! run is the retry.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use crate::constants::{HCLOUD_PAGE_SIZE, USER_AGENT};
use crate::errors::InventoryError;
use crate::records::NetworkServer;

/// Source of the servers attached to a private network.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Fetch the servers attached to `network_name`.
    ///
    /// # Errors
    ///
    /// Returns an [`InventoryError`] when the inventory cannot be fetched completely.
    async fn fetch(&self, network_name: &str) -> Result<Vec<NetworkServer>, InventoryError>;
}

#[derive(Debug, Deserialize)]
struct NetworksResponse {
    networks: Vec<Network>,
}

#[derive(Debug, Deserialize)]
struct Network {
    id: u64,
    name: String,
    #[serde(default)]
    servers: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<Server>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Server {
    id: u64,
    name: String,
    #[serde(default)]
    private_net: Vec<PrivateNet>,
}

#[derive(Debug, Deserialize)]
struct PrivateNet {
    network: u64,
    #[serde(default)]
    ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next_page: Option<u32>,
}

/// Hetzner Cloud API client.
pub struct HcloudInventory {
    client: HttpClient,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for HcloudInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HcloudInventory")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HcloudInventory {
    /// Client for the API at `base_url` (e.g. `https://api.hetzner.cloud/v1`).
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InventoryUnavailable`] when the URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InventoryError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            InventoryError::InventoryUnavailable {
                reason: format!("invalid API base URL '{base_url}': {e}"),
            }
        })?;

        let client = HttpClient::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| InventoryError::InventoryUnavailable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// URL of an API collection with query parameters.
    fn endpoint(&self, collection: &str, query: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!(
            "{}/{collection}",
            self.base_url.path().trim_end_matches('/')
        ));
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    /// GET `url` and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, InventoryError> {
        let unavailable = |reason: String| InventoryError::InventoryUnavailable { reason };

        debug!(url = %url, "HTTP API request to Hetzner Cloud");

        let response = self
            .client
            .get(url.clone())
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| unavailable(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                url = %url,
                status = %status,
                error = %error_text,
                "Hetzner Cloud API request failed"
            );
            let reason = if status.as_u16() == 401 || status.as_u16() == 403 {
                format!("API token rejected (HTTP {status})")
            } else {
                format!("HTTP {status}: {error_text}")
            };
            return Err(unavailable(reason));
        }

        let text = response
            .text()
            .await
            .map_err(|e| unavailable(format!("failed to read response body: {e}")))?;

        serde_json::from_str(&text)
            .map_err(|e| unavailable(format!("failed to decode response from {url}: {e}")))
    }

    async fn find_network(&self, network_name: &str) -> Result<Network, InventoryError> {
        let url = self.endpoint("networks", &[("name", network_name.to_string())]);
        let response: NetworksResponse = self.get_json(url).await?;

        let mut matches: Vec<Network> = response
            .networks
            .into_iter()
            .filter(|n| n.name == network_name)
            .collect();

        match matches.len() {
            0 => Err(InventoryError::NetworkNotFound {
                network: network_name.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(InventoryError::AmbiguousNetwork {
                network: network_name.to_string(),
                count,
            }),
        }
    }

    async fn list_servers(&self) -> Result<Vec<Server>, InventoryError> {
        let mut servers = Vec::new();
        let mut page = 1;

        loop {
            let url = self.endpoint(
                "servers",
                &[
                    ("page", page.to_string()),
                    ("per_page", HCLOUD_PAGE_SIZE.to_string()),
                ],
            );
            let response: ServersResponse = self.get_json(url).await?;
            servers.extend(response.servers);

            match response.meta.and_then(|m| m.pagination.next_page) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(servers)
    }
}

#[async_trait]
impl InventorySource for HcloudInventory {
    #[tracing::instrument(skip_all, fields(network = %network_name))]
    async fn fetch(&self, network_name: &str) -> Result<Vec<NetworkServer>, InventoryError> {
        let network = self.find_network(network_name).await?;
        let servers = self.list_servers().await?;
        let members = network_members(&network, servers)?;

        info!(
            network = %network_name,
            network_id = network.id,
            servers = members.len(),
            "Fetched private network inventory"
        );
        Ok(members)
    }
}

/// Servers attached to `network`, with their address on it.
fn network_members(
    network: &Network,
    servers: Vec<Server>,
) -> Result<Vec<NetworkServer>, InventoryError> {
    let listed: HashSet<u64> = network.servers.iter().copied().collect();
    let mut members = Vec::new();

    for server in servers {
        let attachment = server
            .private_net
            .iter()
            .find(|net| net.network == network.id);

        if attachment.is_none() && !listed.contains(&server.id) {
            continue;
        }

        let ip = attachment
            .and_then(|net| net.ip.as_deref())
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| InventoryError::InventoryUnavailable {
                reason: format!(
                    "server '{}' is attached to network '{}' but has no address on it",
                    server.name, network.name
                ),
            })?;

        let private_address: IpAddr =
            ip.parse()
                .map_err(|e| InventoryError::InventoryUnavailable {
                    reason: format!(
                        "server '{}' has invalid private address '{ip}': {e}",
                        server.name
                    ),
                })?;

        members.push(NetworkServer {
            hostname: server.name,
            private_address,
        });
    }

    Ok(members)
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod inventory_tests;
