// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! One reconciliation pass: inventory, zone read, diff, apply, summary.
//!
//! # Reconciliation Flow
//!
//! 1. Fetch the servers on the private network (desired state)
//! 2. Read the owned records of the zone (observed state)
//! 3. Diff the two into an ordered change set
//! 4. Apply the change set with signed dynamic updates
//! 5. Report a [`Summary`]
//!
//! A failure in step 1 or 2 aborts the run before anything is written. Failures in
//! step 4 are partial and end up in the summary.

use hickory_proto::rr::Name;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::diff::{diff, Change};
use crate::errors::{ConfigError, RunError, UpdateError};
use crate::inventory::{HcloudInventory, InventorySource};
use crate::records::{parse_zone_name, DesiredState};
use crate::tsig::Credential;
use crate::update::UpdateClient;
use crate::zone_reader::{AxfrZoneReader, ZoneReader};

/// Outcome of a run that got as far as computing a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Records derived from the inventory
    pub desired: usize,
    /// Owned records found in the zone
    pub observed: usize,
    /// Additions confirmed by the server
    pub additions_applied: usize,
    /// Removals confirmed by the server
    pub removals_applied: usize,
    /// Records already correct
    pub unchanged: usize,
    /// Operations that were not applied
    pub failed: usize,
    /// Whether the change set was only computed
    pub dry_run: bool,
    /// Failed messages
    pub failures: Vec<UpdateError>,
}

impl Summary {
    /// Whether every computed change was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "desired={} observed={} added={} removed={} unchanged={} failed={}",
            self.desired,
            self.observed,
            self.additions_applied,
            self.removals_applied,
            self.unchanged,
            self.failed
        )?;
        if self.dry_run {
            f.write_str(" (dry run)")?;
        }
        Ok(())
    }
}

/// Sequences the stages of a run over injected collaborators.
pub struct Reconciler {
    zone: Name,
    network_name: String,
    record_ttl: u32,
    dry_run: bool,
    inventory: Box<dyn InventorySource>,
    zone_reader: Box<dyn ZoneReader>,
    updater: UpdateClient,
}

impl Reconciler {
    /// Reconciler for `zone` over the given collaborators.
    #[must_use]
    pub fn new(
        zone: Name,
        network_name: impl Into<String>,
        record_ttl: u32,
        inventory: Box<dyn InventorySource>,
        zone_reader: Box<dyn ZoneReader>,
        updater: UpdateClient,
    ) -> Self {
        Self {
            zone,
            network_name: network_name.into(),
            record_ttl,
            dry_run: false,
            inventory,
            zone_reader,
            updater,
        }
    }

    /// Compute and log the change set without applying it.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build the production reconciler for `config`.
    ///
    /// Validates the configuration, loads the TSIG key and resolves the DNS server.
    /// No request is sent yet.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] for invalid configuration or an unusable key file
    /// and [`RunError::Inventory`] when the API client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, RunError> {
        config.validate()?;

        let zone = parse_zone_name(&config.zone).map_err(|e| ConfigError::InvalidValue {
            field: "zone",
            reason: format!("{e:#}"),
        })?;
        let credential = Arc::new(Credential::from_key_file(
            &config.key_file,
            &config.key_name,
            config.key_algorithm,
            config.key_encoding,
        )?);
        let addr = config.server.resolve()?;

        let inventory = HcloudInventory::new(
            &config.api_base_url,
            config.api_token.clone(),
            config.update.request_timeout,
        )?;
        let zone_reader =
            AxfrZoneReader::new(addr, Arc::clone(&credential), config.update.request_timeout);
        let updater = UpdateClient::new(
            zone.clone(),
            &config.server,
            addr,
            credential,
            config.update.clone(),
        );

        info!(
            zone = %zone,
            server = %config.server,
            resolved = %addr,
            network = %config.network_name,
            key_name = %config.key_name,
            "Configured reconciliation"
        );

        Ok(Self::new(
            zone,
            config.network_name.clone(),
            config.record_ttl,
            Box::new(inventory),
            Box::new(zone_reader),
            updater,
        )
        .dry_run(config.dry_run))
    }

    /// Run one reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] when the desired or observed state cannot be
    /// established. Update failures are reported in the [`Summary`] instead.
    #[tracing::instrument(skip_all, fields(zone = %self.zone, network = %self.network_name))]
    pub async fn run(&self) -> Result<Summary, RunError> {
        let servers = self.inventory.fetch(&self.network_name).await?;
        let desired = DesiredState::from_servers(&self.zone, &servers, self.record_ttl)?;

        let observed = self.zone_reader.fetch(&self.zone).await?;

        let change_set = diff(&desired, &observed);
        let mut summary = Summary {
            desired: desired.len(),
            observed: observed.len(),
            unchanged: change_set.unchanged(),
            dry_run: self.dry_run,
            ..Summary::default()
        };

        if change_set.is_empty() {
            info!(zone = %self.zone, %summary, "Zone already in sync");
            return Ok(summary);
        }

        for change in change_set.operations() {
            info!(zone = %self.zone, change = %change, dry_run = self.dry_run, "Planned change");
        }

        if self.dry_run {
            info!(
                zone = %self.zone,
                additions = change_set.additions().count(),
                removals = change_set.removals().count(),
                "Dry run, not applying changes"
            );
            return Ok(summary);
        }

        let report = self.updater.apply(&change_set).await;

        summary.additions_applied = count_additions(&report.applied);
        summary.removals_applied = report.applied.len() - summary.additions_applied;
        summary.failed = report.failed_operations();

        for failure in &report.failures {
            for change in failure.operations() {
                warn!(zone = %self.zone, change = %change, error = %failure, "Change not applied");
            }
        }
        summary.failures = report.failures;

        if summary.is_clean() {
            info!(zone = %self.zone, %summary, messages = report.messages_sent, "Reconciliation complete");
        } else {
            error!(zone = %self.zone, %summary, messages = report.messages_sent, "Reconciliation finished with failures");
        }

        Ok(summary)
    }
}

/// Operations of `changes` that are additions.
fn count_additions(changes: &[Change]) -> usize {
    changes.iter().filter(|c| c.is_addition()).count()
}

/// Build the production reconciler for `config` and run one pass.
///
/// # Errors
///
/// Returns a [`RunError`] for configuration, inventory or zone-read failures.
pub async fn run(config: &Config) -> Result<Summary, RunError> {
    Reconciler::from_config(config)?.run().await
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
