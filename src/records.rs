// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record model shared by the inventory, zone reader, diff engine and update client.
//!
//! Only A and AAAA records strictly below the zone apex are *owned* by this tool.
//! Everything else in the zone (SOA, NS, apex records, other types) is invisible to
//! the reconciliation and is never modified.

use anyhow::{bail, Context, Result};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::errors::RunError;

/// A server attached to the private network, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkServer {
    /// Server name in the provider project, used as the DNS label(s) under the zone
    pub hostname: String,
    /// Address assigned to the server on the configured private network
    pub private_address: IpAddr,
}

/// Record types managed by this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl RecordKind {
    /// Kind matching the address family of `address`.
    #[must_use]
    pub fn for_address(address: IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::A,
            IpAddr::V6(_) => Self::Aaaa,
        }
    }

    /// Map a wire record type onto a managed kind, `None` for unmanaged types.
    #[must_use]
    pub fn from_record_type(record_type: RecordType) -> Option<Self> {
        match record_type {
            RecordType::A => Some(Self::A),
            RecordType::AAAA => Some(Self::Aaaa),
            _ => None,
        }
    }

    /// The wire record type.
    #[must_use]
    pub fn record_type(self) -> RecordType {
        match self {
            Self::A => RecordType::A,
            Self::Aaaa => RecordType::AAAA,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Aaaa => f.write_str("AAAA"),
        }
    }
}

/// One address record this tool is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManagedRecord {
    /// Fully qualified owner name
    pub name: Name,
    /// Record type
    pub kind: RecordKind,
    /// Address carried by the record
    pub address: IpAddr,
    /// Time to live in seconds
    pub ttl: u32,
}

impl ManagedRecord {
    /// Build a record, deriving the kind from the address family.
    #[must_use]
    pub fn new(name: Name, address: IpAddr, ttl: u32) -> Self {
        Self {
            name,
            kind: RecordKind::for_address(address),
            address,
            ttl,
        }
    }

    /// Identity of the RRset this record belongs to.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            name: self.name.clone(),
            kind: self.kind,
        }
    }

    /// Interpret a wire record, returning `None` for types this tool does not manage.
    ///
    /// # Errors
    ///
    /// Returns an error when a managed record type carries data of another shape.
    pub fn from_wire(record: &Record) -> Result<Option<Self>> {
        let Some(kind) = RecordKind::from_record_type(record.record_type()) else {
            return Ok(None);
        };

        let address = match (kind, record.data()) {
            (RecordKind::A, Some(RData::A(a))) => IpAddr::V4(a.0),
            (RecordKind::Aaaa, Some(RData::AAAA(aaaa))) => IpAddr::V6(aaaa.0),
            (_, other) => bail!(
                "{kind} record {} carries unexpected data {other:?}",
                record.name()
            ),
        };

        Ok(Some(Self {
            name: record.name().to_lowercase(),
            kind,
            address,
            ttl: record.ttl(),
        }))
    }

    /// Wire representation of the record in class IN.
    #[must_use]
    pub fn to_wire(&self) -> Record {
        let rdata = match self.address {
            IpAddr::V4(v4) => RData::A(v4.into()),
            IpAddr::V6(v6) => RData::AAAA(v6.into()),
        };
        Record::from_rdata(self.name.clone(), self.ttl, rdata)
    }
}

impl fmt::Display for ManagedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.name, self.ttl, self.kind, self.address
        )
    }
}

/// Identity of an owned RRset: owner name plus type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Fully qualified owner name
    pub name: Name,
    /// Record type
    pub kind: RecordKind,
}

/// Parse a zone name into a lower-cased FQDN.
///
/// # Errors
///
/// Returns an error when the name is empty, the root, or not a valid DNS name.
pub fn parse_zone_name(zone: &str) -> Result<Name> {
    let trimmed = zone.trim();
    if trimmed.is_empty() || trimmed == "." {
        bail!("zone name must not be empty or the root");
    }

    let mut name = Name::from_str(trimmed)
        .with_context(|| format!("'{trimmed}' is not a valid DNS name"))?;
    name.set_fqdn(true);
    Ok(name.to_lowercase())
}

/// Whether `name`/`kind` falls inside the owned space of `zone`.
///
/// Owned names are strictly below the apex; the apex itself belongs to the zone
/// operator.
#[must_use]
pub fn is_owned(zone: &Name, name: &Name, record_type: RecordType) -> bool {
    RecordKind::from_record_type(record_type).is_some() && zone.zone_of(name) && name != zone
}

/// Desired records, exactly one per owned RRset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    records: BTreeMap<RecordKey, ManagedRecord>,
}

impl DesiredState {
    /// Derive the desired records from the servers on the network.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidHostname`] when a hostname is not a valid name under
    /// the zone and [`RunError::DuplicateHostname`] when two servers map to the same
    /// owner name and type.
    pub fn from_servers(
        zone: &Name,
        servers: &[NetworkServer],
        ttl: u32,
    ) -> Result<Self, RunError> {
        let mut records = BTreeMap::new();
        let mut owners: BTreeMap<RecordKey, &str> = BTreeMap::new();

        for server in servers {
            let name = owner_name(zone, &server.hostname)?;
            let record = ManagedRecord::new(name, server.private_address, ttl);
            let key = record.key();

            if let Some(first) = owners.get(&key) {
                return Err(RunError::DuplicateHostname {
                    name: key.name.to_string(),
                    first: (*first).to_string(),
                    second: server.hostname.clone(),
                });
            }

            owners.insert(key.clone(), server.hostname.as_str());
            records.insert(key, record);
        }

        Ok(Self { records })
    }

    /// Desired records in canonical order.
    pub fn records(&self) -> impl Iterator<Item = &ManagedRecord> {
        self.records.values()
    }

    /// Desired record for an RRset, if any.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&ManagedRecord> {
        self.records.get(key)
    }

    /// Number of desired records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
impl FromIterator<ManagedRecord> for DesiredState {
    /// Collect records built by hand. A repeated RRset is a bug in the test.
    fn from_iter<I: IntoIterator<Item = ManagedRecord>>(iter: I) -> Self {
        let mut records = BTreeMap::new();
        for record in iter {
            let key = record.key();
            assert!(
                records.insert(key.clone(), record).is_none(),
                "duplicate desired RRset {} {}",
                key.name,
                key.kind
            );
        }
        Self { records }
    }
}

/// Records currently present in the zone, restricted to the owned space.
///
/// An RRset normally holds one value. Extra values written by someone else are kept
/// so the diff can remove them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedState {
    records: BTreeMap<RecordKey, Vec<ManagedRecord>>,
}

impl ObservedState {
    /// Collect observed records, silently dropping anything outside the owned space
    /// of `zone`.
    pub fn new<I>(zone: &Name, records: I) -> Self
    where
        I: IntoIterator<Item = ManagedRecord>,
    {
        let mut grouped: BTreeMap<RecordKey, Vec<ManagedRecord>> = BTreeMap::new();
        for record in records {
            if !is_owned(zone, &record.name, record.kind.record_type()) {
                continue;
            }
            let values = grouped.entry(record.key()).or_default();
            if !values.contains(&record) {
                values.push(record);
            }
        }
        for values in grouped.values_mut() {
            values.sort();
        }

        Self { records: grouped }
    }

    /// Observed RRsets in canonical order.
    pub fn rrsets(&self) -> impl Iterator<Item = (&RecordKey, &[ManagedRecord])> {
        self.records.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Observed values for an RRset.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> &[ManagedRecord] {
        self.records.get(key).map_or(&[], Vec::as_slice)
    }

    /// Number of observed records (not RRsets).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Whether the zone holds no owned records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Owner name `<hostname>.<zone>` for a server.
fn owner_name(zone: &Name, hostname: &str) -> Result<Name, RunError> {
    let invalid = |reason: String| RunError::InvalidHostname {
        hostname: hostname.to_string(),
        zone: zone.to_string(),
        reason,
    };

    let label = hostname.trim().trim_end_matches('.');
    if label.is_empty() {
        return Err(invalid("hostname is empty".to_string()));
    }
    if label.contains(char::is_whitespace) {
        return Err(invalid("hostname contains whitespace".to_string()));
    }

    let relative = Name::from_ascii(label).map_err(|e| invalid(e.to_string()))?;
    let name = relative
        .append_domain(zone)
        .map_err(|e| invalid(e.to_string()))?
        .to_lowercase();

    if !is_owned(zone, &name, RecordType::A) {
        return Err(invalid("name falls outside the zone".to_string()));
    }

    Ok(name)
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod records_tests;
