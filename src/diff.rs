// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-vs-observed diffing for owned address records.
//!
//! [`diff`] is pure and total. It walks both states in canonical DNS name order, so
//! the emitted operation sequence depends only on the contents of its inputs, never
//! on the order they were fetched in.
//!
//! For every owner name, removals are emitted before the addition. The update client
//! keeps a name's operations together in one message, so the server never holds the
//! old and the new value at the same time.

use std::collections::BTreeSet;
use std::fmt;

use hickory_proto::rr::Name;

use crate::records::{DesiredState, ManagedRecord, ObservedState, RecordKey};

/// A single operation against the zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Change {
    /// Delete exactly this record (owner, type and address)
    Remove(ManagedRecord),
    /// Add this record
    Add(ManagedRecord),
}

impl Change {
    /// The record the operation acts on.
    #[must_use]
    pub fn record(&self) -> &ManagedRecord {
        match self {
            Self::Remove(record) | Self::Add(record) => record,
        }
    }

    /// Owner name of the record.
    #[must_use]
    pub fn name(&self) -> &Name {
        &self.record().name
    }

    /// Whether this is an addition.
    #[must_use]
    pub fn is_addition(&self) -> bool {
        matches!(self, Self::Add(_))
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remove(record) => write!(f, "delete {record}"),
            Self::Add(record) => write!(f, "add {record}"),
        }
    }
}

/// Ordered result of a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    operations: Vec<Change>,
    unchanged: usize,
}

impl ChangeSet {
    /// Operations in application order.
    #[must_use]
    pub fn operations(&self) -> &[Change] {
        &self.operations
    }

    /// Records to add, in application order.
    pub fn additions(&self) -> impl Iterator<Item = &ManagedRecord> {
        self.operations.iter().filter_map(|op| match op {
            Change::Add(record) => Some(record),
            Change::Remove(_) => None,
        })
    }

    /// Records to remove, in application order.
    pub fn removals(&self) -> impl Iterator<Item = &ManagedRecord> {
        self.operations.iter().filter_map(|op| match op {
            Change::Remove(record) => Some(record),
            Change::Add(_) => None,
        })
    }

    /// Number of desired records already present with the right value.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    /// Whether nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Split the operations into per-owner-name groups, preserving order.
    ///
    /// A group must never be split across update messages.
    #[must_use]
    pub fn name_groups(&self) -> Vec<Vec<Change>> {
        group_by_name(&self.operations)
    }
}

/// Compute the operations that turn `observed` into `desired`.
#[must_use]
pub fn diff(desired: &DesiredState, observed: &ObservedState) -> ChangeSet {
    let keys: BTreeSet<RecordKey> = desired
        .records()
        .map(ManagedRecord::key)
        .chain(observed.rrsets().map(|(key, _)| key.clone()))
        .collect();

    let mut operations = Vec::new();
    let mut unchanged = 0;

    // Keys are ordered by (name, kind): every operation for a name is contiguous.
    for key in &keys {
        let current = observed.get(key);
        match desired.get(key) {
            Some(wanted) => {
                let stale: Vec<&ManagedRecord> = current.iter().filter(|r| *r != wanted).collect();
                let present = current.len() > stale.len();

                operations.extend(stale.into_iter().cloned().map(Change::Remove));
                if present {
                    unchanged += 1;
                } else {
                    operations.push(Change::Add(wanted.clone()));
                }
            }
            None => {
                operations.extend(current.iter().cloned().map(Change::Remove));
            }
        }
    }

    // Removals first within each name, additions after.
    let operations = group_by_name(&operations)
        .into_iter()
        .flat_map(|group| {
            let (adds, removes): (Vec<Change>, Vec<Change>) =
                group.into_iter().partition(Change::is_addition);
            removes.into_iter().chain(adds)
        })
        .collect();

    ChangeSet {
        operations,
        unchanged,
    }
}

fn group_by_name(operations: &[Change]) -> Vec<Vec<Change>> {
    let mut groups: Vec<Vec<Change>> = Vec::new();
    for op in operations {
        match groups.last_mut() {
            Some(group) if group[0].name() == op.name() => group.push(op.clone()),
            _ => groups.push(vec![op.clone()]),
        }
    }
    groups
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
