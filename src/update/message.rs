// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 UPDATE message encoding and batch packing.
//!
//! An UPDATE message carries the zone in its zone section and the operations in its
//! update section (RFC 2136 §2.5):
//!
//! | Operation          | CLASS | TTL        | RDATA          |
//! |--------------------|-------|------------|----------------|
//! | add to an RRset    | IN    | record TTL | the address    |
//! | delete an RR       | NONE  | 0          | the address    |
//!
//! The TSIG record is appended by the transport when the message is signed, so the
//! packer reserves room for it.

use anyhow::{Context, Result};
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, UpdateMessage};
use hickory_proto::rr::{DNSClass, Name, Record, RecordType};

use crate::constants::{EDNS_MAX_PAYLOAD, TSIG_RESERVED_BYTES};
use crate::diff::Change;

/// Wire form of one operation.
#[must_use]
pub fn update_record(change: &Change) -> Record {
    match change {
        Change::Add(record) => {
            let mut wire = record.to_wire();
            wire.set_dns_class(DNSClass::IN);
            wire
        }
        Change::Remove(record) => {
            let mut wire = record.to_wire();
            wire.set_dns_class(DNSClass::NONE);
            wire.set_ttl(0);
            wire
        }
    }
}

/// Build an unsigned UPDATE message for `zone` carrying `operations` in order.
#[must_use]
pub fn build_update_message(zone: &Name, operations: &[Change]) -> Message {
    let mut zone_section = Query::query(zone.clone(), RecordType::SOA);
    zone_section.set_query_class(DNSClass::IN);

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);
    message.add_zone(zone_section);

    for change in operations {
        message.add_update(update_record(change));
    }

    let mut edns = Edns::new();
    edns.set_max_payload(EDNS_MAX_PAYLOAD);
    edns.set_version(0);
    message.set_edns(edns);

    message
}

/// Encoded size of `operations` as one signed message, TSIG reservation included.
///
/// # Errors
///
/// Returns an error if the message cannot be encoded.
pub fn signed_size(zone: &Name, operations: &[Change]) -> Result<usize> {
    let bytes = build_update_message(zone, operations)
        .to_vec()
        .context("Failed to encode UPDATE message")?;
    Ok(bytes.len() + TSIG_RESERVED_BYTES)
}

/// Pack per-name operation groups into as few messages as fit the limits.
///
/// Groups are packed greedily in order and never split. A single group larger than
/// `max_bytes` still gets a message of its own; the server decides whether it fits.
///
/// # Errors
///
/// Returns an error if a candidate message cannot be encoded.
pub fn pack_batches(
    zone: &Name,
    groups: Vec<Vec<Change>>,
    max_bytes: usize,
    max_operations: usize,
) -> Result<Vec<Vec<Vec<Change>>>> {
    let mut batches: Vec<Vec<Vec<Change>>> = Vec::new();
    let mut current: Vec<Vec<Change>> = Vec::new();
    let mut current_ops = 0;

    for group in groups {
        if current.is_empty() {
            current_ops = group.len();
            current.push(group);
            continue;
        }

        let candidate_ops = current_ops + group.len();
        let fits = candidate_ops <= max_operations && {
            let candidate: Vec<Change> = current
                .iter()
                .chain(std::iter::once(&group))
                .flatten()
                .cloned()
                .collect();
            signed_size(zone, &candidate)? <= max_bytes
        };

        if fits {
            current_ops = candidate_ops;
            current.push(group);
        } else {
            batches.push(std::mem::take(&mut current));
            current_ops = group.len();
            current.push(group);
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }

    Ok(batches)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod message_tests;
