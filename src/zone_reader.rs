// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Observation of the zone's current contents through a TSIG-signed zone transfer.
//!
//! The reader asks the authoritative server for a full transfer (AXFR over TCP) and
//! reduces the answer to the owned A/AAAA records. Any failure is fatal for the run:
//! a diff computed against a partially read zone could delete records that exist.

use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::error::{ClientError, ClientErrorKind};
use hickory_client::tcp::TcpClientConnection;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, Record, RecordType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::DNS_TIMEOUT_GRACE_MILLIS;
use crate::errors::ZoneReadError;
use crate::records::{ManagedRecord, ObservedState};
use crate::retry::FailureKind;
use crate::tsig::Credential;
use crate::update::transport::classify_client_error;

/// Source of the records currently in a zone.
#[async_trait]
pub trait ZoneReader: Send + Sync {
    /// Read every owned record of `zone`.
    ///
    /// # Errors
    ///
    /// Returns a [`ZoneReadError`] when the zone cannot be read completely.
    async fn fetch(&self, zone: &Name) -> Result<ObservedState, ZoneReadError>;
}

/// Reads zones with AXFR from one authoritative server.
pub struct AxfrZoneReader {
    server: SocketAddr,
    credential: Arc<Credential>,
    timeout: Duration,
}

impl AxfrZoneReader {
    /// Reader transferring from `server`, signing with `credential`.
    #[must_use]
    pub fn new(server: SocketAddr, credential: Arc<Credential>, timeout: Duration) -> Self {
        Self {
            server,
            credential,
            timeout,
        }
    }
}

/// How a transfer attempt ended before the records were interpreted.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TransferFailure {
    Unreachable(String),
    Denied(String),
    Malformed(String),
    Status(ResponseCode),
}

#[async_trait]
impl ZoneReader for AxfrZoneReader {
    #[tracing::instrument(skip_all, fields(zone = %zone, server = %self.server))]
    async fn fetch(&self, zone: &Name) -> Result<ObservedState, ZoneReadError> {
        let server = self.server;
        let credential = Arc::clone(&self.credential);
        let timeout = self.timeout;
        let origin = zone.clone();

        debug!(zone = %zone, server = %server, "Requesting zone transfer");

        let task = tokio::task::spawn_blocking(move || -> Result<Vec<Record>, TransferFailure> {
            let signer = credential
                .signer()
                .map_err(|e| TransferFailure::Denied(format!("{e:#}")))?;
            let conn = TcpClientConnection::with_timeout(server, timeout)
                .map_err(|e| transfer_failure(&e))?;
            let client = SyncClient::with_tsigner(conn, signer);

            let responses = client
                .zone_transfer(&origin, None)
                .map_err(|e| transfer_failure(&e))?;

            let mut records = Vec::new();
            for response in responses {
                let response = response.map_err(|e| transfer_failure(&e))?;
                if response.response_code() != ResponseCode::NoError {
                    return Err(TransferFailure::Status(response.response_code()));
                }
                records.extend(response.answers().iter().cloned());
            }
            Ok(records)
        });

        // A transfer of a large zone takes several exchanges, so the guard is wider than
        // a single request timeout.
        let guard = timeout * 2 + Duration::from_millis(DNS_TIMEOUT_GRACE_MILLIS);
        let records = match tokio::time::timeout(guard, task).await {
            Err(_) => {
                return Err(ZoneReadError::ZoneUnreachable {
                    zone: zone.to_string(),
                    server: server.to_string(),
                    reason: format!("zone transfer did not complete within {guard:?}"),
                })
            }
            Ok(Err(join_error)) => {
                return Err(ZoneReadError::ZoneUnreachable {
                    zone: zone.to_string(),
                    server: server.to_string(),
                    reason: format!("zone transfer task failed: {join_error}"),
                })
            }
            Ok(Ok(Err(failure))) => return Err(map_failure(zone, server, failure)),
            Ok(Ok(Ok(records))) => records,
        };

        let observed = observed_from_transfer(zone, &server.to_string(), &records)?;
        info!(
            zone = %zone,
            server = %server,
            transferred = records.len(),
            owned = observed.len(),
            "Read zone contents"
        );
        Ok(observed)
    }
}

fn map_failure(zone: &Name, server: SocketAddr, failure: TransferFailure) -> ZoneReadError {
    let zone_name = zone.to_string();
    let server_name = server.to_string();
    match failure {
        TransferFailure::Unreachable(reason) => ZoneReadError::ZoneUnreachable {
            zone: zone_name,
            server: server_name,
            reason,
        },
        TransferFailure::Denied(status) => ZoneReadError::ZoneTransferDenied {
            zone: zone_name,
            server: server_name,
            status,
        },
        TransferFailure::Malformed(reason) => ZoneReadError::MalformedResponse {
            zone: zone_name,
            server: server_name,
            reason,
        },
        TransferFailure::Status(code) => classify_transfer_code(zone, &server_name, code),
    }
}

/// Map a hickory error raised while connecting or streaming the transfer.
///
/// A reply that fails TSIG verification is the server refusing the key. The xfr state
/// machine reports out-of-sequence SOA records as plain messages.
pub(crate) fn transfer_failure(error: &ClientError) -> TransferFailure {
    match error.kind() {
        ClientErrorKind::Message(_) | ClientErrorKind::Msg(_) => {
            TransferFailure::Malformed(error.to_string())
        }
        _ => match classify_client_error(error) {
            FailureKind::Tsig(reason) => TransferFailure::Denied(reason),
            other => TransferFailure::Unreachable(other.to_string()),
        },
    }
}

/// Map a non-success response code of a transfer reply.
pub(crate) fn classify_transfer_code(zone: &Name, server: &str, code: ResponseCode) -> ZoneReadError {
    match code {
        ResponseCode::Refused
        | ResponseCode::NotAuth
        | ResponseCode::NotZone
        | ResponseCode::BADSIG
        | ResponseCode::BADKEY
        | ResponseCode::BADTIME => ZoneReadError::ZoneTransferDenied {
            zone: zone.to_string(),
            server: server.to_string(),
            status: code.to_string(),
        },
        other => ZoneReadError::MalformedResponse {
            zone: zone.to_string(),
            server: server.to_string(),
            reason: format!("unexpected response code {other}"),
        },
    }
}

/// Reduce the records of a completed transfer to the owned observed state.
///
/// # Errors
///
/// Returns [`ZoneReadError::MalformedResponse`] when the transfer is empty, does not
/// start with the zone's SOA, or carries an address record with mismatched data.
pub(crate) fn observed_from_transfer(
    zone: &Name,
    server: &str,
    records: &[Record],
) -> Result<ObservedState, ZoneReadError> {
    let malformed = |reason: String| ZoneReadError::MalformedResponse {
        zone: zone.to_string(),
        server: server.to_string(),
        reason,
    };

    let first = records
        .first()
        .ok_or_else(|| malformed("transfer returned no records".to_string()))?;
    if first.record_type() != RecordType::SOA || first.name().to_lowercase() != *zone {
        return Err(malformed(format!(
            "transfer does not start with the SOA of the zone (got {} {})",
            first.name(),
            first.record_type()
        )));
    }

    let mut managed = Vec::new();
    for record in records {
        if let Some(parsed) =
            ManagedRecord::from_wire(record).map_err(|e| malformed(format!("{e:#}")))?
        {
            managed.push(parsed);
        }
    }

    Ok(ObservedState::new(zone, managed))
}

#[cfg(test)]
#[path = "zone_reader_tests.rs"]
mod zone_reader_tests;
