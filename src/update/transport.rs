// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Signed delivery of UPDATE messages.
//!
//! [`HickoryTransport`] signs each message with TSIG and sends it over UDP or TCP
//! through hickory's synchronous client. The sync client runs on the blocking pool,
//! guarded by an async timeout so a wedged socket cannot stall the run.

use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::error::{ClientError, ClientErrorKind, ClientResult};
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use hickory_proto::error::{ProtoError, ProtoErrorKind};
use hickory_proto::op::{Message, ResponseCode, UpdateMessage};
use hickory_proto::xfer::{DnsRequest, DnsRequestOptions, DnsResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Transport;
use crate::constants::DNS_TIMEOUT_GRACE_MILLIS;
use crate::retry::FailureKind;
use crate::tsig::Credential;

/// Sends one UPDATE message and reports the server's response code.
///
/// Implementations own signing and the transport; the update client owns batching
/// and retries.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Server identity used in logs and errors.
    fn server(&self) -> String;

    /// Sign and send `message`, returning the response code of the reply.
    ///
    /// # Errors
    ///
    /// Returns the [`FailureKind`] when no valid reply was obtained.
    async fn exchange(&self, message: Message) -> Result<ResponseCode, FailureKind>;
}

/// TSIG-signing transport backed by hickory-client.
pub struct HickoryTransport {
    server: SocketAddr,
    transport: Transport,
    credential: Arc<Credential>,
    timeout: Duration,
}

impl HickoryTransport {
    /// Create a transport for `server` using `transport`.
    #[must_use]
    pub fn new(
        server: SocketAddr,
        transport: Transport,
        credential: Arc<Credential>,
        timeout: Duration,
    ) -> Self {
        Self {
            server,
            transport,
            credential,
            timeout,
        }
    }
}

#[async_trait]
impl UpdateTransport for HickoryTransport {
    fn server(&self) -> String {
        format!("{}://{}", self.transport, self.server)
    }

    async fn exchange(&self, message: Message) -> Result<ResponseCode, FailureKind> {
        let server = self.server;
        let transport = self.transport;
        let credential = Arc::clone(&self.credential);
        let timeout = self.timeout;

        debug!(
            server = %server,
            transport = %transport,
            updates = message.updates().len(),
            "Sending signed DNS UPDATE"
        );

        // Execute DNS update in blocking thread (hickory-client sync API)
        let task = tokio::task::spawn_blocking(move || {
            let signer = credential
                .signer()
                .map_err(|e| FailureKind::Tsig(format!("{e:#}")))?;
            let request = DnsRequest::new(message, DnsRequestOptions::default());

            let responses = match transport {
                Transport::Udp => {
                    let conn = UdpClientConnection::with_timeout(server, timeout)
                        .map_err(|e| FailureKind::Io(e.to_string()))?;
                    SyncClient::with_tsigner(conn, signer).send(request)
                }
                Transport::Tcp => {
                    let conn = TcpClientConnection::with_timeout(server, timeout)
                        .map_err(|e| FailureKind::Io(e.to_string()))?;
                    SyncClient::with_tsigner(conn, signer).send(request)
                }
            };

            first_response_code(responses)
        });

        let guard = timeout + Duration::from_millis(DNS_TIMEOUT_GRACE_MILLIS);
        match tokio::time::timeout(guard, task).await {
            Err(_) => Err(FailureKind::Timeout),
            Ok(Err(join_error)) => Err(FailureKind::Io(format!(
                "DNS update task failed: {join_error}"
            ))),
            Ok(Ok(result)) => result,
        }
    }
}

fn first_response_code(
    responses: Vec<ClientResult<DnsResponse>>,
) -> Result<ResponseCode, FailureKind> {
    match responses.into_iter().next() {
        Some(Ok(response)) => Ok(response.response_code()),
        Some(Err(e)) => Err(classify_client_error(&e)),
        None => Err(FailureKind::Io("no response received".to_string())),
    }
}

/// Map a hickory client error onto a failure kind.
///
/// With a signer installed every reply goes through TSIG verification before its
/// response code is looked at. A BADKEY or BADSIG answer, an unsigned NOTAUTH and a
/// MAC computed with another key all surface here as verification errors and are
/// fatal. Verification errors without a dedicated kind are identified by their
/// message, which always names TSIG.
pub(crate) fn classify_client_error(error: &ClientError) -> FailureKind {
    match error.kind() {
        ClientErrorKind::Timeout => FailureKind::Timeout,
        ClientErrorKind::Io(e) => FailureKind::Io(e.to_string()),
        ClientErrorKind::DnsSec(e) => FailureKind::Tsig(e.to_string()),
        ClientErrorKind::Proto(proto) => match proto.kind() {
            ProtoErrorKind::Timeout | ProtoErrorKind::Timer => FailureKind::Timeout,
            ProtoErrorKind::TsigWrongKey
            | ProtoErrorKind::TsigUnsupportedMacAlgorithm(_)
            | ProtoErrorKind::HmacInvalid() => unverified(proto),
            ProtoErrorKind::Message(msg) if names_tsig(msg) => unverified(proto),
            ProtoErrorKind::Msg(msg) if names_tsig(msg) => unverified(proto),
            _ => FailureKind::Io(proto.to_string()),
        },
        other => FailureKind::Io(other.to_string()),
    }
}

fn unverified(error: &ProtoError) -> FailureKind {
    FailureKind::Tsig(format!("response failed TSIG verification: {error}"))
}

fn names_tsig(message: &str) -> bool {
    message.to_ascii_lowercase().contains("tsig")
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod transport_tests;
