// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Application of a change set through TSIG-signed dynamic updates (RFC 2136).
//!
//! # Architecture
//!
//! 1. Split the change set into per-name groups ([`ChangeSet::name_groups`])
//! 2. Pack groups into messages that fit the transport's size budget
//! 3. Send messages concurrently, bounded by [`UpdateOptions::concurrency`]
//! 4. Retry transient failures per [`RetryPolicy`]
//! 5. Re-split a multi-group message the server rejects with FORMERR
//! 6. Wait for every message, then report what applied and what failed
//!
//! Each message is atomic on the server, so a failed message means none of its
//! operations were applied.

pub mod message;
pub mod transport;

use futures::stream::{self, StreamExt};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::Name;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{ServerAddress, UpdateOptions};
use crate::diff::{Change, ChangeSet};
use crate::errors::UpdateError;
use crate::retry::{Decision, FailureKind, RetryPolicy};
use crate::tsig::Credential;

pub use transport::{HickoryTransport, UpdateTransport};

/// Result of applying a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Operations confirmed applied by the server, in change-set order per message
    pub applied: Vec<Change>,
    /// One entry per failed message
    pub failures: Vec<UpdateError>,
    /// Messages that were sent, re-split halves included
    pub messages_sent: usize,
}

impl ApplyReport {
    /// Number of operations that were not applied.
    #[must_use]
    pub fn failed_operations(&self) -> usize {
        self.failures.iter().map(|f| f.operations().len()).sum()
    }

    /// Whether every operation was applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Client applying change sets to one zone on one server.
pub struct UpdateClient {
    zone: Name,
    transport: Arc<dyn UpdateTransport>,
    max_message_bytes: usize,
    options: UpdateOptions,
    retry: RetryPolicy,
}

impl UpdateClient {
    /// Client signing with `credential` and talking to `server` (already resolved to
    /// `addr`).
    #[must_use]
    pub fn new(
        zone: Name,
        server: &ServerAddress,
        addr: SocketAddr,
        credential: Arc<Credential>,
        options: UpdateOptions,
    ) -> Self {
        let transport = HickoryTransport::new(
            addr,
            server.transport,
            credential,
            options.request_timeout,
        );
        let max_message_bytes = options.max_message_bytes(server.transport);
        Self::with_transport(zone, Arc::new(transport), max_message_bytes, options)
    }

    /// Client using a caller-provided transport.
    #[must_use]
    pub fn with_transport(
        zone: Name,
        transport: Arc<dyn UpdateTransport>,
        max_message_bytes: usize,
        options: UpdateOptions,
    ) -> Self {
        Self {
            zone,
            transport,
            max_message_bytes,
            options,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Apply every operation of `change_set`.
    ///
    /// Never fails as a whole: per-message failures are collected in the report.
    #[tracing::instrument(skip_all, fields(zone = %self.zone, operations = change_set.len()))]
    pub async fn apply(&self, change_set: &ChangeSet) -> ApplyReport {
        if change_set.is_empty() {
            debug!(zone = %self.zone, "Change set is empty, nothing to send");
            return ApplyReport::default();
        }

        let batches = match message::pack_batches(
            &self.zone,
            change_set.name_groups(),
            self.max_message_bytes,
            self.options.max_operations_per_message,
        ) {
            Ok(batches) => batches,
            Err(e) => {
                error!(zone = %self.zone, error = ?e, "Failed to encode change set");
                return ApplyReport {
                    failures: vec![UpdateError::Transport {
                        server: self.transport.server(),
                        reason: format!("{e:#}"),
                        operations: change_set.operations().to_vec(),
                    }],
                    ..ApplyReport::default()
                };
            }
        };

        info!(
            zone = %self.zone,
            server = %self.transport.server(),
            operations = change_set.len(),
            messages = batches.len(),
            concurrency = self.options.concurrency,
            "Applying change set"
        );

        let outcomes: Vec<BatchOutcome> = stream::iter(batches)
            .map(|batch| self.submit(batch))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut report = ApplyReport::default();
        for outcome in outcomes {
            report.messages_sent += outcome.messages_sent;
            for result in outcome.results {
                match result {
                    Ok(applied) => report.applied.extend(applied),
                    Err(failure) => report.failures.push(failure),
                }
            }
        }

        report
    }

    /// Send one packed batch, re-splitting it if the server rejects its size.
    async fn submit(&self, batch: Vec<Vec<Change>>) -> BatchOutcome {
        let mut pending = VecDeque::from([batch]);
        let mut outcome = BatchOutcome::default();

        while let Some(mut groups) = pending.pop_front() {
            let operations: Vec<Change> = groups.concat();
            outcome.messages_sent += 1;
            match self.send_with_retry(&operations).await {
                Err(UpdateError::Rejected {
                    status: ResponseCode::FormErr,
                    ..
                }) if groups.len() > 1 => {
                    let second = groups.split_off(groups.len() / 2);
                    warn!(
                        zone = %self.zone,
                        operations = operations.len(),
                        first_half = groups.len(),
                        second_half = second.len(),
                        "Server rejected UPDATE with FORMERR, re-splitting into smaller messages"
                    );
                    pending.push_front(second);
                    pending.push_front(groups);
                }
                result => outcome.results.push(result.map(|()| operations)),
            }
        }

        outcome
    }

    /// Send one message, retrying transient failures.
    async fn send_with_retry(&self, operations: &[Change]) -> Result<(), UpdateError> {
        let message = message::build_update_message(&self.zone, operations);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match self.transport.exchange(message.clone()).await {
                Ok(ResponseCode::NoError) => {
                    if attempt > 1 {
                        info!(
                            zone = %self.zone,
                            operations = operations.len(),
                            attempt = attempt,
                            "DNS UPDATE succeeded after retries"
                        );
                    } else {
                        debug!(
                            zone = %self.zone,
                            operations = operations.len(),
                            "DNS UPDATE applied"
                        );
                    }
                    return Ok(());
                }
                Ok(code) => FailureKind::Status(code),
                Err(kind) => kind,
            };

            match self.retry.decide(attempt, &failure) {
                Decision::RetryAfter(delay) => {
                    warn!(
                        zone = %self.zone,
                        attempt = attempt,
                        retry_after = ?delay,
                        error = %failure,
                        "Retryable DNS UPDATE failure, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Decision::GiveUp => {
                    error!(
                        zone = %self.zone,
                        attempt = attempt,
                        error = %failure,
                        operations = operations.len(),
                        "DNS UPDATE failed, giving up on this message"
                    );
                    return Err(self.to_error(failure, attempt, operations));
                }
            }
        }
    }

    fn to_error(&self, failure: FailureKind, attempts: u32, operations: &[Change]) -> UpdateError {
        let server = self.transport.server();
        let operations = operations.to_vec();

        if failure.is_transient() {
            return UpdateError::RetriesExhausted {
                server,
                attempts,
                reason: failure.to_string(),
                operations,
            };
        }

        match failure {
            FailureKind::Status(status) => UpdateError::Rejected {
                server,
                status,
                operations,
            },
            other => UpdateError::Transport {
                server,
                reason: other.to_string(),
                operations,
            },
        }
    }
}

/// Results of one packed batch, one entry per final message.
#[derive(Default)]
struct BatchOutcome {
    messages_sent: usize,
    results: Vec<Result<Vec<Change>, UpdateError>>,
}
