//! Redemption coordinator.
//!
//! One path per attempt: read, decide, conditionally write, count, notify.
//! The conditional write on `Issued` makes concurrent attempts on the same
//! ticket behave as if serialized; attempts on different tickets share no
//! lock.
//!
//! Ticket state and counters are consistent eventually, not transactionally:
//! a ticket can be `Used` for a moment before `success_count` reflects it.
//! Once the conditional write has won, the attempt is a success no matter
//! what the counter store does; the increment is retried a few times and a
//! final failure is logged, with the report carrying no counter snapshot.

use std::fmt;
use std::sync::Arc;

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::lifecycle::{RedemptionDecision, TicketLifecycle};
use super::notifier::NotificationDispatcher;
use crate::models::{RedemptionCounters, TicketStatus};
use crate::store::{CounterStore, StoreError, StoreResult};

/// A lost conditional write is re-evaluated against fresh state. Statuses
/// only move forward, so one re-read settles it; the bound guards against a
/// store that reports failure without changing anything.
const MAX_DECISION_ATTEMPTS: usize = 3;

const SUCCESS_INCREMENT_ATTEMPTS: u32 = 3;
const SUCCESS_INCREMENT_BACKOFF: Duration = Duration::from_millis(50);

/// Domain result of a redemption attempt. Every variant is a normal value;
/// only store failures surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    NotFound,
    AlreadyUsed,
    InvalidState(TicketStatus),
    /// Carries the owner's display text, e.g. `Anna (@anna_k)`.
    Success(String),
}

impl RedemptionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RedemptionOutcome::Success(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RedemptionOutcome::NotFound => "not_found",
            RedemptionOutcome::AlreadyUsed => "already_used",
            RedemptionOutcome::InvalidState(_) => "invalid_state",
            RedemptionOutcome::Success(_) => "success",
        }
    }
}

impl fmt::Display for RedemptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedemptionOutcome::InvalidState(status) => write!(f, "invalid_state({})", status),
            other => f.write_str(other.kind()),
        }
    }
}

/// Everything known about one committed attempt. This is also the event
/// handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionReport {
    pub ticket_id: Uuid,
    pub outcome: RedemptionOutcome,
    /// Owner of the scanned ticket, absent for unknown ids.
    pub owner_id: Option<String>,
    /// Counters right after this attempt's increment. `None` only for a
    /// committed success whose increment could not be recorded.
    pub counters: Option<RedemptionCounters>,
}

pub struct RedemptionCoordinator {
    lifecycle: Arc<TicketLifecycle>,
    counters: Arc<dyn CounterStore>,
    notifications: NotificationDispatcher,
}

impl RedemptionCoordinator {
    pub fn new(
        lifecycle: Arc<TicketLifecycle>,
        counters: Arc<dyn CounterStore>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            lifecycle,
            counters,
            notifications,
        }
    }

    pub async fn redeem(&self, ticket_id: Uuid) -> StoreResult<RedemptionReport> {
        let (outcome, owner_id) = self.decide_and_commit(ticket_id).await?;

        // Nothing was written for a rejection, so a failed increment can
        // surface and the whole attempt be retried.
        let counters = if outcome.is_success() {
            self.record_success(ticket_id).await
        } else {
            Some(self.counters.increment_fail().await?)
        };

        info!(
            ticket_id = %ticket_id,
            outcome = %outcome,
            success_count = counters.map(|c| c.success_count),
            fail_count = counters.map(|c| c.fail_count),
            "Redemption attempt"
        );

        let report = RedemptionReport {
            ticket_id,
            outcome,
            owner_id,
            counters,
        };
        self.notifications.dispatch(&report);

        Ok(report)
    }

    pub async fn counters(&self) -> StoreResult<RedemptionCounters> {
        self.counters.read().await
    }

    /// The ticket is already `Used` here; the outcome must not change.
    async fn record_success(&self, ticket_id: Uuid) -> Option<RedemptionCounters> {
        for attempt in 1..=SUCCESS_INCREMENT_ATTEMPTS {
            match self.counters.increment_success().await {
                Ok(counters) => return Some(counters),
                Err(e) if attempt < SUCCESS_INCREMENT_ATTEMPTS => {
                    warn!(error = %e, ticket_id = %ticket_id, attempt, "Retrying success increment");
                    tokio::time::sleep(SUCCESS_INCREMENT_BACKOFF * attempt).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        ticket_id = %ticket_id,
                        "Success increment lost after committed redemption"
                    );
                }
            }
        }
        None
    }

    async fn decide_and_commit(
        &self,
        ticket_id: Uuid,
    ) -> StoreResult<(RedemptionOutcome, Option<String>)> {
        let Some(mut ticket) = self.lifecycle.fetch(ticket_id).await? else {
            return Ok((RedemptionOutcome::NotFound, None));
        };

        for _ in 0..MAX_DECISION_ATTEMPTS {
            let outcome = match TicketLifecycle::decide_redemption(ticket.status) {
                RedemptionDecision::AlreadyUsed => RedemptionOutcome::AlreadyUsed,
                RedemptionDecision::InvalidState(status) => {
                    RedemptionOutcome::InvalidState(status)
                }
                RedemptionDecision::Redeem => {
                    if self.lifecycle.mark_used(ticket_id, Utc::now()).await? {
                        RedemptionOutcome::Success(ticket.owner.to_string())
                    } else {
                        debug!(ticket_id = %ticket_id, "Conditional write lost, re-evaluating");
                        ticket = self.lifecycle.fetch(ticket_id).await?.ok_or_else(|| {
                            StoreError::Unresolved(format!(
                                "ticket {} vanished during redemption",
                                ticket_id
                            ))
                        })?;
                        continue;
                    }
                }
            };

            return Ok((outcome, Some(ticket.owner_id)));
        }

        Err(StoreError::Unresolved(format!(
            "ticket {} still issued after {} failed conditional writes",
            ticket_id, MAX_DECISION_ATTEMPTS
        )))
    }
}
