//! Ticket lifecycle engine.
//!
//! Owns issuance idempotency and every status transition decision. Stores
//! only execute what this module decides, through their conditional write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{NewTicket, Ticket, TicketStatus};
use crate::store::{CreateResult, StoreError, StoreResult, TicketStore};

/// What a redemption attempt should do with a ticket in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionDecision {
    Redeem,
    AlreadyUsed,
    InvalidState(TicketStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationOutcome {
    NotFound,
    Invalidated(Ticket),
    /// The ticket was not `Issued`; carries the status it was found in.
    Rejected(TicketStatus),
}

pub struct TicketLifecycle {
    tickets: Arc<dyn TicketStore>,
}

impl TicketLifecycle {
    pub fn new(tickets: Arc<dyn TicketStore>) -> Self {
        Self { tickets }
    }

    /// Returns the owner's ticket, issuing one on the first request.
    ///
    /// Repeated calls never create a second ticket or touch timestamps. When
    /// two first-time requests race, the store keeps one insert and both
    /// callers get that record back.
    pub async fn issue_or_fetch(&self, new: NewTicket) -> StoreResult<Ticket> {
        self.issue(new).await.map(CreateResult::into_ticket)
    }

    /// Same as `issue_or_fetch`, but tells the caller whether this call was
    /// the one that created the ticket.
    pub async fn issue(&self, new: NewTicket) -> StoreResult<CreateResult> {
        if let Some(existing) = self.tickets.get_by_owner(&new.owner_id).await? {
            debug!(owner_id = %new.owner_id, ticket_id = %existing.id, "Returning existing ticket");
            return Ok(CreateResult::Existing(existing));
        }

        let candidate = Ticket::issue(new, Utc::now());
        let result = self.tickets.create_if_absent_by_owner(candidate).await?;
        match &result {
            CreateResult::Created(ticket) => {
                info!(owner_id = %ticket.owner_id, ticket_id = %ticket.id, "Issued ticket");
            }
            CreateResult::Existing(ticket) => {
                debug!(owner_id = %ticket.owner_id, ticket_id = %ticket.id, "Lost issuance race, returning winner");
            }
        }
        Ok(result)
    }

    pub async fn fetch(&self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        self.tickets.get(ticket_id).await
    }

    pub async fn list(&self, offset: u32, limit: u32) -> StoreResult<Vec<Ticket>> {
        self.tickets.list(offset, limit).await
    }

    /// Only `Issued` tickets are redeemable. `Used` is reported apart from
    /// every other status so replays can be told from bad codes.
    pub fn decide_redemption(status: TicketStatus) -> RedemptionDecision {
        match status {
            TicketStatus::Issued => RedemptionDecision::Redeem,
            TicketStatus::Used => RedemptionDecision::AlreadyUsed,
            other => RedemptionDecision::InvalidState(other),
        }
    }

    /// Conditional `Issued -> Used`. `false` means someone else moved the
    /// ticket first.
    pub async fn mark_used(&self, ticket_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        self.transition(ticket_id, TicketStatus::Issued, TicketStatus::Used, at)
            .await
    }

    /// Withdraws an `Issued` ticket. Terminal and not-yet-issued tickets are
    /// left alone.
    pub async fn invalidate(&self, ticket_id: Uuid) -> StoreResult<InvalidationOutcome> {
        let Some(ticket) = self.tickets.get(ticket_id).await? else {
            return Ok(InvalidationOutcome::NotFound);
        };

        if ticket.status != TicketStatus::Issued {
            return Ok(InvalidationOutcome::Rejected(ticket.status));
        }

        let moved = self
            .transition(ticket_id, TicketStatus::Issued, TicketStatus::Invalid, Utc::now())
            .await?;

        let current = self.tickets.get(ticket_id).await?.ok_or_else(|| {
            StoreError::Unresolved(format!("ticket {} vanished during invalidation", ticket_id))
        })?;

        if moved {
            info!(ticket_id = %ticket_id, "Invalidated ticket");
            Ok(InvalidationOutcome::Invalidated(current))
        } else {
            Ok(InvalidationOutcome::Rejected(current.status))
        }
    }

    async fn transition(
        &self,
        ticket_id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        debug_assert!(from.can_transition_to(to));
        self.tickets
            .compare_and_set_status(ticket_id, from, to, at)
            .await
    }
}
