//! Persistence contracts consumed by the lifecycle engine and the
//! redemption coordinator.
//!
//! Both stores are assumed to be shared by concurrent requests. The ticket
//! store enforces owner uniqueness on create and offers a conditional status
//! write; the counter store increments atomically. Nothing here holds a lock
//! across tickets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{RedemptionCounters, Ticket, TicketStatus};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCounterStore, InMemoryTicketStore};
pub use postgres::{PgCounterStore, PgTicketStore};

/// Failures of the persistence layer. All of them are retryable from the
/// caller's point of view and never stand in for a domain outcome.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("conditional write could not be resolved: {0}")]
    Unresolved(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an owner-keyed create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateResult {
    /// The candidate was inserted.
    Created(Ticket),
    /// Another ticket already held the owner key; the candidate was dropped.
    Existing(Ticket),
}

impl CreateResult {
    pub fn was_created(&self) -> bool {
        matches!(self, CreateResult::Created(_))
    }

    pub fn into_ticket(self) -> Ticket {
        match self {
            CreateResult::Created(ticket) | CreateResult::Existing(ticket) => ticket,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Ticket>>;

    async fn get_by_owner(&self, owner_id: &str) -> StoreResult<Option<Ticket>>;

    /// Tickets ordered by creation time.
    async fn list(&self, offset: u32, limit: u32) -> StoreResult<Vec<Ticket>>;

    /// Inserts `candidate` unless a ticket already exists for its owner, in
    /// which case the stored ticket is returned untouched.
    async fn create_if_absent_by_owner(&self, candidate: Ticket) -> StoreResult<CreateResult>;

    /// Moves ticket `id` to `next` only if its current status is `expected`,
    /// stamping the timestamp that belongs to `next` with `at`.
    ///
    /// Returns `false` when the ticket is missing or its status differed at
    /// write time.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TicketStatus,
        next: TicketStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

/// Singleton success/failure counters. Each increment returns the snapshot
/// taken right after it landed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment_success(&self) -> StoreResult<RedemptionCounters>;

    async fn increment_fail(&self) -> StoreResult<RedemptionCounters>;

    async fn read(&self) -> StoreResult<RedemptionCounters>;
}
