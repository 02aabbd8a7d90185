use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{CounterStore, CreateResult, StoreResult, TicketStore};
use crate::models::{RedemptionCounters, Ticket, TicketStatus};

#[derive(Default)]
struct TicketTable {
    by_id: HashMap<Uuid, Ticket>,
    by_owner: HashMap<String, Uuid>,
}

/// Process-local ticket store. The owner index and the records share one
/// lock, so create-if-absent and compare-and-set are each a single critical
/// section.
#[derive(Default)]
pub struct InMemoryTicketStore {
    table: RwLock<TicketTable>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a record as-is, bypassing issuance. Used to seed tickets in
    /// states issuance never produces.
    pub async fn insert_unchecked(&self, ticket: Ticket) {
        let mut table = self.table.write().await;
        table.by_owner.insert(ticket.owner_id.clone(), ticket.id);
        table.by_id.insert(ticket.id, ticket);
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.table.read().await.by_id.get(&id).cloned())
    }

    async fn get_by_owner(&self, owner_id: &str) -> StoreResult<Option<Ticket>> {
        let table = self.table.read().await;
        Ok(table
            .by_owner
            .get(owner_id)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn list(&self, offset: u32, limit: u32) -> StoreResult<Vec<Ticket>> {
        let table = self.table.read().await;
        let mut tickets: Vec<Ticket> = table.by_id.values().cloned().collect();
        tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(tickets
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn create_if_absent_by_owner(&self, candidate: Ticket) -> StoreResult<CreateResult> {
        let mut table = self.table.write().await;

        if let Some(existing) = table
            .by_owner
            .get(&candidate.owner_id)
            .and_then(|id| table.by_id.get(id))
        {
            return Ok(CreateResult::Existing(existing.clone()));
        }

        table
            .by_owner
            .insert(candidate.owner_id.clone(), candidate.id);
        table.by_id.insert(candidate.id, candidate.clone());
        Ok(CreateResult::Created(candidate))
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TicketStatus,
        next: TicketStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut table = self.table.write().await;

        match table.by_id.get_mut(&id) {
            Some(ticket) if ticket.status == expected => {
                ticket.apply_transition(next, at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Process-local counters guarded by a single mutex so both fields of a
/// snapshot come from the same instant.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<RedemptionCounters>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_success(&self) -> StoreResult<RedemptionCounters> {
        let mut counters = self.counters.lock().await;
        counters.success_count += 1;
        Ok(*counters)
    }

    async fn increment_fail(&self) -> StoreResult<RedemptionCounters> {
        let mut counters = self.counters.lock().await;
        counters.fail_count += 1;
        Ok(*counters)
    }

    async fn read(&self) -> StoreResult<RedemptionCounters> {
        Ok(*self.counters.lock().await)
    }
}
