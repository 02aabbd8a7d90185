use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow};
use uuid::Uuid;

use super::{CounterStore, CreateResult, StoreError, StoreResult, TicketStore};
use crate::models::{OwnerDisplay, RedemptionCounters, Ticket, TicketStatus};

const TICKET_COLUMNS: &str =
    "id, owner_id, first_name, username, status, created_at, issued_at, used_at";

/// Primary key of the singleton counters row.
const COUNTERS_ROW_ID: i16 = 1;

#[derive(Debug, FromRow)]
struct TicketRow {
    id: Uuid,
    owner_id: String,
    first_name: Option<String>,
    username: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    issued_at: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TicketStatus>()
            .map_err(|e| StoreError::CorruptRecord(format!("ticket {}: {}", row.id, e)))?;

        Ok(Ticket {
            id: row.id,
            owner_id: row.owner_id,
            owner: OwnerDisplay {
                first_name: row.first_name,
                username: row.username,
            },
            status,
            created_at: row.created_at,
            issued_at: row.issued_at,
            used_at: row.used_at,
        })
    }
}

/// PostgreSQL ticket store. Owner uniqueness is a table constraint and the
/// conditional write is a single guarded `UPDATE`.
#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Ticket::try_from).transpose()
    }

    async fn get_by_owner(&self, owner_id: &str) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets WHERE owner_id = $1",
            TICKET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Ticket::try_from).transpose()
    }

    async fn list(&self, offset: u32, limit: u32) -> StoreResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets ORDER BY created_at ASC, id ASC OFFSET $1 LIMIT $2",
            TICKET_COLUMNS
        ))
        .bind(i64::from(offset))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    async fn create_if_absent_by_owner(&self, candidate: Ticket) -> StoreResult<CreateResult> {
        let inserted = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            INSERT INTO tickets ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (owner_id) DO NOTHING
            RETURNING {cols}
            "#,
            cols = TICKET_COLUMNS
        ))
        .bind(candidate.id)
        .bind(&candidate.owner_id)
        .bind(&candidate.owner.first_name)
        .bind(&candidate.owner.username)
        .bind(candidate.status.as_str())
        .bind(candidate.created_at)
        .bind(candidate.issued_at)
        .bind(candidate.used_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(CreateResult::Created(Ticket::try_from(row)?));
        }

        // Lost the race on the owner key; tickets are never deleted, so the
        // winner's row must be readable now.
        match self.get_by_owner(&candidate.owner_id).await? {
            Some(existing) => Ok(CreateResult::Existing(existing)),
            None => Err(StoreError::Unresolved(format!(
                "owner {} conflicted on insert but has no ticket",
                candidate.owner_id
            ))),
        }
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TicketStatus,
        next: TicketStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $3,
                issued_at = CASE WHEN $3 = 'issued' THEN COALESCE(issued_at, $4) ELSE issued_at END,
                used_at = CASE WHEN $3 = 'used' THEN COALESCE(used_at, $4) ELSE used_at END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, FromRow)]
struct CountersRow {
    success_count: i64,
    fail_count: i64,
}

impl TryFrom<CountersRow> for RedemptionCounters {
    type Error = StoreError;

    fn try_from(row: CountersRow) -> Result<Self, Self::Error> {
        let success_count = u64::try_from(row.success_count)
            .map_err(|_| StoreError::CorruptRecord("negative success_count".to_string()))?;
        let fail_count = u64::try_from(row.fail_count)
            .map_err(|_| StoreError::CorruptRecord("negative fail_count".to_string()))?;

        Ok(RedemptionCounters::new(success_count, fail_count))
    }
}

/// PostgreSQL counters. Increments are single-row `UPDATE ... RETURNING`
/// statements, so concurrent increments serialize on the row lock.
#[derive(Clone)]
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the singleton row at zero if it does not exist yet. Existing
    /// values are never reset.
    pub async fn ensure_initialized(&self) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO redemption_counters (id, success_count, fail_count) \
             VALUES ($1, 0, 0) ON CONFLICT (id) DO NOTHING",
        )
        .bind(COUNTERS_ROW_ID)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment(&self, column: &'static str) -> StoreResult<RedemptionCounters> {
        let row = sqlx::query_as::<_, CountersRow>(&format!(
            "UPDATE redemption_counters SET {col} = {col} + 1 WHERE id = $1 \
             RETURNING success_count, fail_count",
            col = column
        ))
        .bind(COUNTERS_ROW_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::CorruptRecord("counters row missing".to_string()))?
            .try_into()
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn increment_success(&self) -> StoreResult<RedemptionCounters> {
        self.increment("success_count").await
    }

    async fn increment_fail(&self) -> StoreResult<RedemptionCounters> {
        self.increment("fail_count").await
    }

    async fn read(&self) -> StoreResult<RedemptionCounters> {
        let row = sqlx::query_as::<_, CountersRow>(
            "SELECT success_count, fail_count FROM redemption_counters WHERE id = $1",
        )
        .bind(COUNTERS_ROW_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::CorruptRecord("counters row missing".to_string()))?
            .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTicket;

    fn row(status: &str) -> TicketRow {
        TicketRow {
            id: Uuid::new_v4(),
            owner_id: "u1".to_string(),
            first_name: Some("Anna".to_string()),
            username: None,
            status: status.to_string(),
            created_at: Utc::now(),
            issued_at: None,
            used_at: None,
        }
    }

    #[test]
    fn test_ticket_row_converts_known_status() {
        let ticket = Ticket::try_from(row("issued")).unwrap();
        assert_eq!(ticket.status, TicketStatus::Issued);
        assert_eq!(ticket.owner.first_name.as_deref(), Some("Anna"));
    }

    #[test]
    fn test_ticket_row_rejects_unknown_status() {
        let err = Ticket::try_from(row("refunded")).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord(_)));
    }

    #[test]
    fn test_counters_row_rejects_negative_values() {
        let err = RedemptionCounters::try_from(CountersRow {
            success_count: -1,
            fail_count: 0,
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord(_)));

        let ok = RedemptionCounters::try_from(CountersRow {
            success_count: 3,
            fail_count: 2,
        })
        .unwrap();
        assert_eq!(ok, RedemptionCounters::new(3, 2));
    }

    // The tests below need a reachable PostgreSQL: set DATABASE_URL and run
    // `cargo test -- --ignored`. Owner ids are random, so runs do not collide.

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        pool
    }

    fn candidate(owner_id: &str, first_name: &str) -> Ticket {
        Ticket::issue(
            NewTicket::new(
                owner_id,
                OwnerDisplay::new(Some(first_name.to_string()), None),
            ),
            Utc::now(),
        )
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_create_if_absent_returns_existing_on_owner_conflict() {
        let store = PgTicketStore::new(pool().await);
        let owner = format!("owner-{}", Uuid::new_v4());

        let first = store
            .create_if_absent_by_owner(candidate(&owner, "Anna"))
            .await
            .unwrap();
        assert!(first.was_created());
        let first = first.into_ticket();

        let second = store
            .create_if_absent_by_owner(candidate(&owner, "Someone else"))
            .await
            .unwrap();
        assert!(!second.was_created());
        let second = second.into_ticket();
        assert_eq!(second.id, first.id);
        assert_eq!(second.owner.first_name.as_deref(), Some("Anna"));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_create_for_one_owner_yields_one_ticket() {
        let store = PgTicketStore::new(pool().await);
        let owner = format!("owner-{}", Uuid::new_v4());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let owner = owner.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_if_absent_by_owner(candidate(&owner, "Anna"))
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        let mut ids = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap();
            if result.was_created() {
                created += 1;
            }
            ids.push(result.into_ticket().id);
        }
        assert_eq!(created, 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_compare_and_set_applies_once() {
        let store = PgTicketStore::new(pool().await);
        let owner = format!("owner-{}", Uuid::new_v4());
        let ticket = store
            .create_if_absent_by_owner(candidate(&owner, "Anna"))
            .await
            .unwrap()
            .into_ticket();

        let at = Utc::now();
        assert!(store
            .compare_and_set_status(ticket.id, TicketStatus::Issued, TicketStatus::Used, at)
            .await
            .unwrap());
        assert!(!store
            .compare_and_set_status(ticket.id, TicketStatus::Issued, TicketStatus::Used, Utc::now())
            .await
            .unwrap());

        let used = store.get(ticket.id).await.unwrap().unwrap();
        assert_eq!(used.status, TicketStatus::Used);
        assert!(used.used_at.is_some());
        assert!(used.issued_at.is_some());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_compare_and_set_has_one_winner() {
        let store = PgTicketStore::new(pool().await);
        let owner = format!("owner-{}", Uuid::new_v4());
        let ticket_id = store
            .create_if_absent_by_owner(candidate(&owner, "Anna"))
            .await
            .unwrap()
            .into_ticket()
            .id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_set_status(
                        ticket_id,
                        TicketStatus::Issued,
                        TicketStatus::Used,
                        Utc::now(),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_counter_increments_return_post_increment_snapshot() {
        let counters = PgCounterStore::new(pool().await);
        counters.ensure_initialized().await.unwrap();

        let before = counters.read().await.unwrap();
        let after_success = counters.increment_success().await.unwrap();
        assert!(after_success.success_count > before.success_count);

        let after_fail = counters.increment_fail().await.unwrap();
        assert!(after_fail.fail_count > before.fail_count);

        // Existing values survive a second initialization.
        counters.ensure_initialized().await.unwrap();
        let read = counters.read().await.unwrap();
        assert!(read.success_count >= after_success.success_count);
        assert!(read.fail_count >= after_fail.fail_count);
    }
}
