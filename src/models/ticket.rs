use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of a ticket.
///
/// Tickets are materialized as `Issued`; `Created` only appears on records
/// inserted out of band and is never redeemable. From `Issued` a ticket
/// moves to `Used` or `Invalid`, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Created,
    Issued,
    Used,
    Invalid,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Created => "created",
            TicketStatus::Issued => "issued",
            TicketStatus::Used => "used",
            TicketStatus::Invalid => "invalid",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Used | TicketStatus::Invalid)
    }

    /// Whether a stored ticket may move from `self` to `next`.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Issued, TicketStatus::Used)
                | (TicketStatus::Issued, TicketStatus::Invalid)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown ticket status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TicketStatus::Created),
            "issued" => Ok(TicketStatus::Issued),
            "used" => Ok(TicketStatus::Used),
            "invalid" => Ok(TicketStatus::Invalid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Descriptive owner data attached at issuance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerDisplay {
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl OwnerDisplay {
    pub fn new(first_name: Option<String>, username: Option<String>) -> Self {
        Self {
            first_name: first_name.filter(|s| !s.trim().is_empty()),
            username: username.filter(|s| !s.trim().is_empty()),
        }
    }
}

impl fmt::Display for OwnerDisplay {
    /// Renders as `Name (@handle)`, dropping whichever part is missing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.first_name, &self.username) {
            (Some(name), Some(handle)) => write!(f, "{} (@{})", name, handle),
            (Some(name), None) => f.write_str(name),
            (None, Some(handle)) => write!(f, "@{}", handle),
            (None, None) => Ok(()),
        }
    }
}

/// Issuance request for an owner identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub owner_id: String,
    pub owner: OwnerDisplay,
}

impl NewTicket {
    pub fn new(owner_id: impl Into<String>, owner: OwnerDisplay) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner,
        }
    }
}

/// Single-use credential. The `id` is what the QR image encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub owner_id: String,
    #[serde(flatten)]
    pub owner: OwnerDisplay,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Materializes a freshly issued ticket with a new identifier.
    pub fn issue(new: NewTicket, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            owner: new.owner,
            status: TicketStatus::Issued,
            created_at: now,
            issued_at: Some(now),
            used_at: None,
        }
    }

    /// Applies a status change and stamps the matching timestamp once.
    ///
    /// The lifecycle engine checks `can_transition_to` before any store
    /// gets here.
    pub fn apply_transition(&mut self, next: TicketStatus, at: DateTime<Utc>) {
        self.status = next;
        match next {
            TicketStatus::Issued => {
                self.issued_at.get_or_insert(at);
            }
            TicketStatus::Used => {
                self.used_at.get_or_insert(at);
            }
            TicketStatus::Created | TicketStatus::Invalid => {}
        }
    }
}
