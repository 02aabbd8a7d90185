pub mod stats;
pub mod ticket;

pub use stats::RedemptionCounters;
pub use ticket::{NewTicket, OwnerDisplay, Ticket, TicketStatus, UnknownStatus};
