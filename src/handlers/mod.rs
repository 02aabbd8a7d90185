use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod redemption;
pub mod stats;
pub mod tickets;

pub use redemption::redeem_ticket;
pub use stats::get_stats;
pub use tickets::{get_ticket, get_ticket_image, invalidate_ticket, issue_ticket, list_tickets};

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "gatepass-server",
    };

    success(payload, "Health check successful")
}
