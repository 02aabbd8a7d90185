use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::models::RedemptionCounters;
use crate::services::messages::outcome_message;
use crate::services::RedemptionOutcome;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{error as error_response, success};

#[derive(Serialize)]
struct RedemptionPayload {
    ticket_id: Uuid,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    /// `null` when a committed success could not be counted.
    counters: Option<RedemptionCounters>,
}

/// Gate scan endpoint. Every domain outcome gets its own status code; only
/// store failures come back as `STORE_UNAVAILABLE`.
pub async fn redeem_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let report = state.redemption.redeem(ticket_id).await?;
    let message = outcome_message(&report.outcome);

    let mut payload = RedemptionPayload {
        ticket_id,
        outcome: report.outcome.kind(),
        owner: None,
        status: None,
        counters: report.counters,
    };

    let rejection = match report.outcome {
        RedemptionOutcome::Success(owner) => {
            payload.owner = Some(owner);
            return Ok(success(payload, message));
        }
        RedemptionOutcome::NotFound => ("NOT_FOUND", StatusCode::NOT_FOUND),
        RedemptionOutcome::AlreadyUsed => ("ALREADY_USED", StatusCode::CONFLICT),
        RedemptionOutcome::InvalidState(status) => {
            payload.status = Some(status.to_string());
            ("INVALID_STATE", StatusCode::BAD_REQUEST)
        }
    };

    let details = serde_json::to_value(&payload)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(error_response(rejection.0, message, Some(details), rejection.1))
}
