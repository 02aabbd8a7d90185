use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
struct StatsPayload {
    success: u64,
    fail: u64,
    total: u64,
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Response, AppError> {
    let counters = state.redemption.counters().await?;

    let payload = StatsPayload {
        success: counters.success_count,
        fail: counters.fail_count,
        total: counters.total(),
    };
    Ok(success(payload, "Redemption statistics"))
}
