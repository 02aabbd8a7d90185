//! Operator-facing text for redemption outcomes. The only place outcome
//! wording lives; handlers and the notifier both format through here.

use super::redemption::{RedemptionOutcome, RedemptionReport};

pub fn outcome_message(outcome: &RedemptionOutcome) -> String {
    match outcome {
        RedemptionOutcome::Success(owner) if owner.is_empty() => "✅ Success!".to_string(),
        RedemptionOutcome::Success(owner) => format!("✅ Success! {}", owner),
        RedemptionOutcome::AlreadyUsed => "⚠️ Code already used".to_string(),
        RedemptionOutcome::NotFound => "❌ Code not found".to_string(),
        RedemptionOutcome::InvalidState(status) => format!("❓ Invalid code status: {}", status),
    }
}

pub fn notification_text(report: &RedemptionReport) -> String {
    let stats = match report.counters {
        Some(counters) => format!("📊 ✅ {} / ⛔ {}", counters.success_count, counters.fail_count),
        None => "📊 counters unavailable".to_string(),
    };

    format!(
        "{}\nTicket: {}\nOwner: {}\n{}",
        outcome_message(&report.outcome),
        report.ticket_id,
        report.owner_id.as_deref().unwrap_or("-"),
        stats,
    )
}
