use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{NewTicket, OwnerDisplay};
use crate::services::InvalidationOutcome;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created_or_ok, success};

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct IssueTicketRequest {
    pub owner_id: String,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

/// Create-or-fetch: repeat requests for the same owner return the same
/// ticket with 200, the first one answers 201.
pub async fn issue_ticket(
    State(state): State<AppState>,
    Json(request): Json<IssueTicketRequest>,
) -> Result<Response, AppError> {
    let owner_id = request.owner_id.trim();
    if owner_id.is_empty() {
        return Err(AppError::ValidationError(
            "owner_id must not be empty".to_string(),
        ));
    }

    let result = state
        .lifecycle
        .issue(NewTicket::new(
            owner_id,
            OwnerDisplay::new(request.first_name, request.username),
        ))
        .await?;

    let status = if result.was_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(created_or_ok(status, result.into_ticket(), "Ticket issued"))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(AppError::ValidationError(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let tickets = state
        .lifecycle
        .list(params.skip.unwrap_or(0), limit)
        .await?;

    Ok(success(tickets, "Tickets retrieved"))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state
        .lifecycle
        .fetch(ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' was not found", ticket_id)))?;

    Ok(success(ticket, "Ticket retrieved"))
}

pub async fn get_ticket_image(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    if state.lifecycle.fetch(ticket_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Ticket '{}' was not found",
            ticket_id
        )));
    }

    let image = state.renderer.render(ticket_id)?;
    Ok(([(header::CONTENT_TYPE, state.renderer.content_type())], image).into_response())
}

pub async fn invalidate_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    match state.lifecycle.invalidate(ticket_id).await? {
        InvalidationOutcome::Invalidated(ticket) => Ok(success(ticket, "Ticket invalidated")),
        InvalidationOutcome::NotFound => Err(AppError::NotFound(format!(
            "Ticket '{}' was not found",
            ticket_id
        ))),
        InvalidationOutcome::Rejected(status) => Err(AppError::Conflict(format!(
            "Ticket '{}' is {} and cannot be invalidated",
            ticket_id, status
        ))),
    }
}
