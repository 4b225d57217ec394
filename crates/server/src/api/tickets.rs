//! Ticket download handlers.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tixcache_core::{ResolveError, ResolvedTickets, TicketDownload, TicketFailure};

use crate::metrics::TICKET_DOWNLOADS_TOTAL;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// One downloadable ticket file
#[derive(Debug, Serialize)]
pub struct TicketFileResponse {
    pub filename: String,
    pub provider: String,
    /// None for a combined whole-order file
    pub position_id: Option<i64>,
    pub entry_id: i64,
    pub content_type: String,
    pub size_bytes: Option<u64>,
}

impl From<&TicketDownload> for TicketFileResponse {
    fn from(download: &TicketDownload) -> Self {
        Self {
            filename: download.filename.clone(),
            provider: download.provider.clone(),
            position_id: download.position_id,
            entry_id: download.entry.id,
            content_type: download.entry.content_type.clone(),
            size_bytes: download.entry.file.as_ref().map(|f| f.size_bytes),
        }
    }
}

/// A ticket that could not be generated
#[derive(Debug, Serialize)]
pub struct TicketFailureResponse {
    pub provider: String,
    pub position_id: Option<i64>,
    pub error: String,
}

impl From<&TicketFailure> for TicketFailureResponse {
    fn from(failure: &TicketFailure) -> Self {
        Self {
            provider: failure.provider.clone(),
            position_id: failure.position_id,
            error: failure.error.clone(),
        }
    }
}

/// Response for listing an order's tickets
#[derive(Debug, Serialize)]
pub struct OrderTicketsResponse {
    pub order_id: i64,
    pub tickets: Vec<TicketFileResponse>,
    pub failures: Vec<TicketFailureResponse>,
}

impl OrderTicketsResponse {
    fn new(order_id: i64, resolved: &ResolvedTickets) -> Self {
        Self {
            order_id,
            tickets: resolved.downloads.iter().map(Into::into).collect(),
            failures: resolved.failures.iter().map(Into::into).collect(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
}

fn error_response(e: ResolveError) -> (StatusCode, Json<TicketErrorResponse>) {
    let status = if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        tracing::error!(error = %e, "Ticket resolution failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(TicketErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// List the ticket files of an order, generating missing ones
pub async fn list_order_tickets(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderTicketsResponse>, impl IntoResponse> {
    match state.resolver().tickets_for_order(order_id).await {
        Ok(resolved) => Ok(Json(OrderTicketsResponse::new(order_id, &resolved))),
        Err(e) => Err(error_response(e)),
    }
}

/// Download one ticket file of an order
pub async fn download_ticket(
    State(state): State<Arc<AppState>>,
    Path((order_id, filename)): Path<(i64, String)>,
) -> Result<impl IntoResponse, (StatusCode, Json<TicketErrorResponse>)> {
    let ticket = state
        .resolver()
        .download(order_id, &filename)
        .await
        .map_err(error_response)?;

    TICKET_DOWNLOADS_TOTAL
        .with_label_values(&[&ticket.provider])
        .inc();

    Ok((
        [
            (header::CONTENT_TYPE, ticket.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ticket.filename),
            ),
        ],
        ticket.data,
    ))
}
