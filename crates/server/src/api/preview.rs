//! Ticket preview handler.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::tickets::TicketErrorResponse;
use crate::state::AppState;

fn error(status: StatusCode, message: String) -> Response {
    (status, Json(TicketErrorResponse { error: message })).into_response()
}

/// Render a sample ticket of an event with one output
pub async fn preview_ticket(
    State(state): State<Arc<AppState>>,
    Path((event_id, provider)): Path<(i64, String)>,
) -> Response {
    let service_state = Arc::clone(&state);
    let lookup = provider.clone();
    let result =
        tokio::task::spawn_blocking(move || service_state.preview().preview(event_id, &lookup))
            .await;

    match result {
        Ok(Ok(Some(file))) => (
            [
                (header::CONTENT_TYPE, file.content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", file.filename),
                ),
            ],
            file.data,
        )
            .into_response(),
        Ok(Ok(None)) => error(
            StatusCode::NOT_FOUND,
            format!("No enabled ticket output named {}", provider),
        ),
        Ok(Err(e)) if e.is_not_found() => error(StatusCode::NOT_FOUND, e.to_string()),
        Ok(Err(e)) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, provider = %provider, "Preview task failed");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Preview task failed".to_string(),
            )
        }
    }
}
