use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, preview, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Ticket downloads
        .route("/orders/{id}/tickets", get(tickets::list_order_tickets))
        .route(
            "/orders/{id}/tickets/{filename}",
            get(tickets::download_ticket),
        )
        // Previews
        .route(
            "/events/{id}/preview/{provider}",
            get(preview::preview_ticket),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
