//! Ticket previews rendered from a throwaway sample order.
//!
//! The sample order, its items and its invoice address are written inside a
//! transaction that is rolled back on every exit path, so a preview never
//! leaves rows behind, even when the output fails or panics.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::database::{Database, StoreError};
use crate::i18n::gettext;
use crate::metrics;
use crate::orders::sqlite::{
    insert_invoice_address, insert_item, insert_order, insert_position, load_position_context,
    select_event,
};
use crate::orders::{NewInvoiceAddress, NewItem, NewOrder, NewPosition, OrderStatus};
use crate::output::{GeneratedFile, OutputError, OutputRegistry};

/// Code of the sample order.
pub const PREVIEW_ORDER_CODE: &str = "PREVIEW1234";

const PRODUCT_PRICE_CENTS: i64 = 4223;
const WORKSHOP_PRICE_CENTS: i64 = 2340;
const ORDER_TOTAL_CENTS: i64 = 11900;

/// Errors from rendering a preview.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Unknown event, or the sample order could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Output {provider} failed: {source}")]
    Output {
        provider: String,
        #[source]
        source: OutputError,
    },
}

impl PreviewError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PreviewError::Store(e) if e.is_not_found())
    }
}

/// Renders previews of ticket outputs.
pub struct PreviewService {
    db: Arc<Database>,
    registry: Arc<OutputRegistry>,
}

impl PreviewService {
    pub fn new(db: Arc<Database>, registry: Arc<OutputRegistry>) -> Self {
        Self { db, registry }
    }

    /// Render the ticket of a sample order of `event_id` with `provider`.
    ///
    /// Returns `Ok(None)` when the event has no enabled output with that identifier.
    pub fn preview(
        &self,
        event_id: i64,
        provider: &str,
    ) -> Result<Option<GeneratedFile>, PreviewError> {
        let result: Result<Option<GeneratedFile>, PreviewError> =
            self.db.rolledback_transaction(|conn| {
                let event = select_event(conn, event_id)?
                    .ok_or_else(|| StoreError::not_found("event", event_id))?;
                let Some(output) = self.registry.find_enabled(&event, provider) else {
                    tracing::debug!(event = %event.slug, provider, "No enabled output to preview");
                    return Ok(None);
                };

                let locale = event.settings.locale.as_str();
                let sample = event.settings.name_scheme.sample();

                let product = insert_item(
                    conn,
                    &NewItem {
                        event_id,
                        name: gettext(locale, "Sample product").to_string(),
                        description: Some(gettext(locale, "Sample product description").to_string()),
                        default_price_cents: PRODUCT_PRICE_CENTS,
                        admission: true,
                    },
                )?;
                let workshop = insert_item(
                    conn,
                    &NewItem {
                        event_id,
                        name: gettext(locale, "Sample workshop").to_string(),
                        description: None,
                        default_price_cents: WORKSHOP_PRICE_CENTS,
                        admission: false,
                    },
                )?;

                let now = Utc::now();
                let order = insert_order(
                    conn,
                    &NewOrder {
                        event_id,
                        code: PREVIEW_ORDER_CODE.to_string(),
                        status: OrderStatus::Pending,
                        locale: locale.to_string(),
                        email: Some("sample@example.com".to_string()),
                        total_cents: ORDER_TOTAL_CENTS,
                        datetime: now,
                        expires: now,
                    },
                )?;

                let primary = insert_position(
                    conn,
                    &NewPosition {
                        order_id: order.id,
                        item_id: product.id,
                        addon_to: None,
                        price_cents: product.default_price_cents,
                        attendee_name_parts: sample.clone(),
                    },
                )?;
                for _ in 0..2 {
                    insert_position(
                        conn,
                        &NewPosition {
                            order_id: order.id,
                            item_id: workshop.id,
                            addon_to: Some(primary.id),
                            price_cents: product.default_price_cents,
                            attendee_name_parts: sample.clone(),
                        },
                    )?;
                }
                insert_invoice_address(
                    conn,
                    &NewInvoiceAddress {
                        order_id: order.id,
                        company: gettext(locale, "Sample company").to_string(),
                        name_parts: sample,
                    },
                )?;

                let ctx = load_position_context(conn, primary.id)?;
                output
                    .generate(&ctx)
                    .map(Some)
                    .map_err(|source| PreviewError::Output {
                        provider: provider.to_string(),
                        source,
                    })
            });

        let outcome = match &result {
            Ok(Some(_)) => "success",
            Ok(None) => "no_output",
            Err(_) => "failed",
        };
        metrics::PREVIEWS_TOTAL
            .with_label_values(&[provider, outcome])
            .inc();
        if let Err(e) = &result {
            tracing::warn!(event_id, provider, error = %e, "Preview failed");
        }
        result
    }
}
