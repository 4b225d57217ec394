//! Events, orders and positions as seen by ticket generation.
//!
//! Orders are created by the order placement flow; this crate only reads
//! them, except for the throwaway sample order built by the preview.

mod names;
pub(crate) mod sqlite;
mod types;

pub use names::{NameParts, NameScheme};
pub use sqlite::SqliteOrderStore;
pub use types::*;

use crate::database::StoreError;

/// Trait for order storage backends.
pub trait OrderStore: Send + Sync {
    /// Create an event.
    fn create_event(&self, request: NewEvent) -> Result<Event, StoreError>;

    /// Get an event by ID.
    fn get_event(&self, id: i64) -> Result<Option<Event>, StoreError>;

    /// Create a catalog item.
    fn create_item(&self, request: NewItem) -> Result<Item, StoreError>;

    /// List the items of an event.
    fn list_items(&self, event_id: i64) -> Result<Vec<Item>, StoreError>;

    /// Create an order.
    fn create_order(&self, request: NewOrder) -> Result<Order, StoreError>;

    /// Get an order by ID.
    fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError>;

    /// Find an order by its code within an event.
    fn find_order(&self, event_id: i64, code: &str) -> Result<Option<Order>, StoreError>;

    /// List the orders of an event.
    fn list_orders(&self, event_id: i64) -> Result<Vec<Order>, StoreError>;

    /// Update an order's status.
    fn set_order_status(&self, id: i64, status: OrderStatus) -> Result<Order, StoreError>;

    /// Add a position to an order.
    fn create_position(&self, request: NewPosition) -> Result<OrderPosition, StoreError>;

    /// Attach an invoice address to an order.
    fn create_invoice_address(
        &self,
        request: NewInvoiceAddress,
    ) -> Result<InvoiceAddress, StoreError>;

    /// List invoice addresses of all orders of an event.
    fn list_invoice_addresses(&self, event_id: i64) -> Result<Vec<InvoiceAddress>, StoreError>;

    /// Load an order with its event, positions and items.
    ///
    /// Fails with [`StoreError::NotFound`] if the order does not exist.
    fn order_context(&self, order_id: i64) -> Result<OrderContext, StoreError>;

    /// Load a position with its order, event, item and add-ons.
    ///
    /// Fails with [`StoreError::NotFound`] if the position does not exist.
    fn position_context(&self, position_id: i64) -> Result<PositionContext, StoreError>;
}
