//! SQLite-backed order store implementation.
//!
//! The query functions take a plain `&Connection` so they can run both on the
//! shared connection and inside the preview's rolled-back transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use super::{
    Event, InvoiceAddress, Item, NewEvent, NewInvoiceAddress, NewItem, NewOrder, NewPosition,
    Order, OrderContext, OrderPosition, OrderStatus, OrderStore, PositionContext, PositionLine,
};
use crate::database::{Database, StoreError};

const EVENT_COLUMNS: &str = "id, slug, name, settings";
const ITEM_COLUMNS: &str = "id, event_id, name, description, default_price_cents, admission";
const ORDER_COLUMNS: &str =
    "id, event_id, code, status, locale, email, total_cents, datetime, expires";
const POSITION_COLUMNS: &str =
    "id, order_id, positionid, item_id, addon_to, price_cents, attendee_name_parts";
const INVOICE_ADDRESS_COLUMNS: &str = "id, order_id, company, name_parts";

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    db: Arc<Database>,
}

impl SqliteOrderStore {
    /// Create the store on a shared database, creating tables if needed.
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        db.with_connection(initialize_schema)?;
        Ok(Self { db })
    }

    /// Create a store on a fresh in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(Arc::new(Database::in_memory()?))
    }

    /// The database this store writes to.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

impl OrderStore for SqliteOrderStore {
    fn create_event(&self, request: NewEvent) -> Result<Event, StoreError> {
        self.db.with_connection(|conn| insert_event(conn, &request))
    }

    fn get_event(&self, id: i64) -> Result<Option<Event>, StoreError> {
        self.db.with_connection(|conn| select_event(conn, id))
    }

    fn create_item(&self, request: NewItem) -> Result<Item, StoreError> {
        self.db.with_connection(|conn| insert_item(conn, &request))
    }

    fn list_items(&self, event_id: i64) -> Result<Vec<Item>, StoreError> {
        self.db.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM items WHERE event_id = ? ORDER BY id",
                ITEM_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![event_id], row_to_item)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    fn create_order(&self, request: NewOrder) -> Result<Order, StoreError> {
        self.db.with_connection(|conn| insert_order(conn, &request))
    }

    fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        self.db.with_connection(|conn| select_order(conn, id))
    }

    fn find_order(&self, event_id: i64, code: &str) -> Result<Option<Order>, StoreError> {
        self.db.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM orders WHERE event_id = ? AND code = ?",
                ORDER_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![event_id, code], row_to_order)
                .optional()?)
        })
    }

    fn list_orders(&self, event_id: i64) -> Result<Vec<Order>, StoreError> {
        self.db.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM orders WHERE event_id = ? ORDER BY id",
                ORDER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![event_id], row_to_order)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    fn set_order_status(&self, id: i64, status: OrderStatus) -> Result<Order, StoreError> {
        self.db.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE orders SET status = ? WHERE id = ?",
                params![status.as_str(), id],
            )?;
            if updated == 0 {
                return Err(StoreError::not_found("order", id));
            }
            select_order(conn, id)?.ok_or_else(|| StoreError::not_found("order", id))
        })
    }

    fn create_position(&self, request: NewPosition) -> Result<OrderPosition, StoreError> {
        self.db.with_connection(|conn| insert_position(conn, &request))
    }

    fn create_invoice_address(
        &self,
        request: NewInvoiceAddress,
    ) -> Result<InvoiceAddress, StoreError> {
        self.db
            .with_connection(|conn| insert_invoice_address(conn, &request))
    }

    fn list_invoice_addresses(&self, event_id: i64) -> Result<Vec<InvoiceAddress>, StoreError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.order_id, a.company, a.name_parts
                 FROM invoice_addresses a JOIN orders o ON o.id = a.order_id
                 WHERE o.event_id = ? ORDER BY a.id",
            )?;
            let rows = stmt.query_map(params![event_id], row_to_invoice_address)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    fn order_context(&self, order_id: i64) -> Result<OrderContext, StoreError> {
        self.db
            .with_connection(|conn| load_order_context(conn, order_id))
    }

    fn position_context(&self, position_id: i64) -> Result<PositionContext, StoreError> {
        self.db
            .with_connection(|conn| load_position_context(conn, position_id))
    }
}

pub(crate) fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            settings TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL REFERENCES events(id),
            name TEXT NOT NULL,
            description TEXT,
            default_price_cents INTEGER NOT NULL DEFAULT 0,
            admission INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_items_event ON items(event_id);

        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL REFERENCES events(id),
            code TEXT NOT NULL,
            status TEXT NOT NULL,
            locale TEXT NOT NULL,
            email TEXT,
            total_cents INTEGER NOT NULL DEFAULT 0,
            datetime TEXT NOT NULL,
            expires TEXT NOT NULL,
            UNIQUE(event_id, code)
        );

        CREATE TABLE IF NOT EXISTS order_positions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES orders(id),
            positionid INTEGER NOT NULL,
            item_id INTEGER NOT NULL REFERENCES items(id),
            addon_to INTEGER REFERENCES order_positions(id),
            price_cents INTEGER NOT NULL DEFAULT 0,
            attendee_name_parts TEXT NOT NULL DEFAULT '{}',
            UNIQUE(order_id, positionid)
        );

        CREATE INDEX IF NOT EXISTS idx_order_positions_order ON order_positions(order_id);

        CREATE TABLE IF NOT EXISTS invoice_addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL UNIQUE REFERENCES orders(id),
            company TEXT NOT NULL DEFAULT '',
            name_parts TEXT NOT NULL DEFAULT '{}'
        );
        "#,
    )?;
    Ok(())
}

pub(crate) fn insert_event(conn: &Connection, request: &NewEvent) -> Result<Event, StoreError> {
    let settings_json = serde_json::to_string(&request.settings)?;
    conn.execute(
        "INSERT INTO events (slug, name, settings) VALUES (?, ?, ?)",
        params![request.slug, request.name, settings_json],
    )?;
    Ok(Event {
        id: conn.last_insert_rowid(),
        slug: request.slug.clone(),
        name: request.name.clone(),
        settings: request.settings.clone(),
    })
}

pub(crate) fn select_event(conn: &Connection, id: i64) -> Result<Option<Event>, StoreError> {
    let sql = format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_event).optional()?)
}

pub(crate) fn insert_item(conn: &Connection, request: &NewItem) -> Result<Item, StoreError> {
    conn.execute(
        "INSERT INTO items (event_id, name, description, default_price_cents, admission) VALUES (?, ?, ?, ?, ?)",
        params![
            request.event_id,
            request.name,
            request.description,
            request.default_price_cents,
            request.admission,
        ],
    )?;
    Ok(Item {
        id: conn.last_insert_rowid(),
        event_id: request.event_id,
        name: request.name.clone(),
        description: request.description.clone(),
        default_price_cents: request.default_price_cents,
        admission: request.admission,
    })
}

fn select_item(conn: &Connection, id: i64) -> Result<Option<Item>, StoreError> {
    let sql = format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_item).optional()?)
}

pub(crate) fn insert_order(conn: &Connection, request: &NewOrder) -> Result<Order, StoreError> {
    conn.execute(
        "INSERT INTO orders (event_id, code, status, locale, email, total_cents, datetime, expires) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            request.event_id,
            request.code,
            request.status.as_str(),
            request.locale,
            request.email,
            request.total_cents,
            request.datetime.to_rfc3339(),
            request.expires.to_rfc3339(),
        ],
    )?;
    Ok(Order {
        id: conn.last_insert_rowid(),
        event_id: request.event_id,
        code: request.code.clone(),
        status: request.status,
        locale: request.locale.clone(),
        email: request.email.clone(),
        total_cents: request.total_cents,
        datetime: request.datetime,
        expires: request.expires,
    })
}

fn select_order(conn: &Connection, id: i64) -> Result<Option<Order>, StoreError> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_order).optional()?)
}

pub(crate) fn insert_position(
    conn: &Connection,
    request: &NewPosition,
) -> Result<OrderPosition, StoreError> {
    let positionid: u32 = conn.query_row(
        "SELECT COALESCE(MAX(positionid), 0) + 1 FROM order_positions WHERE order_id = ?",
        params![request.order_id],
        |row| row.get(0),
    )?;
    let name_parts_json = serde_json::to_string(&request.attendee_name_parts)?;
    conn.execute(
        "INSERT INTO order_positions (order_id, positionid, item_id, addon_to, price_cents, attendee_name_parts) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            request.order_id,
            positionid,
            request.item_id,
            request.addon_to,
            request.price_cents,
            name_parts_json,
        ],
    )?;
    Ok(OrderPosition {
        id: conn.last_insert_rowid(),
        order_id: request.order_id,
        positionid,
        item_id: request.item_id,
        addon_to: request.addon_to,
        price_cents: request.price_cents,
        attendee_name_parts: request.attendee_name_parts.clone(),
    })
}

pub(crate) fn insert_invoice_address(
    conn: &Connection,
    request: &NewInvoiceAddress,
) -> Result<InvoiceAddress, StoreError> {
    let name_parts_json = serde_json::to_string(&request.name_parts)?;
    conn.execute(
        "INSERT INTO invoice_addresses (order_id, company, name_parts) VALUES (?, ?, ?)",
        params![request.order_id, request.company, name_parts_json],
    )?;
    Ok(InvoiceAddress {
        id: conn.last_insert_rowid(),
        order_id: request.order_id,
        company: request.company.clone(),
        name_parts: request.name_parts.clone(),
    })
}

fn select_invoice_address(
    conn: &Connection,
    order_id: i64,
) -> Result<Option<InvoiceAddress>, StoreError> {
    let sql = format!(
        "SELECT {} FROM invoice_addresses WHERE order_id = ?",
        INVOICE_ADDRESS_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![order_id], row_to_invoice_address)
        .optional()?)
}

fn select_lines(conn: &Connection, order_id: i64) -> Result<Vec<PositionLine>, StoreError> {
    let sql = format!(
        "SELECT {} FROM order_positions WHERE order_id = ? ORDER BY positionid",
        POSITION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let positions = stmt
        .query_map(params![order_id], row_to_position)?
        .collect::<Result<Vec<_>, _>>()?;

    positions
        .into_iter()
        .map(|position| {
            let item = select_item(conn, position.item_id)?
                .ok_or_else(|| StoreError::not_found("item", position.item_id))?;
            Ok(PositionLine { position, item })
        })
        .collect()
}

pub(crate) fn load_order_context(
    conn: &Connection,
    order_id: i64,
) -> Result<OrderContext, StoreError> {
    let order = select_order(conn, order_id)?.ok_or_else(|| StoreError::not_found("order", order_id))?;
    let event = select_event(conn, order.event_id)?
        .ok_or_else(|| StoreError::not_found("event", order.event_id))?;
    let lines = select_lines(conn, order.id)?;
    let invoice_address = select_invoice_address(conn, order.id)?;
    Ok(OrderContext {
        event,
        order,
        lines,
        invoice_address,
    })
}

pub(crate) fn load_position_context(
    conn: &Connection,
    position_id: i64,
) -> Result<PositionContext, StoreError> {
    let order_id: Option<i64> = conn
        .query_row(
            "SELECT order_id FROM order_positions WHERE id = ?",
            params![position_id],
            |row| row.get(0),
        )
        .optional()?;
    let order_id = order_id.ok_or_else(|| StoreError::not_found("order position", position_id))?;

    load_order_context(conn, order_id)?
        .for_position(position_id)
        .ok_or_else(|| StoreError::not_found("order position", position_id))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_json<T: DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let settings_json: String = row.get(3)?;
    Ok(Event {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        settings: parse_json(3, &settings_json)?,
    })
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        event_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        default_price_cents: row.get(4)?,
        admission: row.get(5)?,
    })
}

fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
    let status_str: String = row.get(3)?;
    let status = OrderStatus::parse(&status_str)
        .ok_or_else(|| conversion_error(3, format!("unknown order status: {}", status_str)))?;
    let datetime_str: String = row.get(7)?;
    let expires_str: String = row.get(8)?;
    Ok(Order {
        id: row.get(0)?,
        event_id: row.get(1)?,
        code: row.get(2)?,
        status,
        locale: row.get(4)?,
        email: row.get(5)?,
        total_cents: row.get(6)?,
        datetime: parse_time(7, &datetime_str)?,
        expires: parse_time(8, &expires_str)?,
    })
}

fn row_to_position(row: &rusqlite::Row) -> rusqlite::Result<OrderPosition> {
    let name_parts_json: String = row.get(6)?;
    Ok(OrderPosition {
        id: row.get(0)?,
        order_id: row.get(1)?,
        positionid: row.get(2)?,
        item_id: row.get(3)?,
        addon_to: row.get(4)?,
        price_cents: row.get(5)?,
        attendee_name_parts: parse_json(6, &name_parts_json)?,
    })
}

fn row_to_invoice_address(row: &rusqlite::Row) -> rusqlite::Result<InvoiceAddress> {
    let name_parts_json: String = row.get(3)?;
    Ok(InvoiceAddress {
        id: row.get(0)?,
        order_id: row.get(1)?,
        company: row.get(2)?,
        name_parts: parse_json(3, &name_parts_json)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{EventSettings, NameParts};

    fn create_test_store() -> SqliteOrderStore {
        SqliteOrderStore::in_memory().unwrap()
    }

    fn seed_order(store: &SqliteOrderStore) -> (Event, Item, Order) {
        let event = store
            .create_event(NewEvent {
                slug: "conf".to_string(),
                name: "Conference".to_string(),
                settings: EventSettings::default().with_output("pdf", false),
            })
            .unwrap();
        let item = store
            .create_item(NewItem {
                event_id: event.id,
                name: "Ticket".to_string(),
                description: None,
                default_price_cents: 5000,
                admission: true,
            })
            .unwrap();
        let order = store
            .create_order(NewOrder {
                event_id: event.id,
                code: "ABC12".to_string(),
                status: OrderStatus::Paid,
                locale: "de".to_string(),
                email: Some("buyer@example.com".to_string()),
                total_cents: 5000,
                datetime: Utc::now(),
                expires: Utc::now(),
            })
            .unwrap();
        (event, item, order)
    }

    fn new_position(order: &Order, item: &Item, addon_to: Option<i64>) -> NewPosition {
        NewPosition {
            order_id: order.id,
            item_id: item.id,
            addon_to,
            price_cents: item.default_price_cents,
            attendee_name_parts: NameParts::new(),
        }
    }

    #[test]
    fn test_event_roundtrip_keeps_settings() {
        let store = create_test_store();
        let (event, _, _) = seed_order(&store);

        let loaded = store.get_event(event.id).unwrap().unwrap();
        assert_eq!(loaded, event);
        assert!(loaded.settings.output("pdf").enabled);
        assert!(store.get_event(9999).unwrap().is_none());
    }

    #[test]
    fn test_positions_get_sequential_positionids() {
        let store = create_test_store();
        let (_, item, order) = seed_order(&store);

        let first = store.create_position(new_position(&order, &item, None)).unwrap();
        let second = store
            .create_position(new_position(&order, &item, Some(first.id)))
            .unwrap();

        assert_eq!(first.positionid, 1);
        assert_eq!(second.positionid, 2);
        assert!(second.is_addon());
    }

    #[test]
    fn test_order_context_loads_lines_in_position_order() {
        let store = create_test_store();
        let (event, item, order) = seed_order(&store);
        let first = store.create_position(new_position(&order, &item, None)).unwrap();
        store
            .create_position(new_position(&order, &item, Some(first.id)))
            .unwrap();

        let ctx = store.order_context(order.id).unwrap();
        assert_eq!(ctx.event.id, event.id);
        assert_eq!(ctx.order.code, "ABC12");
        assert_eq!(ctx.locale(), "de");
        let ids: Vec<u32> = ctx.lines.iter().map(|l| l.position.positionid).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(ctx.addons_of(first.id).count(), 1);
        assert!(ctx.invoice_address.is_none());
    }

    #[test]
    fn test_position_context_includes_addons() {
        let store = create_test_store();
        let (_, item, order) = seed_order(&store);
        let parent = store.create_position(new_position(&order, &item, None)).unwrap();
        store
            .create_position(new_position(&order, &item, Some(parent.id)))
            .unwrap();

        let ctx = store.position_context(parent.id).unwrap();
        assert_eq!(ctx.position().id, parent.id);
        assert_eq!(ctx.item().name, "Ticket");
        assert_eq!(ctx.addons.len(), 1);
    }

    #[test]
    fn test_missing_entities_are_not_found() {
        let store = create_test_store();
        assert!(store.order_context(42).unwrap_err().is_not_found());
        assert!(store.position_context(42).unwrap_err().is_not_found());
        assert!(store
            .set_order_status(42, OrderStatus::Paid)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_set_order_status() {
        let store = create_test_store();
        let (_, _, order) = seed_order(&store);

        let updated = store.set_order_status(order.id, OrderStatus::Canceled).unwrap();
        assert_eq!(updated.status, OrderStatus::Canceled);
        assert_eq!(
            store.get_order(order.id).unwrap().unwrap().status,
            OrderStatus::Canceled
        );
    }

    #[test]
    fn test_duplicate_order_code_rejected() {
        let store = create_test_store();
        let (event, _, order) = seed_order(&store);

        let result = store.create_order(NewOrder {
            event_id: event.id,
            code: order.code.clone(),
            status: OrderStatus::Pending,
            locale: "en".to_string(),
            email: None,
            total_cents: 0,
            datetime: Utc::now(),
            expires: Utc::now(),
        });
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[test]
    fn test_invoice_addresses_listed_per_event() {
        let store = create_test_store();
        let (event, _, order) = seed_order(&store);
        store
            .create_invoice_address(NewInvoiceAddress {
                order_id: order.id,
                company: "ACME".to_string(),
                name_parts: NameParts::new(),
            })
            .unwrap();

        let addresses = store.list_invoice_addresses(event.id).unwrap();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].company, "ACME");
        assert_eq!(
            store.order_context(order.id).unwrap().invoice_address,
            Some(addresses[0].clone())
        );
        assert_eq!(store.find_order(event.id, "ABC12").unwrap(), Some(order));
    }
}
