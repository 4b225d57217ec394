//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the extension traits
//! (ticket outputs, file storage, download permissions) and fixtures that
//! seed an in-memory database, so ticket resolution can be tested without
//! real renderers or disks.
//!
//! # Example
//!
//! ```rust,ignore
//! use tixcache_core::testing::{fixtures::Fixture, MockTicketOutput};
//!
//! let fixture = Fixture::new();
//! let seeded = fixture.seed_conference(EventSettings::default());
//! let pdf = MockTicketOutput::new("pdf");
//!
//! let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));
//! let tickets = resolver.tickets_for_order(seeded.order.id).await?;
//! ```

mod memory_storage;
mod mock_output;

pub use memory_storage::MemoryFileStorage;
pub use mock_output::MockTicketOutput;

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::orders::OrderContext;
use crate::resolver::DownloadPermission;

/// Download permission responder with a fixed answer.
#[derive(Debug)]
pub struct StaticPermission {
    allow: bool,
    asked: AtomicUsize,
}

impl StaticPermission {
    pub fn allow() -> Self {
        Self {
            allow: true,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn deny() -> Self {
        Self {
            allow: false,
            asked: AtomicUsize::new(0),
        }
    }

    /// How often the responder was asked.
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl DownloadPermission for StaticPermission {
    fn allows_download(&self, _order: &OrderContext) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.allow
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::MemoryFileStorage;
    use crate::cache::SqliteTicketCache;
    use crate::database::Database;
    use crate::generation::{InlineDispatcher, TicketGenerator};
    use crate::orders::{
        Event, EventSettings, NameParts, NewEvent, NewItem, NewOrder, NewPosition, Order,
        OrderPosition, OrderStatus, OrderStore, SqliteOrderStore,
    };
    use crate::output::OutputRegistry;
    use crate::resolver::TicketResolver;

    /// Stores sharing one in-memory database, with in-memory file storage.
    pub struct Fixture {
        pub db: Arc<Database>,
        pub orders: Arc<SqliteOrderStore>,
        pub cache: Arc<SqliteTicketCache>,
        pub storage: Arc<MemoryFileStorage>,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self::new()
        }
    }

    /// The order created by [`Fixture::seed_conference`].
    #[derive(Debug, Clone)]
    pub struct SeededOrder {
        pub event: Event,
        pub order: Order,
        /// Admission ticket, position 1.
        pub ticket: OrderPosition,
        /// Workshop add-on to the ticket, position 2.
        pub addon: OrderPosition,
        /// T-shirt without admission, position 3.
        pub merch: OrderPosition,
    }

    impl Fixture {
        pub fn new() -> Self {
            let db = Arc::new(Database::in_memory().expect("in-memory database"));
            let storage = Arc::new(MemoryFileStorage::new());
            let orders = Arc::new(SqliteOrderStore::new(Arc::clone(&db)).expect("order schema"));
            let cache = Arc::new(
                SqliteTicketCache::new(Arc::clone(&db), storage.clone()).expect("cache schema"),
            );
            Self {
                db,
                orders,
                cache,
                storage,
            }
        }

        /// A generator over this fixture's stores.
        pub fn generator(&self, registry: OutputRegistry) -> Arc<TicketGenerator> {
            Arc::new(TicketGenerator::new(
                self.orders.clone(),
                self.cache.clone(),
                Arc::new(registry),
            ))
        }

        /// A resolver generating inline, with no permission responders.
        pub fn resolver(&self, registry: OutputRegistry) -> TicketResolver {
            let registry = Arc::new(registry);
            let generator = Arc::new(TicketGenerator::new(
                self.orders.clone(),
                self.cache.clone(),
                Arc::clone(&registry),
            ));
            TicketResolver::new(
                self.orders.clone(),
                self.cache.clone(),
                registry,
                Arc::new(InlineDispatcher::new(generator)),
            )
        }

        /// Create an event.
        pub fn create_event(&self, slug: &str, settings: EventSettings) -> Event {
            self.orders
                .create_event(NewEvent {
                    slug: slug.to_string(),
                    name: format!("{} 2026", slug),
                    settings,
                })
                .expect("create event")
        }

        /// Seed event `conf` with paid order `ABC12`.
        pub fn seed_conference(&self, settings: EventSettings) -> SeededOrder {
            let event = self.create_event("conf", settings);
            let item = |name: &str, price: i64, admission: bool| {
                self.orders
                    .create_item(NewItem {
                        event_id: event.id,
                        name: name.to_string(),
                        description: None,
                        default_price_cents: price,
                        admission,
                    })
                    .expect("create item")
            };
            let ticket_item = item("Conference ticket", 4223, true);
            let workshop_item = item("Workshop", 2340, true);
            let shirt_item = item("T-Shirt", 1500, false);

            let now = Utc::now();
            let order = self
                .orders
                .create_order(NewOrder {
                    event_id: event.id,
                    code: "ABC12".to_string(),
                    status: OrderStatus::Paid,
                    locale: "en".to_string(),
                    email: Some("buyer@example.com".to_string()),
                    total_cents: 4223 + 2340 + 1500,
                    datetime: now,
                    expires: now + Duration::days(14),
                })
                .expect("create order");

            let position = |item_id: i64, price: i64, addon_to: Option<i64>| {
                let mut names = NameParts::new();
                names.insert("full_name".to_string(), "Ada Lovelace".to_string());
                self.orders
                    .create_position(NewPosition {
                        order_id: order.id,
                        item_id,
                        addon_to,
                        price_cents: price,
                        attendee_name_parts: names,
                    })
                    .expect("create position")
            };
            let ticket = position(ticket_item.id, 4223, None);
            let addon = position(workshop_item.id, 2340, Some(ticket.id));
            let merch = position(shirt_item.id, 1500, None);

            SeededOrder {
                event,
                order,
                ticket,
                addon,
                merch,
            }
        }
    }
}
