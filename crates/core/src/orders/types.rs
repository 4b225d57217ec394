//! Order domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NameParts, NameScheme};

/// Per-output settings stored on an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Offer one combined document per order instead of one per position.
    #[serde(default)]
    pub multi_download: bool,
}

/// Event settings relevant to ticket downloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_true")]
    pub ticket_download: bool,
    /// Downloads open at this time (None = immediately).
    #[serde(default)]
    pub ticket_download_date: Option<DateTime<Utc>>,
    /// Allow downloads for orders that are not paid yet.
    #[serde(default)]
    pub ticket_download_pending: bool,
    /// Offer separate tickets for add-on positions.
    #[serde(default)]
    pub ticket_download_addons: bool,
    /// Offer tickets for positions whose item grants no admission.
    #[serde(default = "default_true")]
    pub ticket_download_nonadm: bool,
    #[serde(default)]
    pub name_scheme: NameScheme,
    /// Output settings keyed by output identifier.
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputSettings>,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            ticket_download: true,
            ticket_download_date: None,
            ticket_download_pending: false,
            ticket_download_addons: false,
            ticket_download_nonadm: true,
            name_scheme: NameScheme::default(),
            outputs: BTreeMap::new(),
        }
    }
}

impl EventSettings {
    /// Settings for one output (all off when unset).
    pub fn output(&self, identifier: &str) -> OutputSettings {
        self.outputs.get(identifier).cloned().unwrap_or_default()
    }

    /// Enable an output, optionally in combined (multi download) mode.
    pub fn with_output(mut self, identifier: impl Into<String>, multi_download: bool) -> Self {
        self.outputs.insert(
            identifier.into(),
            OutputSettings {
                enabled: true,
                multi_download,
            },
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub settings: EventSettings,
}

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub default_price_cents: i64,
    /// Whether the item grants venue admission.
    pub admission: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Expired,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Expired => "expired",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "expired" => Some(OrderStatus::Expired),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub event_id: i64,
    pub code: String,
    pub status: OrderStatus,
    pub locale: String,
    pub email: Option<String>,
    pub total_cents: i64,
    pub datetime: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl Order {
    /// Whether the event currently offers ticket downloads for this order.
    pub fn ticket_download_available(&self, settings: &EventSettings, now: DateTime<Utc>) -> bool {
        if !settings.ticket_download {
            return false;
        }
        if settings.ticket_download_date.is_some_and(|opens| now < opens) {
            return false;
        }
        match self.status {
            OrderStatus::Paid => true,
            OrderStatus::Pending => settings.ticket_download_pending,
            OrderStatus::Expired | OrderStatus::Canceled => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPosition {
    pub id: i64,
    pub order_id: i64,
    /// Index of the position, unique within its order.
    pub positionid: u32,
    pub item_id: i64,
    /// Parent position when this is an add-on.
    pub addon_to: Option<i64>,
    pub price_cents: i64,
    pub attendee_name_parts: NameParts,
}

impl OrderPosition {
    pub fn is_addon(&self) -> bool {
        self.addon_to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAddress {
    pub id: i64,
    pub order_id: i64,
    pub company: String,
    pub name_parts: NameParts,
}

/// Request to create an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub slug: String,
    pub name: String,
    pub settings: EventSettings,
}

/// Request to create an item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub event_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub default_price_cents: i64,
    pub admission: bool,
}

/// Request to create an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub event_id: i64,
    pub code: String,
    pub status: OrderStatus,
    pub locale: String,
    pub email: Option<String>,
    pub total_cents: i64,
    pub datetime: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// Request to create an order position.
///
/// `positionid` is assigned as the next free index of the order.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub order_id: i64,
    pub item_id: i64,
    pub addon_to: Option<i64>,
    pub price_cents: i64,
    pub attendee_name_parts: NameParts,
}

/// Request to create an invoice address.
#[derive(Debug, Clone)]
pub struct NewInvoiceAddress {
    pub order_id: i64,
    pub company: String,
    pub name_parts: NameParts,
}

/// A position together with its item.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionLine {
    pub position: OrderPosition,
    pub item: Item,
}

/// Everything needed to render or resolve the tickets of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderContext {
    pub event: Event,
    pub order: Order,
    /// Positions ordered by `positionid`.
    pub lines: Vec<PositionLine>,
    pub invoice_address: Option<InvoiceAddress>,
}

impl OrderContext {
    /// Language all user-facing text should render in.
    pub fn locale(&self) -> &str {
        &self.order.locale
    }

    pub fn line(&self, position_id: i64) -> Option<&PositionLine> {
        self.lines.iter().find(|l| l.position.id == position_id)
    }

    /// Add-on lines attached to `position_id`.
    pub fn addons_of(&self, position_id: i64) -> impl Iterator<Item = &PositionLine> {
        self.lines
            .iter()
            .filter(move |l| l.position.addon_to == Some(position_id))
    }

    /// Narrow the context to one of its positions.
    pub fn for_position(&self, position_id: i64) -> Option<PositionContext> {
        let line = self.line(position_id)?.clone();
        Some(PositionContext {
            event: self.event.clone(),
            order: self.order.clone(),
            addons: self.addons_of(position_id).cloned().collect(),
            line,
            invoice_address: self.invoice_address.clone(),
        })
    }
}

/// Everything needed to render the ticket of one position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionContext {
    pub event: Event,
    pub order: Order,
    pub line: PositionLine,
    pub addons: Vec<PositionLine>,
    pub invoice_address: Option<InvoiceAddress>,
}

impl PositionContext {
    pub fn locale(&self) -> &str {
        &self.order.locale
    }

    pub fn position(&self) -> &OrderPosition {
        &self.line.position
    }

    pub fn item(&self) -> &Item {
        &self.line.item
    }

    /// Attendee name in the event's name scheme.
    pub fn attendee_name(&self) -> String {
        self.event
            .settings
            .name_scheme
            .concatenate(&self.line.position.attendee_name_parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: 1,
            event_id: 1,
            code: "ABC12".to_string(),
            status,
            locale: "en".to_string(),
            email: None,
            total_cents: 0,
            datetime: Utc::now(),
            expires: Utc::now(),
        }
    }

    #[test]
    fn test_download_available_for_paid_order() {
        let settings = EventSettings::default();
        assert!(order(OrderStatus::Paid).ticket_download_available(&settings, Utc::now()));
    }

    #[test]
    fn test_download_unavailable_when_disabled() {
        let settings = EventSettings {
            ticket_download: false,
            ..Default::default()
        };
        assert!(!order(OrderStatus::Paid).ticket_download_available(&settings, Utc::now()));
    }

    #[test]
    fn test_download_respects_download_date() {
        let now = Utc::now();
        let settings = EventSettings {
            ticket_download_date: Some(now + Duration::hours(1)),
            ..Default::default()
        };
        let paid = order(OrderStatus::Paid);
        assert!(!paid.ticket_download_available(&settings, now));
        assert!(paid.ticket_download_available(&settings, now + Duration::hours(2)));
    }

    #[test]
    fn test_download_for_pending_orders_needs_setting() {
        let pending = order(OrderStatus::Pending);
        assert!(!pending.ticket_download_available(&EventSettings::default(), Utc::now()));

        let settings = EventSettings {
            ticket_download_pending: true,
            ..Default::default()
        };
        assert!(pending.ticket_download_available(&settings, Utc::now()));
        assert!(!order(OrderStatus::Canceled).ticket_download_available(&settings, Utc::now()));
    }

    #[test]
    fn test_event_settings_defaults_from_empty_json() {
        let settings: EventSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EventSettings::default());
        assert!(settings.ticket_download_nonadm);
        assert!(!settings.ticket_download_addons);
        assert!(!settings.output("pdf").enabled);
    }

    #[test]
    fn test_order_status_roundtrip_names() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Expired,
            OrderStatus::Canceled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("refunded"), None);
    }
}
