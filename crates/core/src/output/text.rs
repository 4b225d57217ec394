//! Plain-text ticket output.

use std::fmt::Write;

use super::{GeneratedFile, OutputError, TicketOutput};
use crate::i18n::gettext;
use crate::orders::{Event, OrderContext, OutputSettings, PositionContext, PositionLine};

const IDENTIFIER: &str = "text";
const CONTENT_TYPE: &str = "text/plain";

/// Renders tickets as plain UTF-8 text.
///
/// Enabled per event through the `text` entry of the event's output
/// settings; `multi_download` switches to one combined file per order.
#[derive(Debug, Clone)]
pub struct TextTicketOutput {
    settings: OutputSettings,
}

impl TextTicketOutput {
    pub fn new(settings: OutputSettings) -> Self {
        Self { settings }
    }

    /// Factory for [`OutputRegistry::register`](super::OutputRegistry::register).
    pub fn for_event(event: &Event) -> Box<dyn TicketOutput> {
        Box::new(Self::new(event.settings.output(IDENTIFIER)))
    }

    fn render_line(
        out: &mut String,
        locale: &str,
        event: &Event,
        line: &PositionLine,
        addons: &[&PositionLine],
    ) -> std::fmt::Result {
        let t = |msgid| gettext(locale, msgid);
        let name = event
            .settings
            .name_scheme
            .concatenate(&line.position.attendee_name_parts);

        writeln!(out, "{}: {}", t("Position"), line.position.positionid)?;
        writeln!(out, "{}: {}", t("Product"), line.item.name)?;
        if !name.is_empty() {
            writeln!(out, "{}: {}", t("Attendee"), name)?;
        }
        writeln!(out, "{}: {}", t("Price"), format_price(line.position.price_cents))?;
        if !addons.is_empty() {
            writeln!(out, "{}:", t("Add-ons"))?;
            for addon in addons {
                writeln!(out, "  - {}", addon.item.name)?;
            }
        }
        Ok(())
    }

    fn header(out: &mut String, locale: &str, ctx_event: &Event, code: &str) -> std::fmt::Result {
        writeln!(out, "{}", ctx_event.name)?;
        writeln!(out, "{}: {}", gettext(locale, "Order"), code)?;
        writeln!(out)
    }
}

impl TicketOutput for TextTicketOutput {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn verbose_name(&self) -> &str {
        "Plain text"
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn multi_download_enabled(&self) -> bool {
        self.settings.multi_download
    }

    fn generate(&self, position: &PositionContext) -> Result<GeneratedFile, OutputError> {
        let locale = position.locale();
        let addons: Vec<&PositionLine> = position.addons.iter().collect();

        let mut out = String::new();
        Self::header(&mut out, locale, &position.event, &position.order.code)
            .and_then(|_| {
                Self::render_line(&mut out, locale, &position.event, &position.line, &addons)
            })
            .map_err(|e| OutputError::render_failed(e.to_string()))?;

        Ok(GeneratedFile::new(
            format!(
                "{}-{}-{}.txt",
                position.event.slug,
                position.order.code,
                position.position().positionid
            ),
            CONTENT_TYPE,
            out,
        ))
    }

    fn generate_order(&self, order: &OrderContext) -> Result<GeneratedFile, OutputError> {
        let locale = order.locale();
        let mut out = String::new();

        let render = |out: &mut String| -> std::fmt::Result {
            Self::header(out, locale, &order.event, &order.order.code)?;
            for (i, line) in order.lines.iter().enumerate() {
                if i > 0 {
                    writeln!(out, "----")?;
                }
                let addons: Vec<&PositionLine> = order.addons_of(line.position.id).collect();
                Self::render_line(out, locale, &order.event, line, &addons)?;
            }
            Ok(())
        };
        render(&mut out).map_err(|e| OutputError::render_failed(e.to_string()))?;

        Ok(GeneratedFile::new(
            format!("{}-{}.txt", order.event.slug, order.order.code),
            CONTENT_TYPE,
            out,
        ))
    }
}

fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
