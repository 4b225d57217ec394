//! Ticket outputs: pluggable renderers that turn an order position (or a
//! whole order) into a downloadable document.
//!
//! Outputs are registered as factories on an [`OutputRegistry`]. For every
//! event the registry instantiates one output per factory, in registration
//! order, so each output can read its settings from the event.
//!
//! # Example
//!
//! ```ignore
//! use tixcache_core::output::{OutputRegistry, TextTicketOutput};
//!
//! let registry = OutputRegistry::new().with_output(TextTicketOutput::for_event);
//!
//! for output in registry.outputs_for(&event) {
//!     println!("{} enabled: {}", output.identifier(), output.is_enabled());
//! }
//! ```

mod registry;
mod text;

pub use registry::OutputRegistry;
pub use text::TextTicketOutput;

use thiserror::Error;

use crate::cache::file_extension;
use crate::orders::{OrderContext, PositionContext};

/// A rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub filename: String,
    /// MIME type of `data`.
    pub content_type: String,
    pub data: Vec<u8>,
}

impl GeneratedFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Extension of the filename including the dot (may be empty).
    pub fn extension(&self) -> String {
        file_extension(&self.filename)
    }
}

/// Errors raised by ticket outputs.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The output cannot render this kind of document.
    #[error("Output {identifier} does not support {operation}")]
    Unsupported {
        identifier: String,
        operation: &'static str,
    },

    /// Rendering failed.
    #[error("Rendering failed: {reason}")]
    RenderFailed { reason: String },
}

impl OutputError {
    pub fn render_failed(reason: impl Into<String>) -> Self {
        Self::RenderFailed {
            reason: reason.into(),
        }
    }
}

/// A ticket output bound to one event.
pub trait TicketOutput: Send + Sync {
    /// Unique identifier, used in cache keys and download filenames.
    fn identifier(&self) -> &str;

    /// Human readable name.
    fn verbose_name(&self) -> &str {
        self.identifier()
    }

    /// Whether the event has this output turned on.
    fn is_enabled(&self) -> bool;

    /// Whether the output offers one combined document per order instead of
    /// one document per position.
    fn multi_download_enabled(&self) -> bool {
        false
    }

    /// Render the ticket of a single position.
    fn generate(&self, position: &PositionContext) -> Result<GeneratedFile, OutputError>;

    /// Render one document covering the whole order.
    fn generate_order(&self, order: &OrderContext) -> Result<GeneratedFile, OutputError> {
        let _ = order;
        Err(OutputError::Unsupported {
            identifier: self.identifier().to_string(),
            operation: "combined order documents",
        })
    }
}
