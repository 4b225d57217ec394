//! Registry of ticket output factories.

use std::fmt;
use std::sync::Arc;

use super::TicketOutput;
use crate::orders::Event;

type OutputFactory = Arc<dyn Fn(&Event) -> Box<dyn TicketOutput> + Send + Sync>;

/// Ordered collection of output factories.
#[derive(Clone, Default)]
pub struct OutputRegistry {
    factories: Vec<OutputFactory>,
}

impl fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputRegistry")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory that builds the output for a given event.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn(&Event) -> Box<dyn TicketOutput> + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_output<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Event) -> Box<dyn TicketOutput> + Send + Sync + 'static,
    {
        self.register(factory);
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// All outputs bound to `event`, in registration order.
    pub fn outputs_for(&self, event: &Event) -> Vec<Box<dyn TicketOutput>> {
        self.factories.iter().map(|factory| factory(event)).collect()
    }

    /// The enabled output with the given identifier, if any.
    pub fn find_enabled(&self, event: &Event, identifier: &str) -> Option<Box<dyn TicketOutput>> {
        self.factories
            .iter()
            .map(|factory| factory(event))
            .find(|output| output.is_enabled() && output.identifier() == identifier)
    }
}
