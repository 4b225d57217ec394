//! Mock ticket output for testing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::orders::{Event, OrderContext, PositionContext};
use crate::output::{GeneratedFile, OutputError, TicketOutput};

#[derive(Debug)]
struct MockState {
    enabled: bool,
    multi_download: bool,
    failing: bool,
    panicking: bool,
    /// Position IDs whose rendering fails.
    failing_positions: HashSet<i64>,
    /// Time each render blocks before returning.
    delay: Option<Duration>,
    calls: usize,
    order_calls: usize,
}

/// Mock implementation of the TicketOutput trait.
///
/// Provides controllable behavior for testing:
/// - Count single and combined renders
/// - Simulate failures, globally or per position
/// - Simulate panics
/// - Simulate slow renders
///
/// Clones share their state, so a test keeps one handle while the registry
/// builds outputs from [`factory`](Self::factory).
///
/// # Example
///
/// ```rust,ignore
/// use tixcache_core::testing::MockTicketOutput;
///
/// let pdf = MockTicketOutput::new("pdf");
/// let registry = OutputRegistry::new().with_output(pdf.factory());
///
/// // ... resolve tickets ...
///
/// assert_eq!(pdf.calls(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockTicketOutput {
    identifier: String,
    extension: String,
    content_type: String,
    state: Arc<Mutex<MockState>>,
}

impl MockTicketOutput {
    /// Create an enabled per-position output producing `.pdf` files.
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            extension: ".pdf".to_string(),
            content_type: "application/pdf".to_string(),
            state: Arc::new(Mutex::new(MockState {
                enabled: true,
                multi_download: false,
                failing: false,
                panicking: false,
                failing_positions: HashSet::new(),
                delay: None,
                calls: 0,
                order_calls: 0,
            })),
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.lock().enabled = enabled;
        self
    }

    pub fn with_multi_download(self, multi_download: bool) -> Self {
        self.lock().multi_download = multi_download;
        self
    }

    /// Change the extension (including the dot) and MIME type of rendered files.
    pub fn with_file_type(mut self, extension: &str, content_type: &str) -> Self {
        self.extension = extension.to_string();
        self.content_type = content_type.to_string();
        self
    }

    /// A registry factory handing out clones of this mock.
    pub fn factory(&self) -> impl Fn(&Event) -> Box<dyn TicketOutput> + Send + Sync + 'static {
        let output = self.clone();
        move |_event: &Event| Box::new(output.clone()) as Box<dyn TicketOutput>
    }

    /// Make every render fail.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Make renders panic.
    pub fn set_panicking(&self, panicking: bool) {
        self.lock().panicking = panicking;
    }

    /// Make renders of one position fail.
    pub fn fail_position(&self, position_id: i64) {
        self.lock().failing_positions.insert(position_id);
    }

    /// Block every render for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Number of single-position renders.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Number of combined-order renders.
    pub fn order_calls(&self) -> usize {
        self.lock().order_calls
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, failing: bool, panicking: bool) -> Result<(), OutputError> {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if panicking {
            panic!("mock output {} panicked", self.identifier);
        }
        if failing {
            return Err(OutputError::render_failed(format!(
                "mock output {} failed",
                self.identifier
            )));
        }
        Ok(())
    }
}

impl TicketOutput for MockTicketOutput {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    fn multi_download_enabled(&self) -> bool {
        self.lock().multi_download
    }

    fn generate(&self, position: &PositionContext) -> Result<GeneratedFile, OutputError> {
        let (failing, panicking) = {
            let mut state = self.lock();
            state.calls += 1;
            let failing =
                state.failing || state.failing_positions.contains(&position.position().id);
            (failing, state.panicking)
        };
        self.check(failing, panicking)?;

        Ok(GeneratedFile::new(
            format!(
                "{}-{}{}",
                position.order.code,
                position.position().positionid,
                self.extension
            ),
            self.content_type.clone(),
            format!(
                "{} ticket for {} position {}",
                self.identifier,
                position.order.code,
                position.position().positionid
            ),
        ))
    }

    fn generate_order(&self, order: &OrderContext) -> Result<GeneratedFile, OutputError> {
        let (failing, panicking) = {
            let mut state = self.lock();
            state.order_calls += 1;
            (state.failing, state.panicking)
        };
        self.check(failing, panicking)?;

        Ok(GeneratedFile::new(
            format!("{}{}", order.order.code, self.extension),
            self.content_type.clone(),
            format!(
                "{} tickets for {} ({} positions)",
                self.identifier,
                order.order.code,
                order.lines.len()
            ),
        ))
    }
}
