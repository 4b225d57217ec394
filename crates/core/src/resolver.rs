//! Ticket resolution: the downloadable documents of an order.
//!
//! For every enabled output the resolver returns the cached document, or
//! generates it through the configured [`GenerationDispatcher`] on a miss.
//! Outputs in multi-download mode contribute one combined document per
//! order; all others one document per eligible position.
//!
//! Failures of a single output or position are logged and recorded in
//! [`ResolvedTickets::failures`] without affecting the other documents.
//! A panic inside a generation worker aborts the resolution.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::cache::{CacheError, CacheOwner, CachedTicket, TicketCache};
use crate::database::StoreError;
use crate::generation::{GenerationDispatcher, GenerationError, GenerationRequest};
use crate::metrics;
use crate::orders::{OrderContext, OrderStore, PositionLine};
use crate::output::OutputRegistry;

/// Decides whether an order's tickets may be downloaded.
///
/// Every registered responder must allow the download.
pub trait DownloadPermission: Send + Sync {
    fn allows_download(&self, order: &OrderContext) -> bool;
}

/// Errors that abort a resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The order could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// A generation failed in a way that indicates a bug.
    #[error("Generation of {provider} for {owner} failed: {source}")]
    Generation {
        owner: CacheOwner,
        provider: String,
        #[source]
        source: GenerationError,
    },

    /// No resolved ticket has the requested filename.
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ResolveError::Store(e) => e.is_not_found(),
            ResolveError::TicketNotFound(_) => true,
            _ => false,
        }
    }
}

/// A document available for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketDownload {
    /// Display filename.
    pub filename: String,
    pub provider: String,
    /// None for combined order documents.
    pub position_id: Option<i64>,
    pub entry: CachedTicket,
}

/// A document that could not be provided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketFailure {
    pub provider: String,
    pub position_id: Option<i64>,
    pub error: String,
}

/// Result of a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedTickets {
    /// In output order, then position order.
    pub downloads: Vec<TicketDownload>,
    pub failures: Vec<TicketFailure>,
}

impl ResolvedTickets {
    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.downloads.iter().map(|d| d.filename.as_str()).collect()
    }

    pub fn find(&self, filename: &str) -> Option<&TicketDownload> {
        self.downloads.iter().find(|d| d.filename == filename)
    }
}

/// The bytes of a resolved ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedTicket {
    pub filename: String,
    pub provider: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Resolves the downloadable tickets of orders.
pub struct TicketResolver {
    orders: Arc<dyn OrderStore>,
    cache: Arc<dyn TicketCache>,
    registry: Arc<OutputRegistry>,
    dispatcher: Arc<dyn GenerationDispatcher>,
    permissions: Vec<Arc<dyn DownloadPermission>>,
    timeout: Option<Duration>,
}

impl TicketResolver {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        cache: Arc<dyn TicketCache>,
        registry: Arc<OutputRegistry>,
        dispatcher: Arc<dyn GenerationDispatcher>,
    ) -> Self {
        Self {
            orders,
            cache,
            registry,
            dispatcher,
            permissions: Vec::new(),
            timeout: None,
        }
    }

    /// Add a download permission responder.
    pub fn with_permission(mut self, permission: Arc<dyn DownloadPermission>) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Limit how long to wait for each queued generation.
    ///
    /// Has no effect with [`InlineDispatcher`](crate::generation::InlineDispatcher),
    /// whose handles are resolved before they are returned.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the tickets of the order with the given ID.
    pub async fn tickets_for_order(&self, order_id: i64) -> Result<ResolvedTickets, ResolveError> {
        let ctx = self.orders.order_context(order_id)?;
        self.tickets_for(&ctx).await
    }

    /// Resolve the tickets of a loaded order.
    ///
    /// Returns an empty result when a responder vetoes the download or the
    /// event does not offer downloads for the order right now.
    pub async fn tickets_for(&self, ctx: &OrderContext) -> Result<ResolvedTickets, ResolveError> {
        let order_code = ctx.order.code.as_str();
        if !self.permissions.iter().all(|p| p.allows_download(ctx)) {
            tracing::debug!(order = order_code, "Ticket download vetoed");
            return Ok(ResolvedTickets::default());
        }
        let settings = &ctx.event.settings;
        if !ctx.order.ticket_download_available(settings, Utc::now()) {
            tracing::debug!(
                order = order_code,
                status = ctx.order.status.as_str(),
                "Ticket download not available"
            );
            return Ok(ResolvedTickets::default());
        }

        let slug = ctx.event.slug.to_uppercase();
        let mut resolved = ResolvedTickets::default();

        let outputs: Vec<(String, bool)> = self
            .registry
            .outputs_for(&ctx.event)
            .into_iter()
            .filter(|output| output.is_enabled())
            .map(|output| (output.identifier().to_string(), output.multi_download_enabled()))
            .collect();

        for (provider, multi_download) in outputs {
            if multi_download {
                let owner = CacheOwner::Order(ctx.order.id);
                match self.cached_or_generate(owner, &provider).await {
                    Ok(entry) => resolved.downloads.push(TicketDownload {
                        filename: format!("{}-{}-{}{}", slug, order_code, provider, entry.extension),
                        provider: provider.clone(),
                        position_id: None,
                        entry,
                    }),
                    Err(e) => record_failure(&mut resolved, owner, &provider, None, e)?,
                }
                continue;
            }

            for line in ctx.lines.iter().filter(|line| eligible(ctx, line)) {
                let position = &line.position;
                let owner = CacheOwner::OrderPosition(position.id);
                match self.cached_or_generate(owner, &provider).await {
                    Ok(entry) => resolved.downloads.push(TicketDownload {
                        filename: format!(
                            "{}-{}-{}-{}{}",
                            slug, order_code, position.positionid, provider, entry.extension
                        ),
                        provider: provider.clone(),
                        position_id: Some(position.id),
                        entry,
                    }),
                    Err(e) => {
                        record_failure(&mut resolved, owner, &provider, Some(position.id), e)?
                    }
                }
            }
        }

        tracing::debug!(
            order = order_code,
            downloads = resolved.downloads.len(),
            failures = resolved.failures.len(),
            "Resolved tickets"
        );
        Ok(resolved)
    }

    /// Resolve the order's tickets and read the one named `filename`.
    pub async fn download(
        &self,
        order_id: i64,
        filename: &str,
    ) -> Result<DownloadedTicket, ResolveError> {
        let resolved = self.tickets_for_order(order_id).await?;
        let ticket = resolved
            .find(filename)
            .ok_or_else(|| ResolveError::TicketNotFound(filename.to_string()))?;
        let data = self.cache.read(&ticket.entry)?;
        Ok(DownloadedTicket {
            filename: ticket.filename.clone(),
            provider: ticket.provider.clone(),
            content_type: ticket.entry.content_type.clone(),
            data,
        })
    }

    async fn cached_or_generate(
        &self,
        owner: CacheOwner,
        provider: &str,
    ) -> Result<CachedTicket, GenerationError> {
        let kind = owner.kind();
        if let Some(entry) = self.cache.latest(owner, provider)? {
            metrics::CACHE_LOOKUPS
                .with_label_values(&[kind.as_str(), "hit"])
                .inc();
            return Ok(entry);
        }
        metrics::CACHE_LOOKUPS
            .with_label_values(&[kind.as_str(), "miss"])
            .inc();

        let handle = self
            .dispatcher
            .submit(GenerationRequest::new(owner, provider))
            .await?;
        let id = handle
            .get_timeout(self.timeout)
            .await?
            .ok_or_else(|| GenerationError::NoOutput {
                provider: provider.to_string(),
            })?;

        self.cache
            .get(kind, id)?
            .filter(CachedTicket::has_file)
            .ok_or(GenerationError::EntryMissing { kind, id })
    }
}

fn eligible(ctx: &OrderContext, line: &PositionLine) -> bool {
    let settings = &ctx.event.settings;
    if line.position.is_addon() && !settings.ticket_download_addons {
        return false;
    }
    if !line.item.admission && !settings.ticket_download_nonadm {
        return false;
    }
    true
}

fn record_failure(
    resolved: &mut ResolvedTickets,
    owner: CacheOwner,
    provider: &str,
    position_id: Option<i64>,
    error: GenerationError,
) -> Result<(), ResolveError> {
    if !error.is_expected() {
        return Err(ResolveError::Generation {
            owner,
            provider: provider.to_string(),
            source: error,
        });
    }

    tracing::error!(owner = %owner, provider, error = %error, "Ticket generation failed");
    metrics::RESOLUTION_FAILURES
        .with_label_values(&[provider, error.category()])
        .inc();
    resolved.failures.push(TicketFailure {
        provider: provider.to_string(),
        position_id,
        error: error.to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::EventSettings;
    use crate::testing::fixtures::Fixture;
    use crate::testing::{MockTicketOutput, StaticPermission};

    #[tokio::test]
    async fn test_per_position_filenames() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        let resolved = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert_eq!(
            resolved.filenames(),
            vec!["CONF-ABC12-1-pdf.pdf", "CONF-ABC12-3-pdf.pdf"]
        );
        assert_eq!(resolved.downloads[0].position_id, Some(seeded.ticket.id));
        assert!(resolved.failures.is_empty());
    }

    #[tokio::test]
    async fn test_combined_filename() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let combined = MockTicketOutput::new("pdfcombined").with_multi_download(true);
        let resolver = fixture.resolver(OutputRegistry::new().with_output(combined.factory()));

        let resolved = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert_eq!(resolved.filenames(), vec!["CONF-ABC12-pdfcombined.pdf"]);
        assert_eq!(resolved.downloads[0].position_id, None);
        assert_eq!(combined.calls(), 0);
        assert_eq!(combined.order_calls(), 1);
    }

    #[tokio::test]
    async fn test_second_resolution_hits_cache() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        let first = resolver.tickets_for_order(seeded.order.id).await.unwrap();
        let calls = pdf.calls();
        let second = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert_eq!(pdf.calls(), calls);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_any_veto_empties_result() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let allow = Arc::new(StaticPermission::allow());
        let resolver = fixture
            .resolver(OutputRegistry::new().with_output(pdf.factory()))
            .with_permission(allow.clone())
            .with_permission(Arc::new(StaticPermission::deny()));

        let resolved = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert!(resolved.is_empty());
        assert_eq!(allow.asked(), 1);
        assert_eq!(pdf.calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_order_has_no_tickets() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        fixture
            .orders
            .set_order_status(seeded.order.id, crate::orders::OrderStatus::Pending)
            .unwrap();
        let pdf = MockTicketOutput::new("pdf");
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        assert!(resolver
            .tickets_for_order(seeded.order.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_eligibility_settings() {
        let fixture = Fixture::new();
        let settings = EventSettings {
            ticket_download_addons: true,
            ticket_download_nonadm: false,
            ..EventSettings::default()
        };
        let seeded = fixture.seed_conference(settings);
        let pdf = MockTicketOutput::new("pdf");
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        let resolved = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert_eq!(
            resolved.filenames(),
            vec!["CONF-ABC12-1-pdf.pdf", "CONF-ABC12-2-pdf.pdf"]
        );
    }

    /// Store a valid cached ticket for `position_id`, bypassing eligibility.
    fn warm_cache(fixture: &Fixture, pdf: &MockTicketOutput, position_id: i64) {
        let generator = fixture.generator(OutputRegistry::new().with_output(pdf.factory()));
        let owner = CacheOwner::OrderPosition(position_id);
        generator
            .generate(&GenerationRequest::new(owner, "pdf"))
            .unwrap()
            .unwrap();
        assert!(fixture.cache.latest(owner, "pdf").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cached_addon_is_excluded_when_addons_disabled() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        warm_cache(&fixture, &pdf, seeded.addon.id);
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        let resolved = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert_eq!(
            resolved.filenames(),
            vec!["CONF-ABC12-1-pdf.pdf", "CONF-ABC12-3-pdf.pdf"]
        );
        assert!(resolved
            .downloads
            .iter()
            .all(|d| d.position_id != Some(seeded.addon.id)));
    }

    #[tokio::test]
    async fn test_cached_non_admission_is_excluded_when_nonadm_disabled() {
        let fixture = Fixture::new();
        let settings = EventSettings {
            ticket_download_nonadm: false,
            ..EventSettings::default()
        };
        let seeded = fixture.seed_conference(settings);
        let pdf = MockTicketOutput::new("pdf");
        warm_cache(&fixture, &pdf, seeded.merch.id);
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        let resolved = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert_eq!(resolved.filenames(), vec!["CONF-ABC12-1-pdf.pdf"]);
        assert!(resolved
            .downloads
            .iter()
            .all(|d| d.position_id != Some(seeded.merch.id)));
    }

    #[tokio::test]
    async fn test_failures_are_recorded_per_item() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        pdf.fail_position(seeded.ticket.id);
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        let resolved = resolver.tickets_for_order(seeded.order.id).await.unwrap();

        assert_eq!(resolved.filenames(), vec!["CONF-ABC12-3-pdf.pdf"]);
        assert_eq!(resolved.failures.len(), 1);
        assert_eq!(resolved.failures[0].provider, "pdf");
        assert_eq!(resolved.failures[0].position_id, Some(seeded.ticket.id));
    }

    #[tokio::test]
    async fn test_download_reads_verified_bytes() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let resolver = fixture.resolver(OutputRegistry::new().with_output(pdf.factory()));

        let ticket = resolver
            .download(seeded.order.id, "CONF-ABC12-1-pdf.pdf")
            .await
            .unwrap();
        assert_eq!(ticket.content_type, "application/pdf");
        assert_eq!(ticket.data, b"pdf ticket for ABC12 position 1".to_vec());

        let err = resolver
            .download(seeded.order.id, "CONF-ABC12-9-pdf.pdf")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let fixture = Fixture::new();
        let resolver = fixture.resolver(OutputRegistry::new());

        let err = resolver.tickets_for_order(404).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
