use std::sync::Arc;
use std::time::Instant;

use super::GenerationError;
use crate::cache::{CacheOwner, NewCacheEntry, TicketCache};
use crate::metrics;
use crate::orders::OrderStore;
use crate::output::{GeneratedFile, OutputRegistry};

/// A request to (re)generate the document of one entity with one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub owner: CacheOwner,
    pub provider: String,
}

impl GenerationRequest {
    pub fn new(owner: CacheOwner, provider: impl Into<String>) -> Self {
        Self {
            owner,
            provider: provider.into(),
        }
    }
}

/// Renders ticket documents and stores them in the ticket cache.
///
/// Generation is synchronous; dispatchers decide where it runs.
pub struct TicketGenerator {
    orders: Arc<dyn OrderStore>,
    cache: Arc<dyn TicketCache>,
    registry: Arc<OutputRegistry>,
}

impl TicketGenerator {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        cache: Arc<dyn TicketCache>,
        registry: Arc<OutputRegistry>,
    ) -> Self {
        Self {
            orders,
            cache,
            registry,
        }
    }

    /// Generate the document for `request` and return the new cache entry ID.
    ///
    /// Returns `Ok(None)` when the event has no enabled output with the
    /// requested identifier. A missing order or position is an error.
    pub fn generate(&self, request: &GenerationRequest) -> Result<Option<i64>, GenerationError> {
        let started = Instant::now();
        let result = self.render(request).and_then(|file| match file {
            Some(file) => self.store(request, file).map(Some),
            None => Ok(None),
        });

        let outcome = match &result {
            Ok(Some(_)) => "success",
            Ok(None) => "no_output",
            Err(_) => "failed",
        };
        metrics::GENERATIONS_TOTAL
            .with_label_values(&[request.provider.as_str(), outcome])
            .inc();
        metrics::GENERATION_DURATION
            .with_label_values(&[request.provider.as_str()])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    fn render(&self, request: &GenerationRequest) -> Result<Option<GeneratedFile>, GenerationError> {
        let provider = request.provider.as_str();
        let rendered = match request.owner {
            CacheOwner::OrderPosition(id) => {
                let ctx = self.orders.position_context(id)?;
                let Some(output) = self.registry.find_enabled(&ctx.event, provider) else {
                    tracing::debug!(owner = %request.owner, provider, "No enabled output, skipping");
                    return Ok(None);
                };
                let _span = tracing::info_span!(
                    "render_ticket",
                    owner = %request.owner,
                    provider,
                    locale = ctx.locale()
                )
                .entered();
                output.generate(&ctx)
            }
            CacheOwner::Order(id) => {
                let ctx = self.orders.order_context(id)?;
                let Some(output) = self.registry.find_enabled(&ctx.event, provider) else {
                    tracing::debug!(owner = %request.owner, provider, "No enabled output, skipping");
                    return Ok(None);
                };
                let _span = tracing::info_span!(
                    "render_ticket",
                    owner = %request.owner,
                    provider,
                    locale = ctx.locale()
                )
                .entered();
                output.generate_order(&ctx)
            }
        };

        rendered
            .map(Some)
            .map_err(|source| GenerationError::Output {
                provider: provider.to_string(),
                source,
            })
    }

    fn store(&self, request: &GenerationRequest, file: GeneratedFile) -> Result<i64, GenerationError> {
        let owner = request.owner;
        let purged = self.cache.purge(owner, &request.provider)?;
        let entry = self.cache.create(NewCacheEntry {
            owner,
            provider: request.provider.clone(),
            extension: file.extension(),
            content_type: file.content_type.clone(),
        })?;

        if let Err(e) = self
            .cache
            .attach_file(owner.kind(), entry.id, &file.filename, &file.data)
        {
            if let Err(cleanup) = self.cache.delete(owner.kind(), entry.id) {
                tracing::warn!(entry_id = entry.id, error = %cleanup, "Failed to remove empty cache entry");
            }
            return Err(e.into());
        }

        tracing::info!(
            owner = %owner,
            provider = %request.provider,
            entry_id = entry.id,
            purged,
            size = file.data.len(),
            "Generated ticket"
        );
        Ok(entry.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntityKind;
    use crate::orders::EventSettings;
    use crate::testing::fixtures::Fixture;
    use crate::testing::MockTicketOutput;

    fn generator(fixture: &Fixture, outputs: &[&MockTicketOutput]) -> TicketGenerator {
        let mut registry = OutputRegistry::new();
        for output in outputs {
            registry.register(output.factory());
        }
        TicketGenerator::new(fixture.orders.clone(), fixture.cache.clone(), Arc::new(registry))
    }

    #[test]
    fn test_generate_position_creates_single_entry() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let generator = generator(&fixture, &[&pdf]);

        let owner = CacheOwner::OrderPosition(seeded.ticket.id);
        let id = generator
            .generate(&GenerationRequest::new(owner, "pdf"))
            .unwrap()
            .unwrap();

        let entry = fixture
            .cache
            .get(EntityKind::OrderPosition, id)
            .unwrap()
            .unwrap();
        assert_eq!(entry.extension, ".pdf");
        assert_eq!(entry.content_type, "application/pdf");
        assert!(entry.has_file());
        assert_eq!(pdf.calls(), 1);
    }

    #[test]
    fn test_regeneration_purges_previous_entries() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let generator = generator(&fixture, &[&pdf]);
        let request = GenerationRequest::new(CacheOwner::OrderPosition(seeded.ticket.id), "pdf");

        let first = generator.generate(&request).unwrap().unwrap();
        let second = generator.generate(&request).unwrap().unwrap();

        assert_ne!(first, second);
        let entries = fixture.cache.list(request.owner, "pdf").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, second);
        assert_eq!(fixture.storage.len(), 1);
    }

    #[test]
    fn test_generate_order_uses_combined_output() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let combined = MockTicketOutput::new("pdfcombined").with_multi_download(true);
        let generator = generator(&fixture, &[&combined]);

        let id = generator
            .generate(&GenerationRequest::new(
                CacheOwner::Order(seeded.order.id),
                "pdfcombined",
            ))
            .unwrap();

        assert!(id.is_some());
        assert_eq!(combined.order_calls(), 1);
        assert_eq!(combined.calls(), 0);
    }

    #[test]
    fn test_unknown_or_disabled_provider_is_noop() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf").with_enabled(false);
        let generator = generator(&fixture, &[&pdf]);
        let owner = CacheOwner::OrderPosition(seeded.ticket.id);

        assert_eq!(generator.generate(&GenerationRequest::new(owner, "pdf")).unwrap(), None);
        assert_eq!(generator.generate(&GenerationRequest::new(owner, "other")).unwrap(), None);
        assert_eq!(pdf.calls(), 0);
        assert!(fixture.cache.list(owner, "pdf").unwrap().is_empty());
    }

    #[test]
    fn test_missing_entity_is_not_found() {
        let fixture = Fixture::new();
        fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let generator = generator(&fixture, &[&pdf]);

        let err = generator
            .generate(&GenerationRequest::new(CacheOwner::OrderPosition(9999), "pdf"))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = generator
            .generate(&GenerationRequest::new(CacheOwner::Order(9999), "pdf"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_output_failure_keeps_existing_entry() {
        let fixture = Fixture::new();
        let seeded = fixture.seed_conference(EventSettings::default());
        let pdf = MockTicketOutput::new("pdf");
        let generator = generator(&fixture, &[&pdf]);
        let request = GenerationRequest::new(CacheOwner::OrderPosition(seeded.ticket.id), "pdf");

        let first = generator.generate(&request).unwrap().unwrap();
        pdf.set_failing(true);
        let err = generator.generate(&request).unwrap_err();

        assert!(matches!(err, GenerationError::Output { .. }));
        let entries = fixture.cache.list(request.owner, "pdf").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, first);
    }
}
