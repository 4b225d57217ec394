use std::sync::Arc;

use anyhow::Context;
use tixcache_core::{
    create_dispatcher, Config, Database, FileStorage, GenerationWorker, OrderStore,
    OutputRegistry, PreviewService, SqliteOrderStore, SqliteTicketCache, TicketCache,
    TicketGenerator, TicketResolver,
};

/// Shared application state
pub struct AppState {
    config: Config,
    resolver: TicketResolver,
    preview: PreviewService,
}

impl AppState {
    pub fn new(config: Config, resolver: TicketResolver, preview: PreviewService) -> Self {
        Self {
            config,
            resolver,
            preview,
        }
    }

    /// Wire stores, generation and services on a shared database.
    ///
    /// In queue mode the returned worker must be spawned.
    pub fn build(
        config: Config,
        db: Arc<Database>,
        storage: Arc<dyn FileStorage>,
        registry: OutputRegistry,
    ) -> anyhow::Result<(Self, Option<GenerationWorker>)> {
        let registry = Arc::new(registry);
        let orders: Arc<dyn OrderStore> = Arc::new(
            SqliteOrderStore::new(Arc::clone(&db)).context("Failed to create order store")?,
        );
        let cache: Arc<dyn TicketCache> = Arc::new(
            SqliteTicketCache::new(Arc::clone(&db), storage)
                .context("Failed to create ticket cache")?,
        );

        let generator = Arc::new(TicketGenerator::new(
            Arc::clone(&orders),
            Arc::clone(&cache),
            Arc::clone(&registry),
        ));
        let (dispatcher, worker) = create_dispatcher(generator, &config.generation);

        let resolver = TicketResolver::new(orders, cache, Arc::clone(&registry), dispatcher)
            .with_timeout(config.generation.timeout());
        let preview = PreviewService::new(db, registry);

        Ok((Self::new(config, resolver, preview), worker))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &TicketResolver {
        &self.resolver
    }

    pub fn preview(&self) -> &PreviewService {
        &self.preview
    }
}
