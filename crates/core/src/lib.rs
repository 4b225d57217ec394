pub mod cache;
pub mod config;
pub mod database;
pub mod generation;
pub mod i18n;
pub mod metrics;
pub mod orders;
pub mod output;
pub mod preview;
pub mod resolver;
pub mod testing;

pub use cache::{
    CacheError, CacheOwner, CachedTicket, EntityKind, FileStorage, LocalFileStorage,
    SqliteTicketCache, StorageError, TicketCache,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, GenerationMode,
};
pub use database::{Database, StoreError};
pub use generation::{
    create_dispatcher, create_generation_queue, GenerationDispatcher, GenerationError,
    GenerationRequest, GenerationWorker, InlineDispatcher, QueueDispatcher, TaskHandle,
    TicketGenerator,
};
pub use orders::{OrderContext, OrderStore, SqliteOrderStore};
pub use output::{GeneratedFile, OutputError, OutputRegistry, TextTicketOutput, TicketOutput};
pub use preview::{PreviewError, PreviewService};
pub use resolver::{
    DownloadPermission, DownloadedTicket, ResolveError, ResolvedTickets, TicketDownload,
    TicketFailure, TicketResolver,
};
