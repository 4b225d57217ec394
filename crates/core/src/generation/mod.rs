//! Ticket generation: render a document with one output and store it in the
//! ticket cache.
//!
//! [`TicketGenerator`] does the work synchronously. A
//! [`GenerationDispatcher`] decides where it runs: [`InlineDispatcher`] on
//! the caller's task, [`QueueDispatcher`] on a [`GenerationWorker`] that
//! runs jobs on the blocking pool. Either way the caller waits on a
//! [`TaskHandle`], and both produce the same cache state.
//!
//! # Example
//!
//! ```ignore
//! let generator = Arc::new(TicketGenerator::new(orders, cache, registry));
//! let (dispatcher, worker) = create_generation_queue(generator, &config.generation);
//! tokio::spawn(worker.run());
//!
//! let handle = dispatcher
//!     .submit(GenerationRequest::new(CacheOwner::OrderPosition(42), "pdf"))
//!     .await?;
//! let entry_id = handle.get().await?;
//! ```

mod dispatch;
mod error;
mod task;

pub use dispatch::{
    create_dispatcher, create_generation_queue, GenerationDispatcher, GenerationWorker,
    InlineDispatcher, QueueDispatcher, TaskHandle,
};
pub use error::GenerationError;
pub use task::{GenerationRequest, TicketGenerator};
