use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Semaphore};

use super::{GenerationError, GenerationRequest, TicketGenerator};
use crate::config::{GenerationConfig, GenerationMode, MAX_WORKERS};

type GenerationResult = Result<Option<i64>, GenerationError>;

/// Handle to the result of a submitted generation.
///
/// Inline dispatch returns handles that are already resolved.
#[derive(Debug)]
pub struct TaskHandle {
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Ready(GenerationResult),
    Pending(oneshot::Receiver<GenerationResult>),
}

impl TaskHandle {
    /// A handle holding a finished result.
    pub fn ready(result: GenerationResult) -> Self {
        Self {
            state: HandleState::Ready(result),
        }
    }

    fn pending(rx: oneshot::Receiver<GenerationResult>) -> Self {
        Self {
            state: HandleState::Pending(rx),
        }
    }

    /// Wait for the generation to finish.
    pub async fn get(self) -> GenerationResult {
        match self.state {
            HandleState::Ready(result) => result,
            HandleState::Pending(rx) => rx.await.map_err(|_| GenerationError::WorkerUnavailable)?,
        }
    }

    /// Wait at most `timeout` (forever when None).
    pub async fn get_timeout(self, timeout: Option<Duration>) -> GenerationResult {
        match timeout {
            None => self.get().await,
            Some(limit) => tokio::time::timeout(limit, self.get())
                .await
                .map_err(|_| GenerationError::Timeout(limit))?,
        }
    }
}

/// Decides where generations run.
#[async_trait]
pub trait GenerationDispatcher: Send + Sync {
    /// Submit a generation and return a handle to its result.
    async fn submit(&self, request: GenerationRequest) -> Result<TaskHandle, GenerationError>;
}

/// Runs generations on the submitting task.
pub struct InlineDispatcher {
    generator: Arc<TicketGenerator>,
}

impl InlineDispatcher {
    pub fn new(generator: Arc<TicketGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GenerationDispatcher for InlineDispatcher {
    async fn submit(&self, request: GenerationRequest) -> Result<TaskHandle, GenerationError> {
        Ok(TaskHandle::ready(self.generator.generate(&request)))
    }
}

/// A queued generation.
struct GenerationJob {
    request: GenerationRequest,
    reply: oneshot::Sender<GenerationResult>,
}

/// Sends generations to a [`GenerationWorker`].
///
/// Cheaply cloneable; the worker stops once every clone is dropped.
#[derive(Clone)]
pub struct QueueDispatcher {
    tx: mpsc::Sender<GenerationJob>,
}

#[async_trait]
impl GenerationDispatcher for QueueDispatcher {
    async fn submit(&self, request: GenerationRequest) -> Result<TaskHandle, GenerationError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(GenerationJob { request, reply })
            .await
            .map_err(|_| GenerationError::WorkerUnavailable)?;
        Ok(TaskHandle::pending(rx))
    }
}

/// Background task that runs queued generations on the blocking pool.
pub struct GenerationWorker {
    rx: mpsc::Receiver<GenerationJob>,
    generator: Arc<TicketGenerator>,
    workers: usize,
}

impl GenerationWorker {
    /// Run the worker until every dispatcher is dropped.
    ///
    /// Queued jobs are drained and in-flight jobs awaited before returning.
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!(workers = self.workers, "Generation worker started");
        let permits = Arc::new(Semaphore::new(self.workers));

        while let Some(job) = self.rx.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let generator = Arc::clone(&self.generator);

            tokio::spawn(async move {
                let GenerationJob { request, reply } = job;
                let owner = request.owner;
                let provider = request.provider.clone();

                let result =
                    match tokio::task::spawn_blocking(move || generator.generate(&request)).await {
                        Ok(result) => result,
                        Err(e) if e.is_panic() => {
                            let message = panic_message(e.into_panic());
                            tracing::error!(
                                owner = %owner,
                                provider = %provider,
                                "Generation panicked: {}",
                                message
                            );
                            Err(GenerationError::Panicked(message))
                        }
                        Err(_) => Err(GenerationError::WorkerUnavailable),
                    };
                drop(permit);

                if reply.send(result).is_err() {
                    tracing::debug!(
                        owner = %owner,
                        provider = %provider,
                        "Generation finished after caller stopped waiting"
                    );
                }
            });
        }

        // All permits back means no job is in flight.
        match u32::try_from(self.workers) {
            Ok(all) => {
                if permits.acquire_many(all).await.is_err() {
                    tracing::warn!("Worker semaphore closed before in-flight jobs finished");
                }
            }
            Err(_) => tracing::warn!(
                workers = self.workers,
                "Worker count out of range, not waiting for in-flight jobs"
            ),
        }
        tracing::info!("Generation worker shutting down");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Create a generation queue
///
/// Returns:
/// - `QueueDispatcher` - for submitting generations (clone this to share across tasks)
/// - `GenerationWorker` - spawn this as a background task with `tokio::spawn(worker.run())`
pub fn create_generation_queue(
    generator: Arc<TicketGenerator>,
    config: &GenerationConfig,
) -> (QueueDispatcher, GenerationWorker) {
    let (tx, rx) = mpsc::channel(config.queue_size.max(1));
    let worker = GenerationWorker {
        rx,
        generator,
        workers: config.workers.clamp(1, MAX_WORKERS),
    };
    (QueueDispatcher { tx }, worker)
}

/// Build the dispatcher for the configured mode.
///
/// In queue mode the returned worker must be spawned.
pub fn create_dispatcher(
    generator: Arc<TicketGenerator>,
    config: &GenerationConfig,
) -> (Arc<dyn GenerationDispatcher>, Option<GenerationWorker>) {
    match config.mode {
        GenerationMode::Inline => (Arc::new(InlineDispatcher::new(generator)), None),
        GenerationMode::Queue => {
            let (dispatcher, worker) = create_generation_queue(generator, config);
            (Arc::new(dispatcher), Some(worker))
        }
    }
}
