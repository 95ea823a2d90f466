//! Asynchronous, batched soft deletion.
//!
//! Callers submit [`DeleteTask`]s into a bounded queue and return at once.
//! Long-lived workers buffer the requested codes per owner and hand them to
//! [`Store::batch_delete`] once an owner's buffer reaches `batch_size`, or
//! for every owner when the flush ticker fires. A failed flush is logged and
//! the batch is dropped; deletion is best-effort.
//!
//! Every task for one owner is routed to the same worker, and each worker
//! owns its buffers outright, so a size-triggered flush and a timer-triggered
//! flush can never race on the same buffer.

use crate::error::PipelineError;
use snip_core::{ShortCode, Store, UserId};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use typed_builder::TypedBuilder;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// A request to tombstone some of one owner's short codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub user_id: UserId,
    pub short_codes: Vec<ShortCode>,
}

impl DeleteTask {
    pub fn new(user_id: UserId, short_codes: Vec<ShortCode>) -> Self {
        Self {
            user_id,
            short_codes,
        }
    }
}

/// Tuning knobs for [`DeletionPipeline`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PipelineSettings {
    /// Tasks buffered per worker before `submit` starts waiting.
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Codes per owner that trigger an immediate flush.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Period of the flush-everything ticker.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
    #[builder(default = 1)]
    pub workers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Handle to the running deletion workers.
///
/// `submit` applies backpressure by waiting for queue capacity; `try_submit`
/// rejects with [`PipelineError::QueueFull`] instead. Both fail with
/// [`PipelineError::Closed`] once [`shutdown`][Self::shutdown] has begun.
#[derive(Debug)]
pub struct DeletionPipeline {
    queues: Vec<mpsc::Sender<DeleteTask>>,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DeletionPipeline {
    /// Spawns the workers onto the current tokio runtime.
    pub fn spawn<S: Store>(store: Arc<S>, settings: PipelineSettings) -> Self {
        let worker_count = settings.workers.max(1);
        let (shutdown, _) = watch::channel(false);
        let mut queues = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
            let worker = Worker {
                id,
                store: Arc::clone(&store),
                rx,
                shutdown: shutdown.subscribe(),
                batch_size: settings.batch_size.max(1),
                flush_interval: settings.flush_interval,
                buffers: HashMap::new(),
            };
            queues.push(tx);
            workers.push(tokio::spawn(worker.run()));
        }

        info!(
            workers = worker_count,
            batch_size = settings.batch_size,
            flush_interval_ms = settings.flush_interval.as_millis() as u64,
            "deletion pipeline started"
        );

        Self {
            queues,
            shutdown,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueues a task, waiting while the owner's worker queue is full.
    pub async fn submit(&self, task: DeleteTask) -> Result<(), PipelineError> {
        if task.short_codes.is_empty() {
            return Ok(());
        }
        if self.is_shutting_down() {
            return Err(PipelineError::Closed);
        }
        self.route(&task.user_id)
            .send(task)
            .await
            .map_err(|_| PipelineError::Closed)
    }

    /// Enqueues a task without waiting.
    pub fn try_submit(&self, task: DeleteTask) -> Result<(), PipelineError> {
        if task.short_codes.is_empty() {
            return Ok(());
        }
        if self.is_shutting_down() {
            return Err(PipelineError::Closed);
        }
        self.route(&task.user_id)
            .try_send(task)
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => PipelineError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => PipelineError::Closed,
            })
    }

    /// Stops intake, lets every worker drain its queue and flush all
    /// buffers, and waits for them to finish. Concurrent callers all wait for
    /// the same drain; later calls return at once.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        // Held until every worker has finished, so a concurrent caller waits
        // for the same drain instead of returning early.
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(err) = handle.await {
                error!(error = %err, "deletion worker terminated abnormally");
            }
        }
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn route(&self, user: &UserId) -> &mpsc::Sender<DeleteTask> {
        let mut hasher = DefaultHasher::new();
        user.hash(&mut hasher);
        let slot = hasher.finish() % self.queues.len() as u64;
        &self.queues[slot as usize]
    }
}

struct Worker<S> {
    id: usize,
    store: Arc<S>,
    rx: mpsc::Receiver<DeleteTask>,
    shutdown: watch::Receiver<bool>,
    batch_size: usize,
    flush_interval: Duration,
    buffers: HashMap<UserId, Vec<ShortCode>>,
}

impl<S: Store> Worker<S> {
    async fn run(mut self) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                task = self.rx.recv() => match task {
                    Some(task) => self.accept(task).await,
                    None => break,
                },
                _ = ticker.tick() => self.flush_all().await,
                _ = self.shutdown.changed() => break,
            }
        }

        // Nothing new gets in; whatever was accepted still gets applied.
        self.rx.close();
        while let Some(task) = self.rx.recv().await {
            self.accept(task).await;
        }
        self.flush_all().await;

        info!(worker = self.id, "deletion worker stopped");
    }

    async fn accept(&mut self, task: DeleteTask) {
        let DeleteTask {
            user_id,
            short_codes,
        } = task;

        let mut ready = Vec::new();
        let buffer = self.buffers.entry(user_id.clone()).or_default();
        buffer.extend(short_codes);
        while buffer.len() >= self.batch_size {
            let rest = buffer.split_off(self.batch_size);
            ready.push(std::mem::replace(buffer, rest));
        }
        if buffer.is_empty() {
            self.buffers.remove(&user_id);
        }

        for batch in ready {
            self.flush(&user_id, batch).await;
        }
    }

    async fn flush_all(&mut self) {
        let buffers = std::mem::take(&mut self.buffers);
        if buffers.is_empty() {
            return;
        }
        debug!(worker = self.id, owners = buffers.len(), "flushing all deletion buffers");
        for (user_id, codes) in buffers {
            self.flush(&user_id, codes).await;
        }
    }

    async fn flush(&self, user_id: &UserId, codes: Vec<ShortCode>) {
        match self.store.batch_delete(user_id, &codes).await {
            Ok(deleted) => debug!(
                worker = self.id,
                user_id = %user_id,
                requested = codes.len(),
                deleted,
                "deletion batch applied"
            ),
            Err(err) => error!(
                worker = self.id,
                user_id = %user_id,
                dropped = codes.len(),
                error = %err,
                "deletion batch failed, dropping it"
            ),
        }
    }
}
