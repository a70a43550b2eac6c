use crate::core::classify::classify;
use crate::core::events::EngineEvent;
use crate::core::model::{BatchId, JobBatch, JobResult};
use crate::core::notify::{Notifier, StatusSink};
use crate::core::render::{render_status, JobView};
use crate::core::runner::SyncTool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify, Semaphore};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Dispatches one worker task per batch and tracks it until it finishes.
/// Batches share nothing: each worker owns its batch, its status message
/// and its progress records for its whole life.
#[derive(Clone)]
pub struct Engine {
    tool: Arc<dyn SyncTool>,
    sink: Arc<dyn StatusSink>,
    destination_name: String,
    edit_interval: Duration,
    limiter: Option<Arc<Semaphore>>,
    event_tx: broadcast::Sender<EngineEvent>,
    batch_notifies: Arc<Mutex<HashMap<BatchId, Arc<Notify>>>>,
}

impl Engine {
    pub fn new(
        tool: Arc<dyn SyncTool>,
        sink: Arc<dyn StatusSink>,
        destination_name: String,
        edit_interval: Duration,
        max_concurrent_batches: Option<usize>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            tool,
            sink,
            destination_name,
            edit_interval,
            limiter: max_concurrent_batches.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            event_tx,
            batch_notifies: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Start one worker owning the batch end-to-end. An empty batch is a
    /// no-op. The worker handle is supervised: a panic or an error return
    /// is surfaced as a `WorkerFailed` event instead of vanishing.
    pub async fn dispatch(&self, batch: JobBatch) -> Option<BatchId> {
        if batch.is_empty() {
            debug!("batch has no jobs, nothing to dispatch");
            return None;
        }

        let batch_id = Uuid::new_v4();
        let notify = Arc::new(Notify::new());
        {
            let mut m = self.batch_notifies.lock().await;
            m.insert(batch_id, notify);
        }

        let engine = self.clone();
        let worker = tokio::spawn(async move {
            if let Err(e) = engine.run_batch(batch_id, batch).await {
                error!(%batch_id, error = %format!("{e:#}"), "batch worker failed");
                let _ = engine.event_tx.send(EngineEvent::WorkerFailed {
                    batch_id,
                    message: format!("{e:#}"),
                });
            }
            engine.finish_batch(batch_id).await;
        });

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(join_err) = worker.await {
                error!(%batch_id, error = %join_err, "batch worker panicked");
                let _ = engine.event_tx.send(EngineEvent::WorkerFailed {
                    batch_id,
                    message: join_err.to_string(),
                });
                engine.finish_batch(batch_id).await;
            }
        });

        Some(batch_id)
    }

    /// Block until the given batch's worker has finished. Returns
    /// immediately when the batch is unknown or already done.
    pub async fn wait_batch(&self, batch_id: BatchId) {
        let notify = {
            let m = self.batch_notifies.lock().await;
            m.get(&batch_id).cloned()
        };
        if let Some(n) = notify {
            let notified = n.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            // The worker may have finished between the lookup and here.
            if !self.batch_notifies.lock().await.contains_key(&batch_id) {
                return;
            }
            notified.await;
        }
    }

    async fn finish_batch(&self, batch_id: BatchId) {
        let mut m = self.batch_notifies.lock().await;
        if let Some(n) = m.remove(&batch_id) {
            n.notify_waiters();
        }
    }

    async fn run_batch(&self, batch_id: BatchId, batch: JobBatch) -> anyhow::Result<()> {
        let _permit = match &self.limiter {
            Some(sem) => Some(sem.clone().acquire_owned().await?),
            None => None,
        };

        info!(%batch_id, title = %batch.title, jobs = batch.len(), "batch started");
        let _ = self.event_tx.send(EngineEvent::BatchStarted {
            batch_id,
            title: batch.title.clone(),
            jobs: batch.len(),
        });

        let mut views: Vec<JobView> = vec![];
        let initial = render_status(&batch.title, &self.destination_name, &views, false);
        let mut notifier = Notifier::open(self.sink.clone(), initial, self.edit_interval).await?;

        for job in batch.jobs() {
            let _ = self.event_tx.send(EngineEvent::JobStarted {
                batch_id,
                identifier: job.identifier.clone(),
            });
            views.push(JobView::new(job.display_name.clone()));
            let slot = views.len() - 1;

            let destination_path = batch.destination_path(job);
            let exit_code = match self.tool.start(&job.identifier, &destination_path).await {
                Ok(mut handle) => {
                    self.follow_transfer(&batch, &mut views, slot, &mut handle, &mut notifier)
                        .await;
                    handle.exit.await.unwrap_or(-1)
                }
                Err(e) => {
                    error!(%batch_id, identifier = %job.identifier, error = %format!("{e:#}"), "failed to start transfer");
                    -1
                }
            };

            let result = JobResult {
                exit_code,
                classification: classify(exit_code, &views[slot].progress),
            };
            views[slot].result = Some(result);
            info!(%batch_id, identifier = %job.identifier, exit_code, classification = ?result.classification, "job finalized");
            let _ = self.event_tx.send(EngineEvent::JobFinalized {
                batch_id,
                identifier: job.identifier.clone(),
                result,
            });

            let text = render_status(&batch.title, &self.destination_name, &views, false);
            notifier.finalize(text).await;
        }

        let text = render_status(&batch.title, &self.destination_name, &views, true);
        notifier.finalize(text).await;

        info!(%batch_id, "batch finished");
        let _ = self.event_tx.send(EngineEvent::BatchFinished { batch_id });
        Ok(())
    }

    /// Drive one transfer: parse every merged output line into the job's
    /// progress record and offer the re-rendered status to the notifier,
    /// flushing any deferred edit when its floor elapses.
    async fn follow_transfer(
        &self,
        batch: &JobBatch,
        views: &mut [JobView],
        slot: usize,
        handle: &mut crate::core::runner::TransferHandle,
        notifier: &mut Notifier,
    ) {
        loop {
            let deadline = notifier.next_deadline();
            tokio::select! {
                line = handle.lines.recv() => {
                    let Some(line) = line else { break };
                    if views[slot].progress.apply_line(&line) {
                        let text =
                            render_status(&batch.title, &self.destination_name, views, false);
                        notifier.update(text).await;
                    }
                }
                _ = sleep_until_std(deadline), if deadline.is_some() => {
                    notifier.flush_due().await;
                }
            }
        }
    }
}

async fn sleep_until_std(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
