use crate::core::model::{BatchId, JobResult};

#[derive(Debug, Clone)]
pub enum EngineEvent {
    BatchStarted { batch_id: BatchId, title: String, jobs: usize },
    JobStarted { batch_id: BatchId, identifier: String },
    JobFinalized { batch_id: BatchId, identifier: String, result: JobResult },
    BatchFinished { batch_id: BatchId },
    WorkerFailed { batch_id: BatchId, message: String },
}
