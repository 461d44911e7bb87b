use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::WorkerId;

use super::{TranscriptionWorker, WorkerContext};

/// Fixed-size set of transcription workers. The size is the only admission knob:
/// at most `size` transcriptions run at once.
pub struct WorkerPool {
    size: usize,
    ctx: WorkerContext,
}

impl WorkerPool {
    pub fn new(size: usize, ctx: WorkerContext) -> Self {
        Self {
            size: size.max(1),
            ctx,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn spawn(self, shutdown: CancellationToken) -> WorkerPoolHandle {
        let mut tasks = JoinSet::new();

        for slot in 0..self.size {
            let worker = TranscriptionWorker::new(WorkerId::for_slot(slot), self.ctx.clone());
            tasks.spawn(worker.run(shutdown.child_token()));
        }

        tracing::info!(pool_size = self.size, "Worker pool started");
        WorkerPoolHandle { tasks }
    }
}

pub struct WorkerPoolHandle {
    tasks: JoinSet<()>,
}

impl WorkerPoolHandle {
    /// Waits for every worker to stop. Workers stop after their shutdown token
    /// fires and the delivery in hand is settled.
    pub async fn join(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}
