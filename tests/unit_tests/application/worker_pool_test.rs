use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use audioscribe::application::ports::JobStore;
use audioscribe::application::services::WorkerPool;
use audioscribe::domain::JobState;
use audioscribe::infrastructure::audio::MockTranscriptionEngine;

use crate::fakes::Harness;

#[tokio::test]
async fn given_zero_size_when_building_pool_then_runs_one_worker() {
    let harness = Harness::new(3);
    let pool = WorkerPool::new(
        0,
        harness.context(Arc::new(MockTranscriptionEngine::default())),
    );
    assert_eq!(pool.size(), 1);
}

#[tokio::test]
async fn given_running_pool_when_jobs_are_enqueued_then_all_complete() {
    let harness = Harness::new(3);
    let engine = Arc::new(MockTranscriptionEngine::new(
        "pooled",
        Duration::from_millis(10),
    ));
    let shutdown = CancellationToken::new();
    let workers = WorkerPool::new(2, harness.context(engine)).spawn(shutdown.clone());

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(harness.submit().await);
    }

    let all_done = async {
        loop {
            let mut done = 0;
            for id in &ids {
                if harness.store.get(*id).await.unwrap().state == JobState::Done {
                    done += 1;
                }
            }
            if done == ids.len() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), all_done)
        .await
        .expect("all jobs should finish");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), workers.join())
        .await
        .expect("pool should stop after shutdown");
    assert_eq!(harness.broker.inner.in_flight_len().await, 0);
}
