use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;

use audioscribe::application::ports::{JobListQuery, JobStore, JobStoreError};
use audioscribe::domain::{InputRef, JobId, JobState, ModelName, TransitionFields, WorkerId};
use audioscribe::infrastructure::persistence::InMemoryJobStore;

#[tokio::test]
async fn given_created_job_when_fetched_then_matches() {
    let store = InMemoryJobStore::new();

    let created = store
        .create(InputRef::from_raw("uploads/a.wav"), None, 3)
        .await
        .unwrap();
    let fetched = store.get(created.id).await.unwrap();

    assert_eq!(created, fetched);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn given_unknown_id_when_transitioning_then_returns_not_found() {
    let store = InMemoryJobStore::new();

    let result = store
        .transition(
            JobId::new(),
            JobState::Pending,
            JobState::Cancelled,
            TransitionFields::release(None),
        )
        .await;

    assert!(matches!(result, Err(JobStoreError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_claims_when_racing_then_exactly_one_wins() {
    let store = Arc::new(InMemoryJobStore::new());
    let job_id = store
        .create(InputRef::from_raw("uploads/race.wav"), None, 3)
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for slot in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .transition(
                    job_id,
                    JobState::Pending,
                    JobState::Running,
                    TransitionFields::claim(&WorkerId::from_raw(format!("worker-{}", slot))),
                )
                .await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(JobStoreError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(store.get(job_id).await.unwrap().attempt_count, 1);
}

#[tokio::test]
async fn given_claim_by_other_worker_when_completing_then_conflicts() {
    let store = InMemoryJobStore::new();
    let job = store
        .create(InputRef::from_raw("uploads/a.wav"), None, 3)
        .await
        .unwrap();
    let owner = WorkerId::from_raw("worker-a");
    store
        .transition(
            job.id,
            JobState::Pending,
            JobState::Running,
            TransitionFields::claim(&owner),
        )
        .await
        .unwrap();

    let result = store
        .transition(
            job.id,
            JobState::Running,
            JobState::Done,
            TransitionFields::complete(&WorkerId::from_raw("worker-b"), "stolen".to_string()),
        )
        .await;

    assert!(matches!(result, Err(JobStoreError::Conflict { .. })));
    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.state, JobState::Running);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn given_attempt_ceiling_reached_when_claiming_again_then_conflicts() {
    let store = InMemoryJobStore::new();
    let worker = WorkerId::from_raw("worker-a");
    let job = store
        .create(InputRef::from_raw("uploads/a.wav"), None, 1)
        .await
        .unwrap();
    store
        .transition(
            job.id,
            JobState::Pending,
            JobState::Running,
            TransitionFields::claim(&worker),
        )
        .await
        .unwrap();
    store
        .transition(
            job.id,
            JobState::Running,
            JobState::Pending,
            TransitionFields::release(Some(&worker)),
        )
        .await
        .unwrap();

    let result = store
        .transition(
            job.id,
            JobState::Pending,
            JobState::Running,
            TransitionFields::claim(&worker),
        )
        .await;

    assert!(matches!(result, Err(JobStoreError::Conflict { .. })));
    assert_eq!(store.get(job.id).await.unwrap().attempt_count, 1);
}

#[tokio::test]
async fn given_terminal_job_when_transitioning_out_then_rejects_edge() {
    let store = InMemoryJobStore::new();
    let job = store
        .create(InputRef::from_raw("uploads/a.wav"), None, 3)
        .await
        .unwrap();
    store
        .transition(
            job.id,
            JobState::Pending,
            JobState::Cancelled,
            TransitionFields::release(None),
        )
        .await
        .unwrap();

    let result = store
        .transition(
            job.id,
            JobState::Cancelled,
            JobState::Pending,
            TransitionFields::touch(),
        )
        .await;

    assert!(matches!(
        result,
        Err(JobStoreError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn given_old_and_fresh_jobs_when_listing_stale_then_only_old_ones_returned() {
    let store = InMemoryJobStore::new();
    let old = store
        .create(InputRef::from_raw("uploads/old.wav"), None, 3)
        .await
        .unwrap();
    let fresh = store
        .create(InputRef::from_raw("uploads/fresh.wav"), None, 3)
        .await
        .unwrap();
    store
        .backdate(old.id, Duration::from_secs(120))
        .await
        .unwrap();

    let stale: Vec<_> = store
        .list_stale(JobState::Pending, Duration::from_secs(60))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, old.id);
    assert_ne!(stale[0].id, fresh.id);
}

#[tokio::test]
async fn given_several_jobs_when_listing_in_pages_then_every_job_appears_once_newest_first() {
    let store = InMemoryJobStore::new();
    let mut created = Vec::new();
    for i in 0..5 {
        let job = store
            .create(InputRef::from_raw(format!("uploads/{}.wav", i)), None, 3)
            .await
            .unwrap();
        created.push(job.id);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut seen = Vec::new();
    let mut query = JobListQuery::first_page(2);
    loop {
        let page = store.list(&query).await.unwrap();
        assert!(page.len() <= 2);
        let Some(last) = page.last() else { break };
        query.after = Some(last.id);
        seen.extend(page.iter().map(|job| job.id));
    }

    created.reverse();
    assert_eq!(seen, created);
}

#[tokio::test]
async fn given_state_filter_when_listing_then_other_states_are_skipped() {
    let store = InMemoryJobStore::new();
    let running = store
        .create(InputRef::from_raw("uploads/a.wav"), None, 3)
        .await
        .unwrap();
    store
        .create(InputRef::from_raw("uploads/b.wav"), None, 3)
        .await
        .unwrap();
    store
        .transition(
            running.id,
            JobState::Pending,
            JobState::Running,
            TransitionFields::claim(&WorkerId::from_raw("worker-a")),
        )
        .await
        .unwrap();

    let query = JobListQuery {
        state: Some(JobState::Running),
        ..JobListQuery::default()
    };
    let jobs = store.list(&query).await.unwrap();

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, running.id);
}

#[tokio::test]
async fn given_unknown_cursor_when_listing_then_returns_not_found() {
    let store = InMemoryJobStore::new();
    let missing = JobId::new();

    let result = store
        .list(&JobListQuery {
            after: Some(missing),
            ..JobListQuery::default()
        })
        .await;

    assert!(matches!(result, Err(JobStoreError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn given_model_when_creating_then_it_is_stored() {
    let store = InMemoryJobStore::new();
    let model: ModelName = "whisper-1".parse().unwrap();

    let created = store
        .create(InputRef::from_raw("uploads/a.wav"), Some(model.clone()), 3)
        .await
        .unwrap();

    assert_eq!(store.get(created.id).await.unwrap().model, Some(model));
}

#[tokio::test]
async fn given_oversized_limit_when_building_query_then_it_is_clamped() {
    assert_eq!(JobListQuery::first_page(10_000).limit, JobListQuery::MAX_LIMIT);
    assert_eq!(JobListQuery::first_page(0).limit, 1);
    assert_eq!(JobListQuery::default().limit, JobListQuery::DEFAULT_LIMIT);
}
