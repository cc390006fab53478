// Integration tests for chunked upload sessions
//
// These tests verify chunk ingestion, the exactly-once commit into a job,
// and the bounds placed on what a session may hold.

mod common;

use anyhow::Result;
use common::RecordingExecutor;
use scribe_server::{
    AudioChunk, JobStatus, JobStore, MockExecutor, ScribeError, ScribeRequest, SessionLimits,
    SessionStore,
};
use std::sync::Arc;
use std::time::Duration;

fn stores() -> (Arc<JobStore>, Arc<SessionStore>) {
    let jobs = Arc::new(JobStore::new(Arc::new(MockExecutor::default())));
    let sessions = Arc::new(SessionStore::new(Arc::clone(&jobs), SessionLimits::default()));
    (jobs, sessions)
}

#[tokio::test]
async fn test_commit_creates_queued_job_from_request() -> Result<()> {
    let (jobs, sessions) = stores();

    let session_id = sessions
        .create_session(ScribeRequest::new(["referral_v1"]))
        .await;
    assert!(session_id.starts_with("sess_"));

    assert_eq!(sessions.add_chunk(&session_id, 0, b"abc".to_vec()).await?, 3);
    assert_eq!(sessions.add_chunk(&session_id, 1, b"def".to_vec()).await?, 3);

    let job = sessions.commit_session(&session_id).await?;

    assert_eq!(job.requested_templates, vec!["referral_v1"]);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(jobs.get_job(&job.job_id).await?.status, JobStatus::Queued);

    let summary = sessions.get_session(&session_id).await?;
    assert!(summary.committed);
    assert_eq!(summary.job_id.as_deref(), Some(job.job_id.as_str()));
    assert_eq!(summary.chunk_count, 2);
    assert_eq!(summary.bytes_received, 6);

    Ok(())
}

#[tokio::test]
async fn test_unknown_session_is_not_found() -> Result<()> {
    let (_, sessions) = stores();

    assert_eq!(
        sessions.add_chunk("sess_missing", 0, b"x".to_vec()).await,
        Err(ScribeError::SessionNotFound("sess_missing".into()))
    );
    assert!(matches!(
        sessions.commit_session("sess_missing").await,
        Err(ScribeError::SessionNotFound(_))
    ));
    assert!(matches!(
        sessions.get_session("sess_missing").await,
        Err(ScribeError::SessionNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_chunk_after_commit_is_rejected() -> Result<()> {
    let (jobs, sessions) = stores();
    let session_id = sessions
        .create_session(ScribeRequest::new(["soap_v1"]))
        .await;
    sessions.add_chunk(&session_id, 0, b"abc".to_vec()).await?;

    let job = sessions.commit_session(&session_id).await?;

    // Before processing
    assert_eq!(
        sessions.add_chunk(&session_id, 1, b"late".to_vec()).await,
        Err(ScribeError::SessionClosed(session_id.clone()))
    );

    // And after the job is terminal
    jobs.run_processing(&job.job_id).await?;
    assert_eq!(
        sessions.add_chunk(&session_id, 2, b"later".to_vec()).await,
        Err(ScribeError::SessionClosed(session_id.clone()))
    );

    Ok(())
}

#[tokio::test]
async fn test_second_commit_reports_first_job() -> Result<()> {
    let (jobs, sessions) = stores();
    let session_id = sessions
        .create_session(ScribeRequest::new(["soap_v1"]))
        .await;

    let job = sessions.commit_session(&session_id).await?;
    let err = sessions.commit_session(&session_id).await.unwrap_err();

    assert_eq!(
        err,
        ScribeError::AlreadyCommitted {
            session_id: session_id.clone(),
            job_id: job.job_id.clone(),
        }
    );
    assert_eq!(jobs.job_count().await, 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_create_exactly_one_job() -> Result<()> {
    let (jobs, sessions) = stores();
    let session_id = sessions
        .create_session(ScribeRequest::new(["soap_v1"]))
        .await;
    sessions.add_chunk(&session_id, 0, b"abc".to_vec()).await?;

    let attempts = 16;
    let handles: Vec<_> = (0..attempts)
        .map(|_| {
            let sessions = Arc::clone(&sessions);
            let session_id = session_id.clone();
            tokio::spawn(async move { sessions.commit_session(&session_id).await })
        })
        .collect();

    let mut created = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(job) => created.push(job.job_id),
            Err(ScribeError::AlreadyCommitted { job_id, .. }) => {
                rejected += 1;
                // Every loser names the winner's job (checked below)
                assert!(job_id.starts_with("job_"));
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created.len(), 1);
    assert_eq!(rejected, attempts - 1);
    assert_eq!(jobs.job_count().await, 1);

    let summary = sessions.get_session(&session_id).await?;
    assert_eq!(summary.job_id.as_deref(), Some(created[0].as_str()));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_sessions_keep_their_own_chunks() -> Result<()> {
    let (_, sessions) = stores();
    let first = sessions.create_session(ScribeRequest::new(["soap_v1"])).await;
    let second = sessions
        .create_session(ScribeRequest::new(["referral_v1"]))
        .await;

    let mut handles = Vec::new();
    for (session_id, base) in [(first.clone(), 0u64), (second.clone(), 1000u64)] {
        for i in 0..50u64 {
            let sessions = Arc::clone(&sessions);
            let session_id = session_id.clone();
            handles.push(tokio::spawn(async move {
                sessions.add_chunk(&session_id, base + i, vec![0u8; 4]).await
            }));
        }
    }
    for handle in handles {
        assert_eq!(handle.await??, 4);
    }

    let mut first_seqs = sessions.chunk_sequences(&first).await?;
    let mut second_seqs = sessions.chunk_sequences(&second).await?;
    first_seqs.sort_unstable();
    second_seqs.sort_unstable();

    assert_eq!(first_seqs, (0..50).collect::<Vec<_>>());
    assert_eq!(second_seqs, (1000..1050).collect::<Vec<_>>());

    assert_eq!(sessions.get_session(&first).await?.bytes_received, 200);
    assert_eq!(sessions.get_session(&second).await?.bytes_received, 200);

    Ok(())
}

#[tokio::test]
async fn test_chunks_keep_arrival_order() -> Result<()> {
    let (_, sessions) = stores();
    let session_id = sessions
        .create_session(ScribeRequest::new(["soap_v1"]))
        .await;

    // Out of order, with a gap and a repeat
    for seq in [2, 0, 5, 0] {
        sessions.add_chunk(&session_id, seq, vec![seq as u8]).await?;
    }

    assert_eq!(sessions.chunk_sequences(&session_id).await?, vec![2, 0, 5, 0]);

    Ok(())
}

#[tokio::test]
async fn test_committed_audio_reaches_executor() -> Result<()> {
    let executor = RecordingExecutor::with_delay(Duration::ZERO);
    let jobs = Arc::new(JobStore::new(executor.clone()));
    let sessions = SessionStore::new(Arc::clone(&jobs), SessionLimits::default());

    let session_id = sessions
        .create_session(ScribeRequest::new(["referral_v1"]))
        .await;
    sessions.add_chunk(&session_id, 1, b"def".to_vec()).await?;
    sessions.add_chunk(&session_id, 0, b"abc".to_vec()).await?;

    let job = sessions.commit_session(&session_id).await?;
    let finished = jobs.run_processing(&job.job_id).await?;
    assert_eq!(finished.status, JobStatus::Completed);

    assert_eq!(
        executor.calls(),
        vec![vec![
            AudioChunk::new(1, b"def".to_vec()),
            AudioChunk::new(0, b"abc".to_vec()),
        ]]
    );

    // The session no longer holds the audio
    assert!(sessions.chunk_sequences(&session_id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_chunk_limits_are_enforced() -> Result<()> {
    let jobs = Arc::new(JobStore::new(Arc::new(MockExecutor::default())));
    let sessions = SessionStore::new(
        jobs,
        SessionLimits {
            max_chunks: 2,
            max_bytes: 10,
            ttl: Duration::from_secs(60),
        },
    );

    let by_size = sessions.create_session(ScribeRequest::new(["soap_v1"])).await;
    sessions.add_chunk(&by_size, 0, vec![0; 8]).await?;
    assert!(matches!(
        sessions.add_chunk(&by_size, 1, vec![0; 3]).await,
        Err(ScribeError::ChunkLimitExceeded { limit: "byte size", .. })
    ));
    // Rejected chunk was not stored
    assert_eq!(sessions.get_session(&by_size).await?.bytes_received, 8);

    let by_count = sessions.create_session(ScribeRequest::new(["soap_v1"])).await;
    sessions.add_chunk(&by_count, 0, vec![0; 1]).await?;
    sessions.add_chunk(&by_count, 1, vec![0; 1]).await?;
    assert!(matches!(
        sessions.add_chunk(&by_count, 2, vec![0; 1]).await,
        Err(ScribeError::ChunkLimitExceeded { limit: "chunk count", .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_purge_drops_old_sessions() -> Result<()> {
    let (_, sessions) = stores();

    let open = sessions.create_session(ScribeRequest::new(["soap_v1"])).await;
    let committed = sessions.create_session(ScribeRequest::new(["soap_v1"])).await;
    sessions.commit_session(&committed).await?;

    // Nothing is old enough yet
    assert_eq!(sessions.purge_expired().await, 0);
    assert_eq!(sessions.session_count().await, 2);

    assert_eq!(sessions.purge_older_than(Duration::ZERO).await, 2);
    assert_eq!(sessions.session_count().await, 0);
    assert!(matches!(
        sessions.add_chunk(&open, 0, b"x".to_vec()).await,
        Err(ScribeError::SessionNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_expired_committed_session_stays_closed() -> Result<()> {
    let (_, sessions) = stores();
    let session_id = sessions.create_session(ScribeRequest::new(["soap_v1"])).await;
    sessions.add_chunk(&session_id, 0, b"abc".to_vec()).await?;
    let job = sessions.commit_session(&session_id).await?;

    assert_eq!(sessions.purge_older_than(Duration::ZERO).await, 1);
    assert_eq!(sessions.session_count().await, 0);

    assert_eq!(
        sessions.add_chunk(&session_id, 1, b"late".to_vec()).await,
        Err(ScribeError::SessionClosed(session_id.clone()))
    );
    assert_eq!(
        sessions.commit_session(&session_id).await,
        Err(ScribeError::AlreadyCommitted {
            session_id: session_id.clone(),
            job_id: job.job_id.clone(),
        })
    );

    let summary = sessions.get_session(&session_id).await?;
    assert!(summary.committed);
    assert_eq!(summary.job_id.as_deref(), Some(job.job_id.as_str()));
    assert_eq!(summary.bytes_received, 3);

    // A second sweep leaves the committed answer in place
    assert_eq!(sessions.purge_older_than(Duration::ZERO).await, 0);
    assert!(matches!(
        sessions.add_chunk(&session_id, 2, b"later".to_vec()).await,
        Err(ScribeError::SessionClosed(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_idle_time_counts_from_last_chunk() -> Result<()> {
    let (_, sessions) = stores();
    let session_id = sessions.create_session(ScribeRequest::new(["soap_v1"])).await;

    tokio::time::sleep(Duration::from_millis(80)).await;
    sessions.add_chunk(&session_id, 0, b"abc".to_vec()).await?;

    // Older than the limit, but active within it
    assert_eq!(sessions.purge_older_than(Duration::from_millis(60)).await, 0);
    sessions.add_chunk(&session_id, 1, b"def".to_vec()).await?;

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(sessions.purge_older_than(Duration::from_millis(60)).await, 1);
    assert_eq!(
        sessions.add_chunk(&session_id, 2, b"ghi".to_vec()).await,
        Err(ScribeError::SessionNotFound(session_id.clone()))
    );

    Ok(())
}
