//! Ingestion orchestrator tests.
//!
//! Drive mention events through the full pipeline against the in-memory
//! store and scripted oracles: idempotency under repeated delivery, oracle
//! degradation paths, and reply-failure semantics.

mod common;

use std::sync::Arc;

use truthlens_core::{MockOracle, ScriptedOutcome};
use truthlens_server::ingest::{process_mention, IngestOutcome, RejectReason};
use truthlens_server::store::OracleStatus;

use common::{build_state, build_state_with, mention_event, test_config, CaptureReplySink, FailingReplySink};

#[tokio::test]
async fn test_event_creates_detection_and_page() {
    let replies = Arc::new(CaptureReplySink::default());
    let state = build_state_with(
        test_config(),
        Arc::new(MockOracle::with_probability(0.92)),
        replies.clone(),
    );

    let event = mention_event("1001", "alice", &["https://img.example/a.jpg"]);
    let outcome = process_mention(&state, &event).await.unwrap();

    let IngestOutcome::Completed { page_id, created } = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert!(created);

    let view = state.store.get_page(&page_id).await.unwrap().unwrap();
    assert_eq!(view.detection.ai_probability, Some(0.92));
    assert_eq!(view.detection.oracle_status, OracleStatus::Scored);
    assert_eq!(view.detection.source_handle, "alice");
    assert_eq!(
        view.detection.image_url.as_deref(),
        Some("https://img.example/a.jpg")
    );

    // The reply carries the probability and the page link.
    let posted = replies.posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].in_reply_to, "1001");
    assert!(posted[0].text.contains("92%"));
    assert!(posted[0].text.contains(&format!("http://testhost/d/{page_id}")));
}

#[tokio::test]
async fn test_duplicate_delivery_creates_one_detection() {
    let replies = Arc::new(CaptureReplySink::default());
    let state = build_state_with(
        test_config(),
        Arc::new(MockOracle::with_probability(0.6)),
        replies.clone(),
    );

    let event = mention_event("2002", "alice", &["https://img.example/a.jpg"]);

    let first = process_mention(&state, &event).await.unwrap();
    let second = process_mention(&state, &event).await.unwrap();

    let IngestOutcome::Completed {
        page_id: first_page,
        created: true,
    } = first
    else {
        panic!("expected created Completed, got {first:?}");
    };
    let IngestOutcome::Completed {
        page_id: second_page,
        created: false,
    } = second
    else {
        panic!("expected reused Completed, got {second:?}");
    };

    assert_eq!(first_page, second_page);
    // Only the winning delivery replied.
    assert_eq!(replies.posted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_event_without_image_is_rejected_without_side_effects() {
    let state = build_state(Arc::new(MockOracle::with_probability(0.5)));

    let event = mention_event("3003", "alice", &[]);
    let outcome = process_mention(&state, &event).await.unwrap();

    assert_eq!(outcome, IngestOutcome::Rejected(RejectReason::NoImage));
    assert!(state
        .store
        .find_by_source_event("3003")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_self_mention_is_skipped() {
    // Config::default sets bot_handle = "truthlens".
    let state = build_state(Arc::new(MockOracle::with_probability(0.5)));

    let event = mention_event("4004", "TruthLens", &["https://img.example/a.jpg"]);
    let outcome = process_mention(&state, &event).await.unwrap();

    assert_eq!(outcome, IngestOutcome::Rejected(RejectReason::SelfMention));
}

#[tokio::test]
async fn test_oracle_recovers_within_retry_budget() {
    let oracle = Arc::new(MockOracle::scripted(vec![
        ScriptedOutcome::Unavailable,
        ScriptedOutcome::Unavailable,
        ScriptedOutcome::Unavailable,
        ScriptedOutcome::Probability(0.77),
    ]));
    let state = build_state(oracle.clone());

    let event = mention_event("5005", "alice", &["https://img.example/a.jpg"]);
    let outcome = process_mention(&state, &event).await.unwrap();

    let IngestOutcome::Completed { page_id, .. } = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };

    // The eventually-returned probability is recorded, not null.
    let view = state.store.get_page(&page_id).await.unwrap().unwrap();
    assert_eq!(view.detection.ai_probability, Some(0.77));
    assert_eq!(oracle.calls(), 4);
}

#[tokio::test]
async fn test_oracle_exhaustion_degrades_to_pending() {
    let state = build_state(Arc::new(MockOracle::always_unavailable()));

    let event = mention_event("6006", "alice", &["https://img.example/a.jpg"]);
    let outcome = process_mention(&state, &event).await.unwrap();

    // Ingestion is never blocked on the oracle.
    let IngestOutcome::Completed { page_id, .. } = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };

    let view = state.store.get_page(&page_id).await.unwrap().unwrap();
    assert_eq!(view.detection.ai_probability, None);
    assert_eq!(view.detection.oracle_status, OracleStatus::Pending);
    assert!(view.detection.verdict().is_none());
}

#[tokio::test]
async fn test_oracle_rejection_is_terminal_and_not_retried() {
    let oracle = Arc::new(MockOracle::scripted(vec![ScriptedOutcome::Rejected]));
    let state = build_state(oracle.clone());

    let event = mention_event("7007", "alice", &["https://img.example/a.gif"]);
    let outcome = process_mention(&state, &event).await.unwrap();

    let IngestOutcome::Completed { page_id, .. } = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };

    let view = state.store.get_page(&page_id).await.unwrap().unwrap();
    assert_eq!(view.detection.ai_probability, None);
    assert_eq!(view.detection.oracle_status, OracleStatus::Unsupported);
    // No retry on rejection.
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn test_reply_failure_leaves_servable_record() {
    let state = build_state_with(
        test_config(),
        Arc::new(MockOracle::with_probability(0.88)),
        Arc::new(FailingReplySink),
    );

    let event = mention_event("8008", "alice", &["https://img.example/a.jpg"]);
    let outcome = process_mention(&state, &event).await.unwrap();

    let IngestOutcome::PartiallyFailed { page_id } = outcome else {
        panic!("expected PartiallyFailed, got {outcome:?}");
    };

    // Persistence was not rolled back.
    let view = state.store.get_page(&page_id).await.unwrap().unwrap();
    assert_eq!(view.detection.ai_probability, Some(0.88));
}

#[tokio::test]
async fn test_concurrent_deliveries_converge_on_one_page() {
    let state = build_state(Arc::new(MockOracle::with_probability(0.5)));

    let event = mention_event("9009", "alice", &["https://img.example/a.jpg"]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let event = event.clone();
        handles.push(tokio::spawn(async move {
            process_mention(&state, &event).await.unwrap()
        }));
    }

    let mut page_ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            IngestOutcome::Completed { page_id, .. } => page_ids.push(page_id),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    page_ids.sort();
    page_ids.dedup();
    assert_eq!(page_ids.len(), 1, "all deliveries must share one page");
}
