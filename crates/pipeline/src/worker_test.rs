//! Tests for the worker lifecycle

use std::sync::Arc;
use std::time::Duration;

use tally_sinks::MemorySink;
use tally_stream::DurableStream;

use crate::test_support::{RecordingStream, event};
use crate::{ConsumerState, PipelineConfig, PipelineError, Producer, Worker, backlog_status};

fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_batch_size(10)
        .with_flush_interval(Duration::from_secs(3600))
        .without_reclaim()
}

fn worker(stream: &Arc<RecordingStream>, sink: &Arc<MemorySink>) -> Worker {
    Worker::new(stream.clone(), sink.clone(), config()).unwrap()
}

#[test]
fn test_new_rejects_invalid_config() {
    let stream = RecordingStream::new();
    let result = Worker::new(
        stream,
        Arc::new(MemorySink::new()),
        PipelineConfig::default().with_batch_size(0),
    );
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn test_start_stop_transitions_state() {
    let stream = RecordingStream::new();
    let sink = Arc::new(MemorySink::new());
    let mut worker = worker(&stream, &sink);
    assert_eq!(worker.state(), ConsumerState::Idle);
    assert!(!worker.is_running());

    worker.start().await.unwrap();
    assert_eq!(worker.state(), ConsumerState::Running);
    assert!(worker.is_running());

    worker.stop().await;
    assert_eq!(worker.state(), ConsumerState::Stopped);
    assert!(!worker.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_fails() {
    let stream = RecordingStream::new();
    let sink = Arc::new(MemorySink::new());
    let mut worker = worker(&stream, &sink);

    worker.start().await.unwrap();
    let err = worker.start().await.unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyRunning));

    worker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let stream = RecordingStream::new();
    let sink = Arc::new(MemorySink::new());
    let mut worker = worker(&stream, &sink);

    // Never started
    worker.stop().await;
    assert_eq!(worker.state(), ConsumerState::Idle);

    worker.start().await.unwrap();
    worker.stop().await;
    worker.stop().await;
    assert_eq!(worker.state(), ConsumerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let stream = RecordingStream::new();
    let sink = Arc::new(MemorySink::new());
    let producer = Producer::new(stream.clone(), &config());
    let mut worker = worker(&stream, &sink);

    worker.start().await.unwrap();
    producer.create(&event("first")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    worker.stop().await;

    worker.start().await.unwrap();
    producer.create(&event("second")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    worker.stop().await;

    let ids: Vec<_> = sink.events().into_iter().map(|e| e.event_id).collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[tokio::test]
async fn test_start_fails_when_group_cannot_be_created() {
    let stream = RecordingStream::new();
    stream.set_fail_groups(true);
    let sink = Arc::new(MemorySink::new());
    let mut worker = worker(&stream, &sink);

    let err = worker.start().await.unwrap_err();
    assert!(matches!(err, PipelineError::Start(_)));
    assert!(!worker.is_running());
    assert_eq!(worker.state(), ConsumerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_loop() {
    let stream = RecordingStream::new();
    let sink = Arc::new(MemorySink::new());
    let mut worker = worker(&stream, &sink);
    let mut state = worker.subscribe();

    worker.start().await.unwrap();
    Producer::new(stream.clone(), &config())
        .create(&event("a"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(worker);

    state
        .wait_for(|s| *s == ConsumerState::Stopped)
        .await
        .unwrap();
    // The loop still drained its batch on the way out
    assert_eq!(sink.events().len(), 1);
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_reports_backlog() {
    let stream = RecordingStream::new();
    let sink = Arc::new(MemorySink::new());
    let mut worker = worker(&stream, &sink);
    worker.start().await.unwrap();

    let producer = Producer::new(stream.clone(), &config());
    producer
        .create_batch(&[event("a"), event("b"), event("c")])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Claimed into the batch but not yet flushed
    let status = worker.status().await.unwrap();
    assert_eq!(status.pending_count, 3);
    assert_eq!(status.stream_length, 3);
    assert_eq!(status.stream_key, "install_events_stream");
    assert_eq!(status.group_name, "install_events_consumer_group");
    assert_eq!(status.consumer_name, "install_events_consumer");

    worker.stop().await;
    let status = worker.status().await.unwrap();
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.stream_length, 3);
}

#[tokio::test]
async fn test_status_without_group_fails() {
    let stream = RecordingStream::new();
    let err = backlog_status(stream.as_ref(), &config())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Stream(_)));
}

#[tokio::test]
async fn test_status_serializes_to_json() {
    let stream = RecordingStream::new();
    stream
        .ensure_group(
            "install_events_stream",
            "install_events_consumer_group",
            tally_stream::GroupStart::Beginning,
        )
        .await
        .unwrap();

    let status = backlog_status(stream.as_ref(), &config()).await.unwrap();
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["pending_count"], 0);
    assert_eq!(json["stream_length"], 0);
    assert_eq!(json["group_name"], "install_events_consumer_group");
    assert_eq!(json["consumer_name"], "install_events_consumer");
    assert_eq!(json["stream_key"], "install_events_stream");
}
