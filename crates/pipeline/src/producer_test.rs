//! Tests for the producer

use std::time::Duration;

use tally_protocol::{ENVELOPE_VERSION, decode_fields, fields};
use tally_stream::{DurableStream, GroupStart};

use crate::test_support::{RecordingStream, event};
use crate::{PipelineConfig, PipelineError, Producer};

const KEY: &str = "install_events_stream";

fn producer(stream: &std::sync::Arc<RecordingStream>) -> Producer {
    Producer::new(stream.clone(), &PipelineConfig::default())
}

// =============================================================================
// create
// =============================================================================

#[tokio::test]
async fn test_create_appends_envelope_fields() {
    let stream = RecordingStream::new();
    let producer = producer(&stream);
    let mut original = event("evt-1");
    original.app_name = "Tally".into();
    original.os_name = "Android".into();

    let id = producer.create(&original).await.unwrap();

    let entries = stream.inner.entries(KEY);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, id);

    let entry = &entries[0].fields;
    assert_eq!(entry[fields::VERSION], ENVELOPE_VERSION.to_string());
    assert_eq!(entry[fields::EVENT_ID], "evt-1");
    assert_eq!(entry[fields::APP_ID], "app-1");
    assert_eq!(entry[fields::DEVICE_ID], "device-1");
    assert!(entry.contains_key(fields::EVENT_DATA));
    assert!(entry[fields::ENQUEUED_AT].parse::<i64>().unwrap() > 0);

    assert_eq!(producer.metrics().snapshot().events_enqueued, 1);
}

#[tokio::test]
async fn test_create_then_claim_round_trips() {
    let stream = RecordingStream::new();
    stream
        .ensure_group(KEY, "g", GroupStart::Beginning)
        .await
        .unwrap();
    let producer = producer(&stream);

    let mut original = event("evt-rt");
    original.signature_params.insert("alg".into(), "ed25519".into());
    producer.create(&original).await.unwrap();

    let claimed = stream
        .read_group(KEY, "g", "c", 1, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(decode_fields(&claimed[0].fields).unwrap(), original);
}

#[tokio::test]
async fn test_create_rejects_empty_event_id() {
    let stream = RecordingStream::new();
    let producer = producer(&stream);

    let err = producer.create(&event("")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(stream.inner.entries(KEY).is_empty());
    assert_eq!(producer.metrics().snapshot().events_skipped, 1);
}

#[tokio::test]
async fn test_create_does_not_deduplicate() {
    let stream = RecordingStream::new();
    let producer = producer(&stream);

    let first = producer.create(&event("same")).await.unwrap();
    let second = producer.create(&event("same")).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(stream.inner.entries(KEY).len(), 2);
}

#[tokio::test]
async fn test_create_surfaces_append_failure() {
    let stream = RecordingStream::new();
    stream.set_fail_appends(true);
    let producer = producer(&stream);

    let err = producer.create(&event("evt-1")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Enqueue(_)));
    assert_eq!(producer.metrics().snapshot().enqueue_failures, 1);
}

#[tokio::test]
async fn test_create_caps_stream_length() {
    let stream = RecordingStream::new();
    let producer = Producer::new(stream.clone(), &PipelineConfig::default().with_max_len(3));

    for i in 0..5 {
        producer.create(&event(&format!("evt-{i}"))).await.unwrap();
    }
    assert_eq!(stream.length(KEY).await.unwrap(), 3);
}

// =============================================================================
// create_batch
// =============================================================================

#[tokio::test]
async fn test_create_batch_empty_is_noop() {
    let stream = RecordingStream::new();
    let producer = producer(&stream);

    producer.create_batch(&[]).await.unwrap();
    assert!(stream.inner.entries(KEY).is_empty());
}

#[tokio::test]
async fn test_create_batch_skips_empty_ids() {
    let stream = RecordingStream::new();
    let producer = producer(&stream);
    let events = vec![event("a"), event(""), event("b"), event(""), event("c")];

    producer.create_batch(&events).await.unwrap();

    let ids: Vec<_> = stream
        .inner
        .entries(KEY)
        .iter()
        .map(|e| e.fields[fields::EVENT_ID].clone())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let snap = producer.metrics().snapshot();
    assert_eq!(snap.events_enqueued, 3);
    assert_eq!(snap.events_skipped, 2);
}

#[tokio::test]
async fn test_create_batch_shares_enqueue_time() {
    let stream = RecordingStream::new();
    let producer = producer(&stream);

    producer
        .create_batch(&[event("a"), event("b")])
        .await
        .unwrap();

    let entries = stream.inner.entries(KEY);
    assert_eq!(
        entries[0].fields[fields::ENQUEUED_AT],
        entries[1].fields[fields::ENQUEUED_AT]
    );
}

#[tokio::test]
async fn test_create_batch_without_valid_events_fails() {
    let stream = RecordingStream::new();
    let producer = producer(&stream);

    let err = producer
        .create_batch(&[event(""), event("")])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(msg) if msg == "no valid events"));
    assert!(stream.inner.entries(KEY).is_empty());
}

#[tokio::test]
async fn test_create_batch_partial_failure_still_succeeds() {
    let stream = RecordingStream::new();
    stream.set_fail_odd_pipeline_entries(true);
    let producer = producer(&stream);
    let events = vec![event("a"), event("b"), event("c"), event("d")];

    producer.create_batch(&events).await.unwrap();

    assert_eq!(stream.inner.entries(KEY).len(), 2);
    let snap = producer.metrics().snapshot();
    assert_eq!(snap.events_enqueued, 2);
    assert_eq!(snap.enqueue_failures, 2);
}

#[tokio::test]
async fn test_create_batch_round_trip_failure() {
    let stream = RecordingStream::new();
    stream.set_fail_appends(true);
    let producer = producer(&stream);

    let err = producer
        .create_batch(&[event("a"), event("b")])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Enqueue(_)));
    assert_eq!(producer.metrics().snapshot().enqueue_failures, 2);
}
