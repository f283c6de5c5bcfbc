//! Tests for the stream entry envelope

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};

use crate::{AppType, DecodeError, ENVELOPE_VERSION, Envelope, InstallEvent, decode_fields, fields};

fn event(id: &str) -> InstallEvent {
    InstallEvent::new(
        id,
        "app-1",
        AppType::Windows,
        "dev-1",
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    )
}

#[test]
fn test_fields_carry_identity_and_payload() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 5).unwrap();
    let fields_map = Envelope::for_event(&event("e-1"), now).unwrap().into_fields();

    assert_eq!(fields_map[fields::VERSION], ENVELOPE_VERSION.to_string());
    assert_eq!(fields_map[fields::EVENT_ID], "e-1");
    assert_eq!(fields_map[fields::APP_ID], "app-1");
    assert_eq!(fields_map[fields::DEVICE_ID], "dev-1");
    assert_eq!(fields_map[fields::ENQUEUED_AT], now.timestamp().to_string());
    assert_eq!(fields_map.len(), 6);
}

#[test]
fn test_decode_fields_returns_original_event() {
    let original = event("e-2");
    let fields_map = Envelope::for_event(&original, Utc::now()).unwrap().into_fields();
    assert_eq!(decode_fields(&fields_map).unwrap(), original);
}

#[test]
fn test_missing_version_reads_as_v1() {
    let mut fields_map = Envelope::for_event(&event("e-3"), Utc::now()).unwrap().into_fields();
    fields_map.remove(fields::VERSION);
    let envelope = Envelope::from_fields(&fields_map).unwrap();
    assert_eq!(envelope.version, 1);
}

#[test]
fn test_newer_version_rejected() {
    let mut fields_map = Envelope::for_event(&event("e-4"), Utc::now()).unwrap().into_fields();
    fields_map.insert(fields::VERSION.into(), "7".into());
    assert!(matches!(
        Envelope::from_fields(&fields_map),
        Err(DecodeError::UnsupportedVersion(7))
    ));
}

#[test]
fn test_missing_event_data_rejected() {
    let fields_map = BTreeMap::from([(fields::EVENT_ID.to_string(), "e-5".to_string())]);
    assert!(matches!(
        Envelope::from_fields(&fields_map),
        Err(DecodeError::MissingField("event_data"))
    ));
}

#[test]
fn test_malformed_payload_rejected() {
    let fields_map = BTreeMap::from([
        (fields::EVENT_ID.to_string(), "e-6".to_string()),
        (fields::EVENT_DATA.to_string(), "{broken".to_string()),
    ]);
    assert!(matches!(
        decode_fields(&fields_map),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn test_payload_id_mismatch_rejected() {
    let mut fields_map = Envelope::for_event(&event("e-7"), Utc::now()).unwrap().into_fields();
    fields_map.insert(fields::EVENT_ID.into(), "other".into());
    let err = decode_fields(&fields_map).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidField { field: "event_id", .. }));
}

#[test]
fn test_bad_enqueued_at_rejected() {
    let mut fields_map = Envelope::for_event(&event("e-8"), Utc::now()).unwrap().into_fields();
    fields_map.insert(fields::ENQUEUED_AT.into(), "yesterday".into());
    assert!(matches!(
        Envelope::from_fields(&fields_map),
        Err(DecodeError::InvalidField { field: "enqueued_at", .. })
    ));
}

#[test]
fn test_enqueued_time() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let envelope = Envelope::for_event(&event("e-9"), now).unwrap();
    assert_eq!(envelope.enqueued_time(), Some(now));
}
