//! Row type for the install_events table

use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::Serialize;
use tally_protocol::InstallEvent;
use tracing::warn;

/// Seconds per day, for `Date` conversion
const SECS_PER_DAY: i64 = 86_400;

/// One install event as stored in ClickHouse
///
/// ```sql
/// CREATE TABLE install_events (
///     app_id String,
///     app_name String,
///     app_version String,
///     app_type UInt8,
///     event_id String,
///     event_date Date,
///     event_time DateTime64(3),
///     device_id String,
///     channel_id LowCardinality(String),
///     install_ip String,
///     install_type UInt8,
///     install_result UInt8,
///     os_language LowCardinality(String),
///     os_timezone LowCardinality(String),
///     os_name LowCardinality(String),
///     os_version String,
///     os_build String,
///     os_family LowCardinality(String),
///     signature_status UInt8,
///     signature_version String,
///     signature_params String
/// ) ENGINE = ReplacingMergeTree()
/// PARTITION BY toYYYYMM(event_date)
/// ORDER BY (app_id, event_date, event_id);
/// ```
///
/// `ReplacingMergeTree` keyed on `event_id` collapses the duplicates that
/// at-least-once delivery can produce.
#[derive(Debug, Clone, PartialEq, Eq, Row, Serialize)]
pub struct InstallEventRow {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub app_type: u8,
    pub event_id: String,

    /// Days since 1970-01-01
    pub event_date: u16,

    /// Milliseconds since epoch
    pub event_time: i64,

    pub device_id: String,
    pub channel_id: String,
    pub install_ip: String,
    pub install_type: u8,
    pub install_result: u8,
    pub os_language: String,
    pub os_timezone: String,
    pub os_name: String,
    pub os_version: String,
    pub os_build: String,
    pub os_family: String,
    pub signature_status: u8,
    pub signature_version: String,

    /// Signature parameters as a JSON object
    pub signature_params: String,
}

impl InstallEventRow {
    /// Build a row from an event
    ///
    /// An `event_time` outside the `Date` range (1970-01-01 to 2149-06-06)
    /// is stored with `event_date` clamped to the nearest bound and a
    /// warning, while `event_time` keeps the real value.
    pub fn from_event(event: &InstallEvent) -> Self {
        let event_date = date_days(&event.event_time).unwrap_or_else(|days| {
            let clamped = days.clamp(0, i64::from(u16::MAX)) as u16;
            warn!(
                event_id = %event.event_id,
                event_time = %event.event_time,
                days,
                clamped,
                "event_time outside Date range, event_date clamped"
            );
            clamped
        });
        let signature_params =
            serde_json::to_string(&event.signature_params).unwrap_or_else(|_| "{}".into());

        Self {
            app_id: event.app_id.clone(),
            app_name: event.app_name.clone(),
            app_version: event.app_version.clone(),
            app_type: event.app_type.as_u8(),
            event_id: event.event_id.clone(),
            event_date,
            event_time: event.event_time.timestamp_millis(),
            device_id: event.device_id.clone(),
            channel_id: event.channel_id.clone(),
            install_ip: event.install_ip.clone(),
            install_type: event.install_type.as_u8(),
            install_result: event.install_result.as_u8(),
            os_language: event.os_language.clone(),
            os_timezone: event.os_timezone.clone(),
            os_name: event.os_name.clone(),
            os_version: event.os_version.clone(),
            os_build: event.os_build.clone(),
            os_family: event.os_family.clone(),
            signature_status: event.signature_status,
            signature_version: event.signature_version.clone(),
            signature_params,
        }
    }
}

/// Days since the Unix epoch as a ClickHouse `Date`; `Err` carries the
/// unrepresentable day number
pub(super) fn date_days(time: &DateTime<Utc>) -> Result<u16, i64> {
    let days = time.timestamp().div_euclid(SECS_PER_DAY);
    u16::try_from(days).map_err(|_| days)
}

impl From<&InstallEvent> for InstallEventRow {
    fn from(event: &InstallEvent) -> Self {
        Self::from_event(event)
    }
}
