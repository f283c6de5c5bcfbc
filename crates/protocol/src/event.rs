//! Install event model
//!
//! One `InstallEvent` describes one install occurrence reported by a mobile or
//! desktop client. The numeric enums below are stored by code, both in the
//! encoded payload and in the analytics table.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Platform the installed application targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum AppType {
    Windows = 1,
    MacOS = 2,
    Ios = 3,
    Android = 4,
}

impl AppType {
    /// Convert to the stored numeric code
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable platform name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::MacOS => "MacOS",
            Self::Ios => "iOS",
            Self::Android => "Android",
        }
    }
}

impl TryFrom<u8> for AppType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Windows),
            2 => Ok(Self::MacOS),
            3 => Ok(Self::Ios),
            4 => Ok(Self::Android),
            other => Err(DecodeError::invalid_code("app_type", other)),
        }
    }
}

impl From<AppType> for u8 {
    fn from(value: AppType) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether this is the first install on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum InstallType {
    FirstInstall = 1,
    RepeatInstall = 2,
}

impl InstallType {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstInstall => "FirstInstall",
            Self::RepeatInstall => "RepeatInstall",
        }
    }
}

impl TryFrom<u8> for InstallType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::FirstInstall),
            2 => Ok(Self::RepeatInstall),
            other => Err(DecodeError::invalid_code("install_type", other)),
        }
    }
}

impl From<InstallType> for u8 {
    fn from(value: InstallType) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum InstallResult {
    Fail = 0,
    Success = 1,
}

impl InstallResult {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "Fail",
            Self::Success => "Success",
        }
    }
}

impl TryFrom<u8> for InstallResult {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Fail),
            1 => Ok(Self::Success),
            other => Err(DecodeError::invalid_code("install_result", other)),
        }
    }
}

impl From<InstallResult> for u8 {
    fn from(value: InstallResult) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for InstallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single install occurrence
///
/// `event_id` is assigned by the reporting client and is the idempotency key
/// used for downstream de-duplication. Nothing in the pipeline de-duplicates
/// on it.
///
/// The identity fields, `event_time` and the three coded enums are required on
/// the wire; every descriptive field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallEvent {
    /// Application identifier
    pub app_id: String,

    #[serde(default)]
    pub app_name: String,

    #[serde(default)]
    pub app_version: String,

    pub app_type: AppType,

    /// Caller-assigned idempotency key
    pub event_id: String,

    /// When the install happened (client clock, UTC)
    pub event_time: DateTime<Utc>,

    pub device_id: String,

    /// Distribution channel the install came through
    #[serde(default)]
    pub channel_id: String,

    #[serde(default)]
    pub install_ip: String,

    pub install_type: InstallType,

    pub install_result: InstallResult,

    #[serde(default)]
    pub os_language: String,

    #[serde(default)]
    pub os_timezone: String,

    #[serde(default)]
    pub os_name: String,

    #[serde(default)]
    pub os_version: String,

    #[serde(default)]
    pub os_build: String,

    #[serde(default)]
    pub os_family: String,

    /// Signature verification status code
    #[serde(default)]
    pub signature_status: u8,

    #[serde(default)]
    pub signature_version: String,

    /// Free-form signature verification parameters
    #[serde(default)]
    pub signature_params: BTreeMap<String, String>,
}

impl InstallEvent {
    /// Create a successful first install with empty descriptive fields
    pub fn new(
        event_id: impl Into<String>,
        app_id: impl Into<String>,
        app_type: AppType,
        device_id: impl Into<String>,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_name: String::new(),
            app_version: String::new(),
            app_type,
            event_id: event_id.into(),
            event_time,
            device_id: device_id.into(),
            channel_id: String::new(),
            install_ip: String::new(),
            install_type: InstallType::FirstInstall,
            install_result: InstallResult::Success,
            os_language: String::new(),
            os_timezone: String::new(),
            os_name: String::new(),
            os_version: String::new(),
            os_build: String::new(),
            os_family: String::new(),
            signature_status: 0,
            signature_version: String::new(),
            signature_params: BTreeMap::new(),
        }
    }

    /// The UTC calendar day of `event_time`
    pub fn event_date(&self) -> NaiveDate {
        self.event_time.date_naive()
    }

    /// Whether the install succeeded
    #[inline]
    pub fn is_success(&self) -> bool {
        self.install_result == InstallResult::Success
    }
}
