//! Stream value types

use std::collections::BTreeMap;
use std::fmt;

/// Named string fields of one stream entry
pub type Fields = BTreeMap<String, String>;

/// Opaque, monotonically increasing entry id assigned by the stream
///
/// The id is the unit of acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One entry as delivered by a group read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: Fields,
    /// Times the group has delivered this entry, counting this delivery.
    /// 1 for a fresh read, higher for reclaimed entries, 0 when listed
    /// outside a group read.
    pub deliveries: u32,
}

/// Outcome of idempotent consumer group creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCreation {
    /// Group was created by this call
    Created,
    /// Group already existed; not an error
    AlreadyExists,
}

/// Where a newly created group starts reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupStart {
    /// Deliver every entry still in the stream
    #[default]
    Beginning,
    /// Deliver only entries appended after creation
    Latest,
}

impl GroupStart {
    /// Start id in Redis notation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginning => "0",
            Self::Latest => "$",
        }
    }
}
