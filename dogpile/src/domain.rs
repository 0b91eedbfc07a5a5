use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one cache entry. `group` only provides namespacing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub group: String,
    pub id: String,
}

impl CacheKey {
    pub fn new(group: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            id: id.into(),
        }
    }

    /// Namespace holding the payload record.
    pub fn payload_namespace(&self) -> &str {
        &self.group
    }

    /// Namespace holding the lifetime record.
    pub fn lifetime_namespace(&self) -> String {
        format!("{}#lifetime", self.group)
    }

    /// Namespace holding the updating flag.
    pub fn flag_namespace(&self) -> String {
        format!("{}#updating", self.group)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.id)
    }
}

/// Outcome of a coordinated read.
///
/// `is_valid` holds iff a payload was read, no update is in flight and the
/// caller did not run out of wait budget.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItemResult {
    pub is_valid: bool,
    pub is_updating: bool,
    pub is_timeout: bool,
    pub data: String,
}

impl CacheItemResult {
    pub fn new(payload: Option<String>, is_updating: bool, is_timeout: bool) -> Self {
        let is_valid = payload.is_some() && !is_updating && !is_timeout;
        Self {
            is_valid,
            is_updating,
            is_timeout,
            data: payload.unwrap_or_default(),
        }
    }

    pub fn timed_out() -> Self {
        Self::new(None, false, true)
    }
}
