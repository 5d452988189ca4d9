//! Revision identifiers.
//!
//! A revision is an opaque string compared by identity only. The "nothing
//! applied" sentinel is `Option<RevisionId>::None` everywhere in the crate.

use std::fmt;
use std::str::FromStr;

use crate::error::{MigrateError, Result};

/// Width of the `version_num` column the pointer is stored in.
pub const MAX_REVISION_LEN: usize = 32;

/// Validated revision identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevisionId(String);

impl RevisionId {
    /// Create a revision identifier, rejecting values that cannot be stored
    /// in the pointer column.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let reason = if value.is_empty() {
            Some("must not be empty")
        } else if value.chars().count() > MAX_REVISION_LEN {
            Some("longer than 32 characters")
        } else if value.chars().any(char::is_control) {
            Some("contains control characters")
        } else if value.chars().any(char::is_whitespace) {
            Some("contains whitespace")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(MigrateError::InvalidRevision { value, reason }),
            None => Ok(Self(value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RevisionId {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for RevisionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Display adapter for an optional revision, printing `<base>` for none.
pub struct DisplayRev<'a>(pub Option<&'a RevisionId>);

impl fmt::Display for DisplayRev<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rev) => write!(f, "{rev}"),
            None => f.write_str("<base>"),
        }
    }
}
