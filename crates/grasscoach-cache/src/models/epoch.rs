use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of an epoch identifier.
/// Epochs end up inside directory names, so keep them well under path limits.
const MAX_EPOCH_LENGTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid epoch identifier {value:?}: {reason}")]
pub struct InvalidEpoch {
    pub value: String,
    pub reason: &'static str,
}

/// A named generation of the application's asset set, e.g. `v1`.
///
/// Epochs are ordered by deployment, not by their text, so no `Ord` is
/// provided. Two epochs are the same generation only if their identifiers
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Epoch(String);

impl Epoch {
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidEpoch> {
        let value = value.into();
        if let Err(reason) = check_label(&value, MAX_EPOCH_LENGTH) {
            return Err(InvalidEpoch { value, reason });
        }
        Ok(Self(value))
    }

    /// Build an epoch from a compile-time literal known to be valid.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(check_label(value, MAX_EPOCH_LENGTH).is_ok());
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate a label that becomes part of a durable store name.
/// Only ASCII alphanumerics, `.`, `_` and `-` are accepted.
pub(crate) fn check_label(value: &str, max_len: usize) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("must not be empty");
    }
    if value.len() > max_len {
        return Err("too long");
    }
    if value == "." || value == ".." {
        return Err("reserved path component");
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err("only ASCII letters, digits, '.', '_' and '-' are allowed");
    }
    Ok(())
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Epoch {
    type Err = InvalidEpoch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Epoch {
    type Error = InvalidEpoch;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Epoch> for String {
    fn from(epoch: Epoch) -> Self {
        epoch.0
    }
}
