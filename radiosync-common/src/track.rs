//! Track identifier
//!
//! A track is referenced by an external 11-character content ID drawn from
//! `[A-Za-z0-9_-]`. Validation happens once at the request boundary; everything
//! past that point works with an already-valid `TrackId`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Required length of a track identifier
pub const TRACK_ID_LEN: usize = 11;

/// Validated external track identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackId(String);

impl TrackId {
    /// Validate and wrap a raw identifier
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = raw.len() == TRACK_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::InvalidInput(format!("Invalid track ID format: {:?}", raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TrackId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TrackId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TrackId> for String {
    fn from(id: TrackId) -> Self {
        id.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
