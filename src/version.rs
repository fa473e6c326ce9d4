use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A per entity write counter for optimistic concurrency.
///
/// Every mutable entity starts at version 1. A mutating request names the
/// version it last observed; the write only goes through when the stored
/// counter still matches, and then the counter moves up by exactly one.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Version(pub u64);

impl Version {
    pub const FIRST: Self = Self(1);

    #[must_use]
    pub fn bump(self) -> Self {
        Self(self.0 + 1)
    }

    /// Compares the stored counter against the version a caller claims to
    /// have seen.
    ///
    /// # Errors
    ///
    /// `StaleVersion` when the two differ.
    pub fn require(self, expected: Self) -> Result<(), EngineError> {
        if self == expected {
            Ok(())
        } else {
            Err(EngineError::StaleVersion {
                stored: self,
                expected,
            })
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Ok(Self(value.parse()?))
    }
}
