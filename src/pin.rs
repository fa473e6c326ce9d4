use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A four digit access code, one per olympiad.
///
/// The pin is chosen or generated when an olympiad is created and echoed
/// back exactly once; after that every mutating request must carry it.
/// There is deliberately no `PartialEq`: the only supported comparison is
/// [`Pin::matches`], which runs in constant time.
#[derive(Clone, Deserialize, Serialize)]
pub struct Pin(String);

impl Pin {
    #[must_use]
    pub fn generate() -> Self {
        let value: u16 = rand::rng().random_range(0..10_000);
        Self(format!("{value:04}"))
    }

    /// Compares two pins without an early exit, so the time taken does not
    /// depend on where the first wrong digit is.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }

        let mut diff = 0u8;
        for (a, b) in self.0.bytes().zip(other.0.bytes()) {
            diff |= a ^ b;
        }

        diff == 0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin(****)")
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Pin {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, EngineError> {
        if value.len() == 4 && value.bytes().all(|byte| byte.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(EngineError::BadPin)
        }
    }
}
