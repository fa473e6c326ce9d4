use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{pin::Pin, version::Version};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct OlympiadId(pub u64);

impl fmt::Display for OlympiadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OlympiadId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for OlympiadId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Ok(Self(value.parse()?))
    }
}

/// The root entity: one named competition with its own pin, roster, and
/// events.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Olympiad {
    pub id: OlympiadId,
    pub name: String,
    pub pin: Pin,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Olympiad {
    #[must_use]
    pub fn new(id: OlympiadId, name: String, pin: Pin) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            pin,
            version: Version::FIRST,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) -> Version {
        self.version = self.version.bump();
        self.updated_at = Utc::now();
        self.version
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OlympiadSummary {
    pub id: OlympiadId,
    pub name: String,
    pub version: Version,
}

impl From<&Olympiad> for OlympiadSummary {
    fn from(olympiad: &Olympiad) -> Self {
        Self {
            id: olympiad.id,
            name: olympiad.name.clone(),
            version: olympiad.version,
        }
    }
}

/// Returned exactly once, straight from `create_olympiad`: the only time the
/// server ever sends a pin back out.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OlympiadCreated {
    pub id: OlympiadId,
    pub version: Version,
    pub pin: Pin,
}
