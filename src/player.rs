use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{olympiad::OlympiadId, team::TeamId, version::Version};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for PlayerId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Ok(Self(value.parse()?))
    }
}

/// One competitor. Every player owns an individual team of one, created with
/// the player and named after them, so single player events enroll the same
/// way squad events do. Squad membership is recorded on the squad.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub olympiad: OlympiadId,
    pub name: String,
    /// The player's individual team of one.
    pub team: TeamId,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, olympiad: OlympiadId, name: String, team: TeamId) -> Self {
        let now = Utc::now();
        Self {
            id,
            olympiad,
            name,
            team,
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
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    /// The individual team of one.
    pub team: TeamId,
    /// The squad the player belongs to, when they belong to one.
    pub squad: Option<TeamId>,
    pub version: Version,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerCreated {
    pub id: PlayerId,
    /// The individual team created alongside the player.
    pub team: TeamId,
    pub version: Version,
    pub olympiad_version: Version,
}
