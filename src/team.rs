use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{olympiad::OlympiadId, player::PlayerId, version::Version};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TeamId(pub u64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TeamId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for TeamId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Ok(Self(value.parse()?))
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TeamKind {
    /// The automatic team of one behind every player. It follows the
    /// player's name and cannot be renamed or deleted on its own.
    Individual,
    /// A named team assembled from players.
    Squad,
}

impl fmt::Display for TeamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Squad => write!(f, "squad"),
        }
    }
}

/// The unit that enrolls in events. Individual teams are managed through
/// their player; squads are managed directly.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Team {
    pub id: TeamId,
    pub olympiad: OlympiadId,
    pub name: String,
    pub kind: TeamKind,
    /// Members in the order they were named. Exactly one for an individual
    /// team.
    pub members: Vec<PlayerId>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    #[must_use]
    pub fn new(
        id: TeamId,
        olympiad: OlympiadId,
        name: String,
        kind: TeamKind,
        members: Vec<PlayerId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            olympiad,
            name,
            kind,
            members,
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

/// The payload of `create_team`: a squad name and its members.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TeamSpec {
    pub name: String,
    pub players: Vec<PlayerId>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TeamSummary {
    pub id: TeamId,
    pub name: String,
    pub kind: TeamKind,
    pub members: Vec<PlayerId>,
    pub version: Version,
}

impl From<&Team> for TeamSummary {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            kind: team.kind,
            members: team.members.clone(),
            version: team.version,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TeamCreated {
    pub id: TeamId,
    pub version: Version,
    pub olympiad_version: Version,
}
