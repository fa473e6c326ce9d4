use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::EngineError,
    event::{EventStatus, ScoreKind},
    stage::{GroupId, StageStatus},
    team::TeamId,
    version::Version,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MatchId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for MatchId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Ok(Self(value.parse()?))
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Waiting, either for opponents or for a first result.
    Pending,
    /// Both slots were filled by advancement; a result is expected.
    Running,
    /// Winner decided. Byes start here.
    Finished,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// One occupied side of a match.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchSlot {
    pub team: TeamId,
    pub score: Option<i64>,
}

/// A single pairing inside a group.
///
/// Zero, one, or two slots are occupied. One occupant is a bye: the match is
/// born finished and its occupant advances unplayed. The winner of a match
/// with a `next_match` link fills the first open slot of that match; the one
/// match per single elimination stage without a link is the stage final.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Match {
    pub id: MatchId,
    pub group: GroupId,
    pub status: MatchStatus,
    pub slots: Vec<MatchSlot>,
    pub winner: Option<TeamId>,
    pub next_match: Option<MatchId>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    #[must_use]
    pub fn new(id: MatchId, group: GroupId, teams: &[TeamId], next_match: Option<MatchId>) -> Self {
        let now = Utc::now();
        let slots = teams
            .iter()
            .map(|&team| MatchSlot { team, score: None })
            .collect::<Vec<_>>();

        let (status, winner) = if let [only] = slots.as_slice() {
            (MatchStatus::Finished, Some(only.team))
        } else {
            (MatchStatus::Pending, None)
        };

        Self {
            id,
            group,
            status,
            slots,
            winner,
            next_match,
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

    #[must_use]
    pub fn occupants(&self) -> Vec<TeamId> {
        self.slots.iter().map(|slot| slot.team).collect()
    }

    /// Puts an advancing team into the first open slot. Filling the second
    /// slot moves the match from pending to running.
    pub(crate) fn fill(&mut self, team: TeamId) {
        debug_assert!(self.slots.len() < 2);
        debug_assert!(self.status != MatchStatus::Finished);

        self.slots.push(MatchSlot { team, score: None });
        if self.slots.len() == 2 {
            self.status = MatchStatus::Running;
        }
    }

    /// Records a result: both occupants scored once, winner by the strictly
    /// higher score.
    ///
    /// Returns `false` for a resubmission that matches the recorded result
    /// exactly, which is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// `MatchNotReady` with fewer than two occupants, `ScoresMalformed`,
    /// `NotAnOccupant`, `BadOutcome`, or `TiedScore` for a bad submission,
    /// and `ResultChanged` when the match is finished and the scores differ
    /// from the recorded ones.
    pub fn record(&mut self, scores: &[(TeamId, i64)], kind: ScoreKind) -> Result<bool, EngineError> {
        if self.slots.len() < 2 {
            return Err(EngineError::MatchNotReady(self.id));
        }
        if scores.len() != 2 {
            return Err(EngineError::ScoresMalformed);
        }

        // Align the submitted pair with the slot order.
        let mut aligned = [None; 2];
        for &(team, score) in scores {
            let Some(index) = self.slots.iter().position(|slot| slot.team == team) else {
                return Err(EngineError::NotAnOccupant { id: self.id, team });
            };
            if aligned[index].is_some() {
                return Err(EngineError::ScoresMalformed);
            }
            aligned[index] = Some(score);
        }
        let (Some(first), Some(second)) = (aligned[0], aligned[1]) else {
            return Err(EngineError::ScoresMalformed);
        };

        match kind {
            ScoreKind::Outcome => {
                let flags = (first, second);
                if flags != (1, 0) && flags != (0, 1) {
                    return Err(EngineError::BadOutcome);
                }
            }
            ScoreKind::Points => {
                if first == second {
                    return Err(EngineError::TiedScore);
                }
            }
        }

        if self.status == MatchStatus::Finished {
            let recorded: Vec<Option<i64>> = self.slots.iter().map(|slot| slot.score).collect();
            if recorded == vec![Some(first), Some(second)] {
                return Ok(false);
            }
            return Err(EngineError::ResultChanged(self.id));
        }

        self.slots[0].score = Some(first);
        self.slots[1].score = Some(second);
        self.winner = if first > second {
            Some(self.slots[0].team)
        } else {
            Some(self.slots[1].team)
        };
        self.status = MatchStatus::Finished;

        Ok(true)
    }
}

/// What a score submission did, through the whole cascade.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ScoreOutcome {
    pub match_id: MatchId,
    /// `false` when an identical result was resubmitted and nothing moved.
    pub changed: bool,
    pub match_version: Version,
    pub winner: Option<TeamId>,
    pub stage_status: StageStatus,
    pub event_status: EventStatus,
}
