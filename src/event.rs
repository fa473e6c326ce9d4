use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{
    error::EngineError,
    matches::{MatchId, MatchStatus},
    olympiad::OlympiadId,
    stage::{GroupId, StageId, StageKind, StageStatus},
    store::Store,
    team::TeamId,
    version::Version,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for EventId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Ok(Self(value.parse()?))
    }
}

/// How a match result is read.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Free numeric scores; the strictly higher one wins, ties are rejected.
    Points,
    /// A 1/0 win indicator; exactly one side gets the 1.
    Outcome,
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Points => write!(f, "points"),
            Self::Outcome => write!(f, "outcome"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Created, bracket built, nothing played yet.
    Registration,
    /// At least one result is in.
    Started,
    /// The last stage concluded.
    Finished,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// One competition within an olympiad, run as an ordered chain of stages.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Event {
    pub id: EventId,
    pub olympiad: OlympiadId,
    pub name: String,
    pub score_kind: ScoreKind,
    pub status: EventStatus,
    /// Enrolled teams in seed order, strongest first.
    pub seeds: Vec<TeamId>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn new(
        id: EventId,
        olympiad: OlympiadId,
        name: String,
        score_kind: ScoreKind,
        seeds: Vec<TeamId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            olympiad,
            name,
            score_kind,
            status: EventStatus::Registration,
            seeds,
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

/// One entry of an event's stage plan, as supplied at event creation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StageSpec {
    pub kind: StageKind,
    /// How many ranked participants feed the next stage. Omitted on the
    /// final stage only.
    #[serde(default)]
    pub advance_count: Option<usize>,
    /// Group sizes for a groups stage, dealt from the seed order. Required
    /// for groups, forbidden otherwise.
    #[serde(default)]
    pub group_sizes: Option<Vec<usize>>,
}

/// The payload of `create_event`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventSpec {
    pub name: String,
    pub score_kind: ScoreKind,
    /// Teams in seed order, strongest first.
    pub teams: Vec<TeamId>,
    pub stages: Vec<StageSpec>,
}

impl EventSpec {
    /// Checks the shape of the spec: enough distinct teams and a stage plan
    /// whose advance counts chain together.
    ///
    /// # Errors
    ///
    /// A `Validation` error naming the first problem found.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.teams.len() < 2 {
            return Err(EngineError::TooFewTeams(self.teams.len()));
        }

        let mut seen = FxHashSet::default();
        for &team in &self.teams {
            if !seen.insert(team) {
                return Err(EngineError::DuplicateTeam(team));
            }
        }

        validate_stages(&self.stages, self.teams.len())
    }
}

fn validate_stages(stages: &[StageSpec], mut entrants: usize) -> Result<(), EngineError> {
    if stages.is_empty() {
        return Err(EngineError::NoStages);
    }

    let last = stages.len() - 1;
    for (index, spec) in stages.iter().enumerate() {
        let stage = index + 1;

        match spec.kind {
            StageKind::Groups => {
                let Some(sizes) = &spec.group_sizes else {
                    return Err(EngineError::GroupSizesRequired { stage });
                };
                let sum: usize = sizes.iter().sum();
                if sizes.is_empty() || sum != entrants || sizes.iter().any(|&size| size < 2) {
                    return Err(EngineError::BadGroupSizes { stage, entrants });
                }
            }
            StageKind::RoundRobin | StageKind::SingleElimination => {
                if spec.group_sizes.is_some() {
                    return Err(EngineError::GroupSizesForbidden { stage });
                }
            }
        }

        if index == last {
            if spec.advance_count.is_some() {
                return Err(EngineError::AdvanceCountOnFinal);
            }
        } else {
            let Some(advance) = spec.advance_count else {
                return Err(EngineError::AdvanceCountMissing { stage });
            };
            if advance < 2 || advance > entrants {
                return Err(EngineError::AdvanceCountOutOfRange {
                    stage,
                    advance,
                    entrants,
                });
            }
            entrants = advance;
        }
    }

    Ok(())
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventSummary {
    pub id: EventId,
    pub name: String,
    pub score_kind: ScoreKind,
    pub status: EventStatus,
    pub version: Version,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            score_kind: event.score_kind,
            status: event.status,
            version: event.version,
        }
    }
}

/// The full render payload for one event: every stage, group, match, and
/// bracket link, so a client can draw the tree with no further queries.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventDetail {
    pub id: EventId,
    pub name: String,
    pub score_kind: ScoreKind,
    pub status: EventStatus,
    pub version: Version,
    /// Enrolled teams in seed order.
    pub teams: Vec<TeamView>,
    pub stages: Vec<StageView>,
}

impl EventDetail {
    /// Walks the event's stages, groups, and matches and joins in the team
    /// names.
    pub(crate) fn assemble(store: &Store, event: &Event) -> Result<Self, EngineError> {
        let mut teams = Vec::with_capacity(event.seeds.len());
        for &team_id in &event.seeds {
            teams.push(TeamView {
                id: team_id,
                name: store.team(team_id)?.name.clone(),
            });
        }

        let mut stages = Vec::new();
        for stage_id in store.stages_of(event.id) {
            let stage = store.stage(stage_id)?;
            let mut groups = Vec::new();

            for group_id in store.groups_of(stage_id) {
                let group = store.group(group_id)?;
                let mut matches = Vec::new();

                for match_id in store.matches_of_group(group_id) {
                    let row = store.match_row(match_id)?;
                    let mut match_teams = Vec::with_capacity(row.slots.len());
                    for slot in &row.slots {
                        match_teams.push(MatchTeamView {
                            team: slot.team,
                            name: store.team(slot.team)?.name.clone(),
                            score: slot.score,
                        });
                    }
                    matches.push(MatchView {
                        id: match_id,
                        status: row.status,
                        teams: match_teams,
                        winner: row.winner,
                        next_match: row.next_match,
                        version: row.version,
                    });
                }

                groups.push(GroupView {
                    id: group_id,
                    members: group.members.clone(),
                    matches,
                });
            }

            stages.push(StageView {
                id: stage_id,
                kind: stage.kind,
                stage_order: stage.stage_order,
                advance_count: stage.advance_count,
                status: stage.status,
                version: stage.version,
                groups,
            });
        }

        Ok(Self {
            id: event.id,
            name: event.name.clone(),
            score_kind: event.score_kind,
            status: event.status,
            version: event.version,
            teams,
            stages,
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TeamView {
    pub id: TeamId,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StageView {
    pub id: StageId,
    pub kind: StageKind,
    pub stage_order: usize,
    pub advance_count: Option<usize>,
    pub status: StageStatus,
    pub version: Version,
    /// Round robin and single elimination stages have exactly one group.
    pub groups: Vec<GroupView>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GroupView {
    pub id: GroupId,
    /// Group members in seed order.
    pub members: Vec<TeamId>,
    pub matches: Vec<MatchView>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchView {
    pub id: MatchId,
    pub status: MatchStatus,
    pub teams: Vec<MatchTeamView>,
    pub winner: Option<TeamId>,
    /// The match this match's winner feeds. Empty on a stage final and on
    /// every round robin match.
    pub next_match: Option<MatchId>,
    pub version: Version,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchTeamView {
    pub team: TeamId,
    pub name: String,
    pub score: Option<i64>,
}
