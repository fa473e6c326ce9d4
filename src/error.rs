use std::fmt;

use thiserror::Error;

use crate::{
    event::EventId,
    matches::MatchId,
    olympiad::OlympiadId,
    player::PlayerId,
    stage::{GroupId, StageId},
    team::TeamId,
    version::Version,
};

/// Everything that can go wrong with an engine operation.
///
/// Every variant maps onto one of four [`ErrorKind`]s so callers can react
/// without matching on the exact variant.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EngineError {
    #[error("olympiad {0} not found")]
    OlympiadNotFound(OlympiadId),
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("team {0} not found")]
    TeamNotFound(TeamId),
    #[error("event {0} not found")]
    EventNotFound(EventId),
    #[error("stage {0} not found")]
    StageNotFound(StageId),
    #[error("group {0} not found")]
    GroupNotFound(GroupId),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    #[error("wrong pin")]
    WrongPin,

    #[error("stale version: stored {stored}, the request expected {expected}")]
    StaleVersion { stored: Version, expected: Version },
    #[error("the name '{0}' is already taken")]
    NameTaken(String),
    #[error("team {0} is enrolled in an event")]
    TeamEnrolled(TeamId),
    #[error("player {0} is enrolled in an event")]
    PlayerEnrolled(PlayerId),
    #[error("match {0} already has a different result")]
    ResultChanged(MatchId),

    #[error("a pin is exactly four digits")]
    BadPin,
    #[error("invalid name: {0}")]
    BadName(&'static str),
    #[error("a stage needs at least two teams, got {0}")]
    TooFewTeams(usize),
    #[error("team {0} appears more than once")]
    DuplicateTeam(TeamId),
    #[error("player {0} appears more than once")]
    DuplicatePlayer(PlayerId),
    #[error("an event needs at least one stage")]
    NoStages,
    #[error("stage {stage}: only the final stage may omit the advance count")]
    AdvanceCountMissing { stage: usize },
    #[error("the final stage must not have an advance count")]
    AdvanceCountOnFinal,
    #[error("stage {stage}: cannot advance {advance} of {entrants} entrants")]
    AdvanceCountOutOfRange {
        stage: usize,
        advance: usize,
        entrants: usize,
    },
    #[error("stage {stage}: a groups stage needs group sizes")]
    GroupSizesRequired { stage: usize },
    #[error("stage {stage}: group sizes are only for groups stages")]
    GroupSizesForbidden { stage: usize },
    #[error("stage {stage}: group sizes must each be at least two and sum to {entrants}")]
    BadGroupSizes { stage: usize, entrants: usize },
    #[error("a squad needs at least one player")]
    SquadEmpty,
    #[error("team {0} is not a squad")]
    NotASquad(TeamId),
    #[error("player {0} already belongs to a squad")]
    AlreadyInSquad(PlayerId),
    #[error("match {0} does not have two teams yet")]
    MatchNotReady(MatchId),
    #[error("team {team} is not in match {id}")]
    NotAnOccupant { id: MatchId, team: TeamId },
    #[error("a result scores each team in the match exactly once")]
    ScoresMalformed,
    #[error("an outcome result needs exactly one winner flag set to 1, the other 0")]
    BadOutcome,
    #[error("points scores cannot tie")]
    TiedScore,
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OlympiadNotFound(_)
            | Self::PlayerNotFound(_)
            | Self::TeamNotFound(_)
            | Self::EventNotFound(_)
            | Self::StageNotFound(_)
            | Self::GroupNotFound(_)
            | Self::MatchNotFound(_) => ErrorKind::NotFound,
            Self::WrongPin => ErrorKind::Unauthorized,
            Self::StaleVersion { .. }
            | Self::NameTaken(_)
            | Self::TeamEnrolled(_)
            | Self::PlayerEnrolled(_)
            | Self::ResultChanged(_) => ErrorKind::Conflict,
            Self::BadPin
            | Self::BadName(_)
            | Self::TooFewTeams(_)
            | Self::DuplicateTeam(_)
            | Self::DuplicatePlayer(_)
            | Self::NoStages
            | Self::AdvanceCountMissing { .. }
            | Self::AdvanceCountOnFinal
            | Self::AdvanceCountOutOfRange { .. }
            | Self::GroupSizesRequired { .. }
            | Self::GroupSizesForbidden { .. }
            | Self::BadGroupSizes { .. }
            | Self::SquadEmpty
            | Self::NotASquad(_)
            | Self::AlreadyInSquad(_)
            | Self::MatchNotReady(_)
            | Self::NotAnOccupant { .. }
            | Self::ScoresMalformed
            | Self::BadOutcome
            | Self::TiedScore => ErrorKind::Validation,
        }
    }
}

/// The four answer classes of the protocol: a client switches on the kind,
/// the message is for humans.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Conflict,
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
        }
    }
}
