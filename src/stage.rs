use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    bracket,
    error::EngineError,
    event::{EventId, EventStatus},
    matches::{Match, MatchId, MatchStatus},
    store::Store,
    team::TeamId,
    version::Version,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct StageId(pub u64);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for StageId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Ok(Self(value.parse()?))
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GroupId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Groups,
    RoundRobin,
    SingleElimination,
}

impl StageKind {
    pub const ALL: [Self; 3] = [Self::Groups, Self::RoundRobin, Self::SingleElimination];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Groups => "Groups",
            Self::RoundRobin => "Round robin",
            Self::SingleElimination => "Single elimination",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Groups => write!(f, "groups"),
            Self::RoundRobin => write!(f, "round_robin"),
            Self::SingleElimination => write!(f, "single_elimination"),
        }
    }
}

/// One entry of the static stage kind reference list served to clients.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StageKindInfo {
    pub kind: StageKind,
    pub label: String,
}

#[must_use]
pub fn stage_kinds() -> Vec<StageKindInfo> {
    StageKind::ALL
        .iter()
        .map(|&kind| StageKindInfo {
            kind,
            label: kind.label().to_string(),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Created with the event, waiting to be fed by the previous stage.
    Pending,
    /// Bracket built, matches underway.
    Running,
    /// All matches finished and the ranking settled.
    Finished,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// One phase of an event. Stages are created up front with the event, in
/// order; each one is built and started the moment the previous stage hands
/// its qualifiers over.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Stage {
    pub id: StageId,
    pub event: EventId,
    pub kind: StageKind,
    /// Position in the event, contiguous from 1.
    pub stage_order: usize,
    /// How many ranked participants move on. Empty on the final stage.
    pub advance_count: Option<usize>,
    /// Group sizes for a groups stage, fixed at event creation.
    pub group_sizes: Option<Vec<usize>>,
    pub status: StageStatus,
    /// The stage's participants in seed order. Empty until the stage starts.
    pub entrants: Vec<TeamId>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stage {
    #[must_use]
    pub fn new(
        id: StageId,
        event: EventId,
        kind: StageKind,
        stage_order: usize,
        advance_count: Option<usize>,
        group_sizes: Option<Vec<usize>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            event,
            kind,
            stage_order,
            advance_count,
            group_sizes,
            status: StageStatus::Pending,
            entrants: Vec::new(),
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

/// A set of matches over a subset of a stage's entrants. Round robin and
/// single elimination stages hold exactly one group spanning everyone.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub stage: StageId,
    /// Members in seed order, strongest first.
    pub members: Vec<TeamId>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    #[must_use]
    pub fn new(id: GroupId, stage: StageId, members: Vec<TeamId>) -> Self {
        let now = Utc::now();
        Self {
            id,
            stage,
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

/// Builds the stage's groups and matches from its seeded entrants and marks
/// it running. Bye winners are propagated into the next round before this
/// returns, so a fresh bracket is already as far along as it can be.
///
/// Versions are untouched: for stage one this runs inside event creation,
/// and for later stages the orchestrator bumps the stage it starts.
pub(crate) fn start(
    store: &mut Store,
    stage_id: StageId,
    entrants: &[TeamId],
) -> Result<(), EngineError> {
    let stage = store.stage(stage_id)?;
    let kind = stage.kind;
    let stage_order = stage.stage_order;
    let sizes = stage.group_sizes.clone();

    let parts: Vec<(Vec<TeamId>, bracket::Blueprint)> = match kind {
        StageKind::SingleElimination => {
            vec![(entrants.to_vec(), bracket::single_elimination(entrants)?)]
        }
        StageKind::RoundRobin => vec![(entrants.to_vec(), bracket::round_robin(entrants)?)],
        StageKind::Groups => {
            let sizes = sizes.ok_or(EngineError::GroupSizesRequired { stage: stage_order })?;
            let partition = bracket::deal_groups(entrants, &sizes);
            let blueprints = bracket::groups(&partition)?;
            partition.into_iter().zip(blueprints).collect()
        }
    };

    for (members, blueprint) in parts {
        let group_id = store.groups.allocate();
        store
            .groups
            .insert(group_id, Group::new(group_id, stage_id, members));

        let ids: Vec<_> = blueprint
            .matches
            .iter()
            .map(|_| store.matches.allocate())
            .collect();

        for (planned, &id) in blueprint.matches.iter().zip(&ids) {
            let next = planned.next.map(|index| ids[index]);
            store
                .matches
                .insert(id, Match::new(id, group_id, &planned.teams, next));
        }

        // Hand the bye winners on. A later round match fed by two byes comes
        // out of this running.
        for &id in &ids {
            let row = store.match_row(id)?;
            if let (Some(winner), Some(next)) = (row.winner, row.next_match) {
                store.match_row_mut(next)?.fill(winner);
            }
        }
    }

    let stage = store.stage_mut(stage_id)?;
    stage.entrants = entrants.to_vec();
    stage.status = StageStatus::Running;

    Ok(())
}

/// Orchestrates the end of a stage: once every match is finished, settle the
/// ranking and either feed the top `advance_count` into the next stage or,
/// on the final stage, finish the event.
pub(crate) fn settle(store: &mut Store, stage_id: StageId) -> Result<(), EngineError> {
    let matches = store.matches_of_stage(stage_id);
    let mut all_finished = !matches.is_empty();
    for id in matches {
        if store.match_row(id)?.status != MatchStatus::Finished {
            all_finished = false;
            break;
        }
    }
    if !all_finished {
        return Ok(());
    }

    let ranking = rank(store, stage_id)?;
    let (event_id, advance_count, stage_order) = {
        let stage = store.stage_mut(stage_id)?;
        stage.status = StageStatus::Finished;
        stage.touch();
        (stage.event, stage.advance_count, stage.stage_order)
    };

    if let Some(count) = advance_count {
        let qualified: Vec<TeamId> = ranking.into_iter().take(count).collect();
        let next_id = store
            .stage_by_order(event_id, stage_order + 1)
            .ok_or(EngineError::EventNotFound(event_id))?;
        start(store, next_id, &qualified)?;
        store.stage_mut(next_id)?.touch();
    } else {
        let event = store.event_mut(event_id)?;
        event.status = EventStatus::Finished;
        event.touch();
    }

    Ok(())
}

/// Ranks a stage's entrants from its match results so far.
///
/// Round robin groups order by wins, then score differential, then original
/// seed. A groups stage interleaves its group rankings: all winners first
/// (by seed), then all runners up, and so on. Single elimination orders the
/// champion first and everyone else by how deep they got, later eliminations
/// ranking higher, seed breaking ties within a round.
///
/// # Errors
///
/// `NotFound` when the stage or one of its rows is missing.
pub fn rank(store: &Store, stage_id: StageId) -> Result<Vec<TeamId>, EngineError> {
    let stage = store.stage(stage_id)?;
    let groups = store.groups_of(stage_id);

    match stage.kind {
        StageKind::SingleElimination => {
            let group = groups
                .first()
                .copied()
                .ok_or(EngineError::StageNotFound(stage_id))?;
            rank_elimination(store, group)
        }
        StageKind::RoundRobin => {
            let group = groups
                .first()
                .copied()
                .ok_or(EngineError::StageNotFound(stage_id))?;
            rank_group(store, group)
        }
        StageKind::Groups => {
            let mut ranked_groups = Vec::with_capacity(groups.len());
            for group in groups {
                ranked_groups.push(rank_group(store, group)?);
            }

            let seed_of: FxHashMap<TeamId, usize> = stage
                .entrants
                .iter()
                .enumerate()
                .map(|(seed, &team)| (team, seed))
                .collect();

            let places = ranked_groups.iter().map(Vec::len).max().unwrap_or(0);
            let mut ranking = Vec::with_capacity(stage.entrants.len());
            for place in 0..places {
                let mut tier: Vec<TeamId> = ranked_groups
                    .iter()
                    .filter_map(|group| group.get(place).copied())
                    .collect();
                tier.sort_by_key(|team| seed_of.get(team).copied().unwrap_or(usize::MAX));
                ranking.extend(tier);
            }

            Ok(ranking)
        }
    }
}

struct Tally {
    team: TeamId,
    seed: usize,
    wins: u64,
    diff: i64,
}

fn rank_group(store: &Store, group_id: GroupId) -> Result<Vec<TeamId>, EngineError> {
    let group = store.group(group_id)?;
    let mut tallies: Vec<Tally> = group
        .members
        .iter()
        .enumerate()
        .map(|(seed, &team)| Tally {
            team,
            seed,
            wins: 0,
            diff: 0,
        })
        .collect();

    for id in store.matches_of_group(group_id) {
        let row = store.match_row(id)?;
        if row.status != MatchStatus::Finished {
            continue;
        }
        if let [first, second] = row.slots.as_slice()
            && let (Some(a), Some(b)) = (first.score, second.score)
        {
            // Scores span the whole i64 range, so the differential
            // saturates.
            for tally in &mut tallies {
                if tally.team == first.team {
                    tally.diff = tally.diff.saturating_add(a.saturating_sub(b));
                    if a > b {
                        tally.wins += 1;
                    }
                } else if tally.team == second.team {
                    tally.diff = tally.diff.saturating_add(b.saturating_sub(a));
                    if b > a {
                        tally.wins += 1;
                    }
                }
            }
        }
    }

    tallies.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then_with(|| b.diff.cmp(&a.diff))
            .then_with(|| a.seed.cmp(&b.seed))
    });

    Ok(tallies.into_iter().map(|tally| tally.team).collect())
}

fn rank_elimination(store: &Store, group_id: GroupId) -> Result<Vec<TeamId>, EngineError> {
    let group = store.group(group_id)?;
    let seed_of: FxHashMap<TeamId, usize> = group
        .members
        .iter()
        .enumerate()
        .map(|(seed, &team)| (team, seed))
        .collect();

    let ids = store.matches_of_group(group_id);
    let mut rows: FxHashMap<MatchId, &Match> = FxHashMap::default();
    for id in &ids {
        rows.insert(*id, store.match_row(*id)?);
    }

    // keyed by distance from the final: the champion at 0, the final's loser
    // at 1, semifinal losers at 2, and so on
    let mut placed: Vec<(usize, usize, TeamId)> = Vec::with_capacity(group.members.len());
    for row in rows.values() {
        if row.status != MatchStatus::Finished {
            continue;
        }
        let Some(winner) = row.winner else {
            continue;
        };

        if row.next_match.is_none() {
            let seed = seed_of.get(&winner).copied().unwrap_or(usize::MAX);
            placed.push((0, seed, winner));
        }

        if let Some(loser) = row.occupants().iter().find(|&&team| team != winner) {
            let depth = depth_of(&rows, row);
            let seed = seed_of.get(loser).copied().unwrap_or(usize::MAX);
            placed.push((depth + 1, seed, *loser));
        }
    }

    placed.sort_unstable();
    Ok(placed.into_iter().map(|(_, _, team)| team).collect())
}

fn depth_of(rows: &FxHashMap<MatchId, &Match>, start: &Match) -> usize {
    let mut depth = 0;
    let mut current = start;

    while let Some(next) = current.next_match {
        let Some(row) = rows.get(&next) else {
            break;
        };
        current = row;
        depth += 1;
        if depth > rows.len() {
            break;
        }
    }

    depth
}
