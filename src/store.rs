// This file is part of olympiad.
//
// olympiad is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// olympiad is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{
    error::EngineError,
    event::{Event, EventId},
    matches::{Match, MatchId},
    olympiad::{Olympiad, OlympiadId},
    pin::Pin,
    player::{Player, PlayerId},
    stage::{Group, GroupId, Stage, StageId},
    team::{Team, TeamId, TeamKind},
};

/// One entity table: rows keyed by a typed id, ids handed out in insertion
/// order and never reused.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Table<K: Ord, V> {
    next_id: u64,
    rows: BTreeMap<K, V>,
}

impl<K: Copy + Ord + From<u64>, V> Table<K, V> {
    /// Reserves the next id. Pair with [`Table::insert`]; the split lets a
    /// row embed its own id, and a batch reserve ids that link to each
    /// other before any row exists.
    pub fn allocate(&mut self) -> K {
        self.next_id += 1;
        K::from(self.next_id)
    }

    pub fn insert(&mut self, id: K, row: V) {
        self.rows.insert(id, row);
    }

    #[must_use]
    pub fn get(&self, id: K) -> Option<&V> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: K) -> Option<&mut V> {
        self.rows.get_mut(&id)
    }

    pub fn remove(&mut self, id: K) -> Option<V> {
        self.rows.remove(&id)
    }

    pub fn retain(&mut self, keep: impl FnMut(&K, &mut V) -> bool) {
        self.rows.retain(keep);
    }

    /// Rows in id order.
    pub fn rows(&self) -> impl Iterator<Item = (K, &V)> {
        self.rows.iter().map(|(&id, row)| (id, row))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<K: Ord, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

/// The whole data set: seven entity tables with typed cross references.
/// Mutating operations work on a clone and swap it in whole, so a failed
/// operation leaves nothing behind.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Store {
    #[serde(default)]
    pub olympiads: Table<OlympiadId, Olympiad>,
    #[serde(default)]
    pub players: Table<PlayerId, Player>,
    #[serde(default)]
    pub teams: Table<TeamId, Team>,
    #[serde(default)]
    pub events: Table<EventId, Event>,
    #[serde(default)]
    pub stages: Table<StageId, Stage>,
    #[serde(default)]
    pub groups: Table<GroupId, Group>,
    #[serde(default)]
    pub matches: Table<MatchId, Match>,
}

impl Store {
    /// # Errors
    ///
    /// `OlympiadNotFound`.
    pub fn olympiad(&self, id: OlympiadId) -> Result<&Olympiad, EngineError> {
        self.olympiads
            .get(id)
            .ok_or(EngineError::OlympiadNotFound(id))
    }

    /// # Errors
    ///
    /// `OlympiadNotFound`.
    pub fn olympiad_mut(&mut self, id: OlympiadId) -> Result<&mut Olympiad, EngineError> {
        self.olympiads
            .get_mut(id)
            .ok_or(EngineError::OlympiadNotFound(id))
    }

    /// # Errors
    ///
    /// `TeamNotFound`.
    pub fn team(&self, id: TeamId) -> Result<&Team, EngineError> {
        self.teams.get(id).ok_or(EngineError::TeamNotFound(id))
    }

    /// # Errors
    ///
    /// `EventNotFound`.
    pub fn event(&self, id: EventId) -> Result<&Event, EngineError> {
        self.events.get(id).ok_or(EngineError::EventNotFound(id))
    }

    /// # Errors
    ///
    /// `EventNotFound`.
    pub fn event_mut(&mut self, id: EventId) -> Result<&mut Event, EngineError> {
        self.events
            .get_mut(id)
            .ok_or(EngineError::EventNotFound(id))
    }

    /// # Errors
    ///
    /// `StageNotFound`.
    pub fn stage(&self, id: StageId) -> Result<&Stage, EngineError> {
        self.stages.get(id).ok_or(EngineError::StageNotFound(id))
    }

    /// # Errors
    ///
    /// `StageNotFound`.
    pub fn stage_mut(&mut self, id: StageId) -> Result<&mut Stage, EngineError> {
        self.stages
            .get_mut(id)
            .ok_or(EngineError::StageNotFound(id))
    }

    /// # Errors
    ///
    /// `GroupNotFound`.
    pub fn group(&self, id: GroupId) -> Result<&Group, EngineError> {
        self.groups.get(id).ok_or(EngineError::GroupNotFound(id))
    }

    /// # Errors
    ///
    /// `MatchNotFound`.
    pub fn match_row(&self, id: MatchId) -> Result<&Match, EngineError> {
        self.matches.get(id).ok_or(EngineError::MatchNotFound(id))
    }

    /// # Errors
    ///
    /// `MatchNotFound`.
    pub fn match_row_mut(&mut self, id: MatchId) -> Result<&mut Match, EngineError> {
        self.matches
            .get_mut(id)
            .ok_or(EngineError::MatchNotFound(id))
    }

    /// Checks the pin for olympiad `id`, existence first: a missing olympiad
    /// is `NotFound` before it is `Unauthorized`.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, then `WrongPin`.
    pub fn authorize(&self, id: OlympiadId, pin: &Pin) -> Result<(), EngineError> {
        let olympiad = self.olympiad(id)?;
        if olympiad.pin.matches(pin) {
            Ok(())
        } else {
            Err(EngineError::WrongPin)
        }
    }

    /// A player of this olympiad; a player of a different olympiad is
    /// `NotFound`, never revealed.
    ///
    /// # Errors
    ///
    /// `PlayerNotFound`.
    pub fn player_in(&self, olympiad: OlympiadId, id: PlayerId) -> Result<&Player, EngineError> {
        match self.players.get(id) {
            Some(player) if player.olympiad == olympiad => Ok(player),
            _ => Err(EngineError::PlayerNotFound(id)),
        }
    }

    /// # Errors
    ///
    /// `PlayerNotFound`.
    pub fn player_in_mut(
        &mut self,
        olympiad: OlympiadId,
        id: PlayerId,
    ) -> Result<&mut Player, EngineError> {
        match self.players.get_mut(id) {
            Some(player) if player.olympiad == olympiad => Ok(player),
            _ => Err(EngineError::PlayerNotFound(id)),
        }
    }

    /// # Errors
    ///
    /// `TeamNotFound`.
    pub fn team_in(&self, olympiad: OlympiadId, id: TeamId) -> Result<&Team, EngineError> {
        match self.teams.get(id) {
            Some(team) if team.olympiad == olympiad => Ok(team),
            _ => Err(EngineError::TeamNotFound(id)),
        }
    }

    /// # Errors
    ///
    /// `TeamNotFound`.
    pub fn team_in_mut(
        &mut self,
        olympiad: OlympiadId,
        id: TeamId,
    ) -> Result<&mut Team, EngineError> {
        match self.teams.get_mut(id) {
            Some(team) if team.olympiad == olympiad => Ok(team),
            _ => Err(EngineError::TeamNotFound(id)),
        }
    }

    /// # Errors
    ///
    /// `EventNotFound`.
    pub fn event_in(&self, olympiad: OlympiadId, id: EventId) -> Result<&Event, EngineError> {
        match self.events.get(id) {
            Some(event) if event.olympiad == olympiad => Ok(event),
            _ => Err(EngineError::EventNotFound(id)),
        }
    }

    /// # Errors
    ///
    /// `EventNotFound`.
    pub fn event_in_mut(
        &mut self,
        olympiad: OlympiadId,
        id: EventId,
    ) -> Result<&mut Event, EngineError> {
        match self.events.get_mut(id) {
            Some(event) if event.olympiad == olympiad => Ok(event),
            _ => Err(EngineError::EventNotFound(id)),
        }
    }

    /// A match of this olympiad, resolved through its group, stage, and
    /// event.
    ///
    /// # Errors
    ///
    /// `MatchNotFound`, also for matches under some other olympiad.
    pub fn match_in(&self, olympiad: OlympiadId, id: MatchId) -> Result<&Match, EngineError> {
        let row = self.match_row(id)?;
        let group = self.group(row.group)?;
        let stage = self.stage(group.stage)?;
        let event = self.events.get(stage.event);

        match event {
            Some(event) if event.olympiad == olympiad => Ok(row),
            _ => Err(EngineError::MatchNotFound(id)),
        }
    }

    pub fn players_of(&self, olympiad: OlympiadId) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(move |player| player.olympiad == olympiad)
    }

    pub fn teams_of(&self, olympiad: OlympiadId) -> impl Iterator<Item = &Team> {
        self.teams
            .values()
            .filter(move |team| team.olympiad == olympiad)
    }

    pub fn events_of(&self, olympiad: OlympiadId) -> impl Iterator<Item = &Event> {
        self.events
            .values()
            .filter(move |event| event.olympiad == olympiad)
    }

    /// The event's stages in play order.
    #[must_use]
    pub fn stages_of(&self, event: EventId) -> Vec<StageId> {
        let mut stages: Vec<(usize, StageId)> = self
            .stages
            .rows()
            .filter(|(_, stage)| stage.event == event)
            .map(|(id, stage)| (stage.stage_order, id))
            .collect();
        stages.sort_unstable();
        stages.into_iter().map(|(_, id)| id).collect()
    }

    #[must_use]
    pub fn stage_by_order(&self, event: EventId, order: usize) -> Option<StageId> {
        self.stages
            .rows()
            .find(|(_, stage)| stage.event == event && stage.stage_order == order)
            .map(|(id, _)| id)
    }

    #[must_use]
    pub fn groups_of(&self, stage: StageId) -> Vec<GroupId> {
        self.groups
            .rows()
            .filter(|(_, group)| group.stage == stage)
            .map(|(id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn matches_of_group(&self, group: GroupId) -> Vec<MatchId> {
        self.matches
            .rows()
            .filter(|(_, row)| row.group == group)
            .map(|(id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn matches_of_stage(&self, stage: StageId) -> Vec<MatchId> {
        let groups: FxHashSet<GroupId> = self.groups_of(stage).into_iter().collect();
        self.matches
            .rows()
            .filter(|(_, row)| groups.contains(&row.group))
            .map(|(id, _)| id)
            .collect()
    }

    /// # Errors
    ///
    /// `NameTaken`. Olympiad names are unique across the store.
    pub fn olympiad_name_free(
        &self,
        name: &str,
        exclude: Option<OlympiadId>,
    ) -> Result<(), EngineError> {
        let taken = self
            .olympiads
            .values()
            .any(|olympiad| olympiad.name == name && Some(olympiad.id) != exclude);
        if taken {
            Err(EngineError::NameTaken(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// # Errors
    ///
    /// `NameTaken` within the olympiad.
    pub fn player_name_free(
        &self,
        olympiad: OlympiadId,
        name: &str,
        exclude: Option<PlayerId>,
    ) -> Result<(), EngineError> {
        let taken = self
            .players_of(olympiad)
            .any(|player| player.name == name && Some(player.id) != exclude);
        if taken {
            Err(EngineError::NameTaken(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// # Errors
    ///
    /// `NameTaken` within the olympiad.
    pub fn team_name_free(
        &self,
        olympiad: OlympiadId,
        name: &str,
        exclude: Option<TeamId>,
    ) -> Result<(), EngineError> {
        let taken = self
            .teams_of(olympiad)
            .any(|team| team.name == name && Some(team.id) != exclude);
        if taken {
            Err(EngineError::NameTaken(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// # Errors
    ///
    /// `NameTaken` within the olympiad.
    pub fn event_name_free(
        &self,
        olympiad: OlympiadId,
        name: &str,
        exclude: Option<EventId>,
    ) -> Result<(), EngineError> {
        let taken = self
            .events_of(olympiad)
            .any(|event| event.name == name && Some(event.id) != exclude);
        if taken {
            Err(EngineError::NameTaken(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// The first event this team is enrolled in, finished or not.
    #[must_use]
    pub fn enrollment_of(&self, team: TeamId) -> Option<EventId> {
        self.events
            .values()
            .find(|event| event.seeds.contains(&team))
            .map(|event| event.id)
    }

    /// The squad a player belongs to, if any. Their individual team does
    /// not count.
    #[must_use]
    pub fn squad_of(&self, player: PlayerId) -> Option<&Team> {
        self.teams
            .values()
            .find(|team| team.kind == TeamKind::Squad && team.members.contains(&player))
    }

    /// Deletes an event with its stages, groups, and matches. Enrolled
    /// teams are left alone.
    pub fn remove_event_cascade(&mut self, event: EventId) {
        let stages: FxHashSet<StageId> = self.stages_of(event).into_iter().collect();
        let groups: FxHashSet<GroupId> = self
            .groups
            .rows()
            .filter(|(_, group)| stages.contains(&group.stage))
            .map(|(id, _)| id)
            .collect();

        self.matches.retain(|_, row| !groups.contains(&row.group));
        self.groups.retain(|id, _| !groups.contains(id));
        self.stages.retain(|id, _| !stages.contains(id));
        self.events.remove(event);
    }

    /// Deletes an olympiad and everything it owns.
    pub fn remove_olympiad_cascade(&mut self, olympiad: OlympiadId) {
        let events: Vec<EventId> = self.events_of(olympiad).map(|event| event.id).collect();
        for event in events {
            self.remove_event_cascade(event);
        }

        self.players.retain(|_, player| player.olympiad != olympiad);
        self.teams.retain(|_, team| team.olympiad != olympiad);
        self.olympiads.remove(olympiad);
    }
}
