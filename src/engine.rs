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

use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{
    error::EngineError,
    event::{Event, EventDetail, EventId, EventSpec, EventStatus, EventSummary},
    matches::{MatchId, ScoreOutcome},
    olympiad::{Olympiad, OlympiadCreated, OlympiadId, OlympiadSummary},
    pin::Pin,
    player::{Player, PlayerCreated, PlayerId, PlayerSummary},
    stage::{self, StageKindInfo},
    store::Store,
    team::{Team, TeamCreated, TeamId, TeamKind, TeamSpec, TeamSummary},
    version::Version,
};

/// The engine proper: owns the store and runs every operation through the
/// same discipline. A mutating call is checked in a fixed order, access
/// guard (existence, then pin), version precondition, then the domain work,
/// and the whole thing lands atomically or not at all.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Engine {
    #[serde(default)]
    store: Store,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access for standings, rankings, and tests. All writes go
    /// through the operations.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The static stage kind reference list.
    #[must_use]
    pub fn stage_kinds() -> Vec<StageKindInfo> {
        stage::stage_kinds()
    }

    /// Applies `op` to a draft of the store and only swaps the draft in
    /// when it succeeds, so a failed operation has no partial effects.
    fn transaction<T>(
        &mut self,
        op: impl FnOnce(&mut Store) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut draft = self.store.clone();
        let value = op(&mut draft)?;
        self.store = draft;
        Ok(value)
    }

    #[must_use]
    pub fn list_olympiads(&self) -> Vec<OlympiadSummary> {
        self.store
            .olympiads
            .values()
            .map(OlympiadSummary::from)
            .collect()
    }

    /// # Errors
    ///
    /// `OlympiadNotFound`.
    pub fn show_olympiad(&self, id: OlympiadId) -> Result<OlympiadSummary, EngineError> {
        Ok(OlympiadSummary::from(self.store.olympiad(id)?))
    }

    /// Creates an olympiad, generating a pin when the caller does not bring
    /// one. The reply is the only place the pin ever leaves the engine.
    ///
    /// # Errors
    ///
    /// `BadName` or `NameTaken`.
    pub fn create_olympiad(
        &mut self,
        name: &str,
        pin: Option<Pin>,
    ) -> Result<OlympiadCreated, EngineError> {
        self.transaction(|store| {
            let name = valid_name(name)?;
            store.olympiad_name_free(name, None)?;

            let pin = pin.unwrap_or_else(Pin::generate);
            let id = store.olympiads.allocate();
            store
                .olympiads
                .insert(id, Olympiad::new(id, name.to_string(), pin.clone()));

            info!("olympiad {id} '{name}' created");
            Ok(OlympiadCreated {
                id,
                version: Version::FIRST,
                pin,
            })
        })
    }

    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `StaleVersion`, `BadName`, or
    /// `NameTaken`.
    pub fn rename_olympiad(
        &mut self,
        id: OlympiadId,
        pin: &Pin,
        expected: Version,
        name: &str,
    ) -> Result<Version, EngineError> {
        self.transaction(|store| {
            store.authorize(id, pin)?;
            store.olympiad(id)?.version.require(expected)?;

            let name = valid_name(name)?;
            store.olympiad_name_free(name, Some(id))?;

            let olympiad = store.olympiad_mut(id)?;
            olympiad.name = name.to_string();
            let version = olympiad.touch();

            info!("olympiad {id} renamed to '{name}'");
            Ok(version)
        })
    }

    /// Deletes the olympiad and every player, team, and event under it.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, or `StaleVersion`.
    pub fn delete_olympiad(
        &mut self,
        id: OlympiadId,
        pin: &Pin,
        expected: Version,
    ) -> Result<(), EngineError> {
        self.transaction(|store| {
            store.authorize(id, pin)?;
            store.olympiad(id)?.version.require(expected)?;

            store.remove_olympiad_cascade(id);
            info!("olympiad {id} deleted");
            Ok(())
        })
    }

    /// Creates a player and their individual team of one in the same step.
    /// The version precondition names the olympiad, the owner of the
    /// roster.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `StaleVersion`, `BadName`, or
    /// `NameTaken`.
    pub fn create_player(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        expected: Version,
        name: &str,
    ) -> Result<PlayerCreated, EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            store.olympiad(olympiad)?.version.require(expected)?;

            let name = valid_name(name)?;
            store.player_name_free(olympiad, name, None)?;
            store.team_name_free(olympiad, name, None)?;

            let team_id = store.teams.allocate();
            let player_id = store.players.allocate();
            store.teams.insert(
                team_id,
                Team::new(
                    team_id,
                    olympiad,
                    name.to_string(),
                    TeamKind::Individual,
                    vec![player_id],
                ),
            );
            store.players.insert(
                player_id,
                Player::new(player_id, olympiad, name.to_string(), team_id),
            );
            let olympiad_version = store.olympiad_mut(olympiad)?.touch();

            info!("player {player_id} '{name}' joined olympiad {olympiad}");
            Ok(PlayerCreated {
                id: player_id,
                team: team_id,
                version: Version::FIRST,
                olympiad_version,
            })
        })
    }

    /// Renames a player and the individual team that mirrors them.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `PlayerNotFound`, `StaleVersion`,
    /// `BadName`, or `NameTaken`.
    pub fn rename_player(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        id: PlayerId,
        expected: Version,
        name: &str,
    ) -> Result<Version, EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            let team_id = {
                let player = store.player_in(olympiad, id)?;
                player.version.require(expected)?;
                player.team
            };

            let name = valid_name(name)?;
            store.player_name_free(olympiad, name, Some(id))?;
            store.team_name_free(olympiad, name, Some(team_id))?;

            let player = store.player_in_mut(olympiad, id)?;
            player.name = name.to_string();
            let version = player.touch();

            let team = store.team_in_mut(olympiad, team_id)?;
            team.name = name.to_string();
            team.touch();

            info!("player {id} renamed to '{name}'");
            Ok(version)
        })
    }

    /// Deletes a player, their individual team, and their squad membership.
    /// A player whose individual team or squad is enrolled in an event
    /// cannot be deleted.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `PlayerNotFound`, `StaleVersion`, or
    /// `PlayerEnrolled`.
    pub fn delete_player(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        id: PlayerId,
        expected: Version,
    ) -> Result<(), EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            let team_id = {
                let player = store.player_in(olympiad, id)?;
                player.version.require(expected)?;
                player.team
            };

            if store.enrollment_of(team_id).is_some() {
                return Err(EngineError::PlayerEnrolled(id));
            }
            let squad_id = store.squad_of(id).map(|squad| squad.id);
            if let Some(squad_id) = squad_id {
                if store.enrollment_of(squad_id).is_some() {
                    return Err(EngineError::PlayerEnrolled(id));
                }
                let squad = store.team_in_mut(olympiad, squad_id)?;
                squad.members.retain(|&member| member != id);
                squad.touch();
            }

            store.players.remove(id);
            store.teams.remove(team_id);

            info!("player {id} deleted from olympiad {olympiad}");
            Ok(())
        })
    }

    /// # Errors
    ///
    /// `OlympiadNotFound`.
    pub fn list_players(&self, olympiad: OlympiadId) -> Result<Vec<PlayerSummary>, EngineError> {
        self.store.olympiad(olympiad)?;
        Ok(self
            .store
            .players_of(olympiad)
            .map(|player| PlayerSummary {
                id: player.id,
                name: player.name.clone(),
                team: player.team,
                squad: self.store.squad_of(player.id).map(|squad| squad.id),
                version: player.version,
            })
            .collect())
    }

    /// Creates a squad from existing players.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `StaleVersion`, `BadName`,
    /// `NameTaken`, `SquadEmpty`, `PlayerNotFound`, `DuplicatePlayer`, or
    /// `AlreadyInSquad`.
    pub fn create_team(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        expected: Version,
        spec: &TeamSpec,
    ) -> Result<TeamCreated, EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            store.olympiad(olympiad)?.version.require(expected)?;

            let name = valid_name(&spec.name)?;
            store.team_name_free(olympiad, name, None)?;

            if spec.players.is_empty() {
                return Err(EngineError::SquadEmpty);
            }
            let mut seen = FxHashSet::default();
            for &player in &spec.players {
                store.player_in(olympiad, player)?;
                if !seen.insert(player) {
                    return Err(EngineError::DuplicatePlayer(player));
                }
                if store.squad_of(player).is_some() {
                    return Err(EngineError::AlreadyInSquad(player));
                }
            }

            let id = store.teams.allocate();
            store.teams.insert(
                id,
                Team::new(
                    id,
                    olympiad,
                    name.to_string(),
                    TeamKind::Squad,
                    spec.players.clone(),
                ),
            );
            let olympiad_version = store.olympiad_mut(olympiad)?.touch();

            info!("team {id} '{name}' created in olympiad {olympiad}");
            Ok(TeamCreated {
                id,
                version: Version::FIRST,
                olympiad_version,
            })
        })
    }

    /// Renames a squad. Individual teams follow their player and cannot be
    /// renamed directly.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `TeamNotFound`, `NotASquad`,
    /// `StaleVersion`, `BadName`, or `NameTaken`.
    pub fn rename_team(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        id: TeamId,
        expected: Version,
        name: &str,
    ) -> Result<Version, EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            {
                let team = store.team_in(olympiad, id)?;
                if team.kind != TeamKind::Squad {
                    return Err(EngineError::NotASquad(id));
                }
                team.version.require(expected)?;
            }

            let name = valid_name(name)?;
            store.team_name_free(olympiad, name, Some(id))?;

            let team = store.team_in_mut(olympiad, id)?;
            team.name = name.to_string();
            let version = team.touch();

            info!("team {id} renamed to '{name}'");
            Ok(version)
        })
    }

    /// Deletes a squad. Its players stay. A squad enrolled in an event
    /// cannot be deleted.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `TeamNotFound`, `NotASquad`,
    /// `StaleVersion`, or `TeamEnrolled`.
    pub fn delete_team(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        id: TeamId,
        expected: Version,
    ) -> Result<(), EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            {
                let team = store.team_in(olympiad, id)?;
                if team.kind != TeamKind::Squad {
                    return Err(EngineError::NotASquad(id));
                }
                team.version.require(expected)?;
            }

            if store.enrollment_of(id).is_some() {
                return Err(EngineError::TeamEnrolled(id));
            }
            store.teams.remove(id);

            info!("team {id} deleted from olympiad {olympiad}");
            Ok(())
        })
    }

    /// The squads of the olympiad. Individual teams stay out of the list:
    /// they mirror their player and are visible through `list_players`.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`.
    pub fn list_teams(&self, olympiad: OlympiadId) -> Result<Vec<TeamSummary>, EngineError> {
        self.store.olympiad(olympiad)?;
        Ok(self
            .store
            .teams_of(olympiad)
            .filter(|team| team.kind == TeamKind::Squad)
            .map(TeamSummary::from)
            .collect())
    }

    /// Creates an event and builds its first stage in the same transaction:
    /// stage rows for the whole plan, then the opening bracket with byes
    /// already propagated.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `StaleVersion`, `BadName`,
    /// `NameTaken`, `TeamNotFound`, or any `Validation` error of the spec.
    pub fn create_event(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        expected: Version,
        spec: &EventSpec,
    ) -> Result<EventDetail, EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            store.olympiad(olympiad)?.version.require(expected)?;

            let name = valid_name(&spec.name)?;
            store.event_name_free(olympiad, name, None)?;
            spec.validate()?;
            for &team in &spec.teams {
                store.team_in(olympiad, team)?;
            }

            let event_id = store.events.allocate();
            store.events.insert(
                event_id,
                Event::new(
                    event_id,
                    olympiad,
                    name.to_string(),
                    spec.score_kind,
                    spec.teams.clone(),
                ),
            );

            let mut first_stage = None;
            for (index, stage_spec) in spec.stages.iter().enumerate() {
                let stage_id = store.stages.allocate();
                store.stages.insert(
                    stage_id,
                    stage::Stage::new(
                        stage_id,
                        event_id,
                        stage_spec.kind,
                        index + 1,
                        stage_spec.advance_count,
                        stage_spec.group_sizes.clone(),
                    ),
                );
                if index == 0 {
                    first_stage = Some(stage_id);
                }
            }
            if let Some(stage_id) = first_stage {
                stage::start(store, stage_id, &spec.teams)?;
            }

            let olympiad_version = store.olympiad_mut(olympiad)?.touch();
            info!(
                "event {event_id} '{name}' created in olympiad {olympiad}, version {olympiad_version}"
            );

            let event = store.event(event_id)?;
            EventDetail::assemble(store, event)
        })
    }

    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `EventNotFound`, `StaleVersion`,
    /// `BadName`, or `NameTaken`.
    pub fn rename_event(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        id: EventId,
        expected: Version,
        name: &str,
    ) -> Result<Version, EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            store.event_in(olympiad, id)?.version.require(expected)?;

            let name = valid_name(name)?;
            store.event_name_free(olympiad, name, Some(id))?;

            let event = store.event_in_mut(olympiad, id)?;
            event.name = name.to_string();
            let version = event.touch();

            info!("event {id} renamed to '{name}'");
            Ok(version)
        })
    }

    /// Deletes an event with all its stages, groups, and matches, whatever
    /// state they are in.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `EventNotFound`, or `StaleVersion`.
    pub fn delete_event(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        id: EventId,
        expected: Version,
    ) -> Result<(), EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            store.event_in(olympiad, id)?.version.require(expected)?;

            store.remove_event_cascade(id);
            info!("event {id} deleted from olympiad {olympiad}");
            Ok(())
        })
    }

    /// # Errors
    ///
    /// `OlympiadNotFound`.
    pub fn list_events(&self, olympiad: OlympiadId) -> Result<Vec<EventSummary>, EngineError> {
        self.store.olympiad(olympiad)?;
        Ok(self
            .store
            .events_of(olympiad)
            .map(EventSummary::from)
            .collect())
    }

    /// The full stage/group/match tree of one event, ready to render.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound` or `EventNotFound`.
    pub fn event_detail(
        &self,
        olympiad: OlympiadId,
        id: EventId,
    ) -> Result<EventDetail, EngineError> {
        self.store.olympiad(olympiad)?;
        let event = self.store.event_in(olympiad, id)?;
        EventDetail::assemble(&self.store, event)
    }

    /// Records a match result and drives everything that follows from it:
    /// winner propagation along the bracket link, stage settlement, feeding
    /// the next stage, and finishing the event after the last final. One
    /// transaction; a conflict or validation failure changes nothing.
    ///
    /// Resubmitting the exact result of a finished match (with the current
    /// version) succeeds without changing or bumping anything, so a client
    /// that lost the reply can safely retry.
    ///
    /// # Errors
    ///
    /// `OlympiadNotFound`, `WrongPin`, `MatchNotFound`, `StaleVersion`,
    /// `ResultChanged`, or a `Validation` error for a malformed result.
    pub fn submit_score(
        &mut self,
        olympiad: OlympiadId,
        pin: &Pin,
        match_id: MatchId,
        expected: Version,
        scores: &[(TeamId, i64)],
    ) -> Result<ScoreOutcome, EngineError> {
        self.transaction(|store| {
            store.authorize(olympiad, pin)?;
            store.match_in(olympiad, match_id)?.version.require(expected)?;

            let (stage_id, event_id, score_kind) = {
                let row = store.match_row(match_id)?;
                let group = store.group(row.group)?;
                let stage = store.stage(group.stage)?;
                let event = store.event(stage.event)?;
                (stage.id, event.id, event.score_kind)
            };

            let (changed, match_version, winner, next) = {
                let row = store.match_row_mut(match_id)?;
                let changed = row.record(scores, score_kind)?;
                let version = if changed { row.touch() } else { row.version };
                (changed, version, row.winner, row.next_match)
            };

            if changed {
                if let (Some(winner), Some(next)) = (winner, next) {
                    let target = store.match_row_mut(next)?;
                    target.fill(winner);
                    target.touch();
                }

                stage::settle(store, stage_id)?;

                // When settlement finished the event, that was its one bump
                // for this write. Otherwise a first result moves it out of
                // registration.
                let event = store.event_mut(event_id)?;
                if event.status == EventStatus::Registration {
                    event.status = EventStatus::Started;
                    event.touch();
                }

                info!("match {match_id} finished in event {event_id}");
            } else {
                debug!("match {match_id}: identical result resubmitted");
            }

            Ok(ScoreOutcome {
                match_id,
                changed,
                match_version,
                winner,
                stage_status: store.stage(stage_id)?.status,
                event_status: store.event(event_id)?.status,
            })
        })
    }
}

fn valid_name(name: &str) -> Result<&str, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::BadName("may not be empty"));
    }
    if name.chars().count() > 64 {
        return Err(EngineError::BadName("longer than 64 characters"));
    }
    if name.chars().any(char::is_control) {
        return Err(EngineError::BadName("contains control characters"));
    }
    Ok(name)
}
