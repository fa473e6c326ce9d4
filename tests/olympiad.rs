use std::str::FromStr;

use rustc_hash::FxHashSet;

use olympiad::{
    engine::Engine,
    error::{EngineError, ErrorKind},
    event::{EventId, EventSpec, EventStatus, ScoreKind, StageSpec},
    matches::{MatchStatus, ScoreOutcome},
    olympiad::OlympiadId,
    pin::Pin,
    player::PlayerId,
    stage::{self, StageKind, StageStatus},
    team::{TeamId, TeamKind, TeamSpec},
    version::Version,
};

const NAMES: [&str; 8] = [
    "Ada", "Brigid", "Cara", "Dagny", "Edda", "Freya", "Greta", "Hilda",
];

/// An olympiad with `count` players ready to compete, one team each.
fn roster(count: usize) -> anyhow::Result<(Engine, OlympiadId, Pin, Vec<TeamId>)> {
    let mut engine = Engine::new();
    let created = engine.create_olympiad("Midsummer Games", None)?;

    let mut teams = Vec::new();
    for (version, name) in (1u64..).zip(NAMES.iter().take(count)) {
        let player = engine.create_player(created.id, &created.pin, Version(version), name)?;
        teams.push(player.team);
    }

    Ok((engine, created.id, created.pin, teams))
}

fn stage_spec(kind: StageKind, advance_count: Option<usize>) -> StageSpec {
    StageSpec {
        kind,
        advance_count,
        group_sizes: None,
    }
}

fn event_spec(
    name: &str,
    score_kind: ScoreKind,
    teams: &[TeamId],
    stages: Vec<StageSpec>,
) -> EventSpec {
    EventSpec {
        name: name.to_string(),
        score_kind,
        teams: teams.to_vec(),
        stages,
    }
}

fn outcome(winner: TeamId, loser: TeamId) -> Vec<(TeamId, i64)> {
    vec![(winner, 1), (loser, 0)]
}

/// Finds the open match between exactly these teams and submits the result
/// at the version currently on record.
fn beat(
    engine: &mut Engine,
    olympiad: OlympiadId,
    pin: &Pin,
    event: EventId,
    scores: &[(TeamId, i64)],
) -> anyhow::Result<ScoreOutcome> {
    let sides: FxHashSet<TeamId> = scores.iter().map(|&(team, _)| team).collect();
    let detail = engine.event_detail(olympiad, event)?;

    for stage in &detail.stages {
        for group in &stage.groups {
            for row in &group.matches {
                let occupants: FxHashSet<TeamId> = row.teams.iter().map(|slot| slot.team).collect();
                if row.status != MatchStatus::Finished && occupants == sides {
                    return Ok(engine.submit_score(olympiad, pin, row.id, row.version, scores)?);
                }
            }
        }
    }

    anyhow::bail!("no open match between those teams")
}

#[test]
fn five_team_knockout_runs_to_a_champion() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(5)?;
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Outcome,
        &teams,
        vec![stage_spec(StageKind::SingleElimination, None)],
    );

    let detail = engine.create_event(olympiad, &pin, Version(6), &spec)?;
    let event = detail.id;
    assert_eq!(detail.status, EventStatus::Registration);
    assert_eq!(detail.stages[0].status, StageStatus::Running);

    // Byes finished, the semifinal fed by two byes running, the rest
    // waiting.
    let group = &detail.stages[0].groups[0];
    let statuses: Vec<MatchStatus> = group.matches.iter().map(|row| row.status).collect();
    assert_eq!(
        statuses,
        vec![
            MatchStatus::Finished,
            MatchStatus::Pending,
            MatchStatus::Finished,
            MatchStatus::Finished,
            MatchStatus::Pending,
            MatchStatus::Running,
            MatchStatus::Pending,
        ]
    );

    // The byes went to the top three seeds.
    assert_eq!(group.matches[0].winner, Some(teams[0]));
    assert_eq!(group.matches[2].winner, Some(teams[1]));
    assert_eq!(group.matches[3].winner, Some(teams[2]));

    // And their winners are already waiting in the second round.
    let semi_a = &group.matches[4];
    assert_eq!(semi_a.teams.len(), 1);
    assert_eq!(semi_a.teams[0].team, teams[0]);

    let first = beat(&mut engine, olympiad, &pin, event, &outcome(teams[1], teams[2]))?;
    assert!(first.changed);
    assert_eq!(first.event_status, EventStatus::Started);
    assert_eq!(first.stage_status, StageStatus::Running);

    beat(&mut engine, olympiad, &pin, event, &outcome(teams[3], teams[4]))?;
    beat(&mut engine, olympiad, &pin, event, &outcome(teams[0], teams[3]))?;
    let last = beat(&mut engine, olympiad, &pin, event, &outcome(teams[0], teams[1]))?;
    assert_eq!(last.winner, Some(teams[0]));
    assert_eq!(last.stage_status, StageStatus::Finished);
    assert_eq!(last.event_status, EventStatus::Finished);

    let detail = engine.event_detail(olympiad, event)?;
    assert_eq!(detail.status, EventStatus::Finished);
    assert_eq!(detail.version, Version(3));
    assert_eq!(detail.stages[0].version, Version(2));

    // Champion first, then the final's loser, then the semifinal losers by
    // seed, then the opening round loser.
    let ranking = stage::rank(engine.store(), detail.stages[0].id)?;
    assert_eq!(ranking, vec![teams[0], teams[1], teams[2], teams[3], teams[4]]);

    // A scorekeeper who lost the reply can resubmit the final unchanged.
    let group = &detail.stages[0].groups[0];
    let final_row = group.matches.iter().find(|row| row.next_match.is_none()).unwrap();
    let again = engine.submit_score(
        olympiad,
        &pin,
        final_row.id,
        final_row.version,
        &outcome(teams[0], teams[1]),
    )?;
    assert!(!again.changed);
    assert_eq!(again.match_version, final_row.version);

    Ok(())
}

#[test]
fn round_robin_ranks_by_wins_then_score_differential() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(4)?;
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Points,
        &teams,
        vec![stage_spec(StageKind::RoundRobin, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(5), &spec)?;
    let event = detail.id;

    // Everyone plays everyone once; every pair is fixed from the start and
    // nothing advances anywhere.
    let group = &detail.stages[0].groups[0];
    assert_eq!(group.matches.len(), 6);
    assert!(group.matches.iter().all(|row| row.status == MatchStatus::Pending));
    assert!(group.matches.iter().all(|row| row.next_match.is_none()));

    beat(&mut engine, olympiad, &pin, event, &[(teams[0], 5), (teams[1], 2)])?;
    beat(&mut engine, olympiad, &pin, event, &[(teams[2], 9), (teams[0], 2)])?;
    beat(&mut engine, olympiad, &pin, event, &[(teams[0], 7), (teams[3], 0)])?;
    beat(&mut engine, olympiad, &pin, event, &[(teams[1], 6), (teams[2], 1)])?;
    beat(&mut engine, olympiad, &pin, event, &[(teams[1], 4), (teams[3], 2)])?;
    let last = beat(&mut engine, olympiad, &pin, event, &[(teams[2], 3), (teams[3], 1)])?;
    assert_eq!(last.winner, Some(teams[2]));
    assert_eq!(last.event_status, EventStatus::Finished);

    // Three teams tie on two wins each. Differential splits off the first
    // seed, and the leftover tie falls back to seeding.
    let ranking = stage::rank(engine.store(), detail.stages[0].id)?;
    assert_eq!(ranking, vec![teams[1], teams[2], teams[0], teams[3]]);

    Ok(())
}

#[test]
fn a_lone_match_event_finishes_on_its_first_result() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(2)?;
    let spec = event_spec(
        "Final Only",
        ScoreKind::Outcome,
        &teams,
        vec![stage_spec(StageKind::RoundRobin, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(3), &spec)?;
    let event = detail.id;

    // One result decides everything: the event skips started and goes
    // straight to finished, and every settled row moves one version.
    let only = beat(&mut engine, olympiad, &pin, event, &outcome(teams[0], teams[1]))?;
    assert!(only.changed);
    assert_eq!(only.match_version, Version(2));
    assert_eq!(only.winner, Some(teams[0]));
    assert_eq!(only.stage_status, StageStatus::Finished);
    assert_eq!(only.event_status, EventStatus::Finished);

    let detail = engine.event_detail(olympiad, event)?;
    assert_eq!(detail.version, Version(2));
    assert_eq!(detail.stages[0].version, Version(2));
    assert_eq!(
        stage::rank(engine.store(), detail.stages[0].id)?,
        vec![teams[0], teams[1]]
    );

    Ok(())
}

#[test]
fn extreme_point_scores_still_settle_and_rank() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(2)?;
    let spec = event_spec(
        "Long Throw",
        ScoreKind::Points,
        &teams,
        vec![stage_spec(StageKind::RoundRobin, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(3), &spec)?;
    let event = detail.id;

    // The widest spread two i64 scores allow; the differential saturates
    // and the table still comes out right.
    let last = beat(
        &mut engine,
        olympiad,
        &pin,
        event,
        &[(teams[0], i64::MAX), (teams[1], i64::MIN)],
    )?;
    assert_eq!(last.winner, Some(teams[0]));
    assert_eq!(last.event_status, EventStatus::Finished);

    let detail = engine.event_detail(olympiad, event)?;
    let row = &detail.stages[0].groups[0].matches[0];
    assert_eq!(row.teams[0].score, Some(i64::MAX));
    assert_eq!(row.teams[1].score, Some(i64::MIN));
    assert_eq!(
        stage::rank(engine.store(), detail.stages[0].id)?,
        vec![teams[0], teams[1]]
    );

    Ok(())
}

#[test]
fn qualifiers_feed_the_next_stage_in_ranked_order() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(4)?;
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Outcome,
        &teams,
        vec![
            stage_spec(StageKind::RoundRobin, Some(2)),
            stage_spec(StageKind::SingleElimination, None),
        ],
    );
    let detail = engine.create_event(olympiad, &pin, Version(5), &spec)?;
    let event = detail.id;
    assert_eq!(detail.stages[1].status, StageStatus::Pending);
    assert!(detail.stages[1].groups.is_empty());

    // The third seed sweeps the group; the second seed takes the other
    // qualifying place.
    beat(&mut engine, olympiad, &pin, event, &outcome(teams[2], teams[0]))?;
    beat(&mut engine, olympiad, &pin, event, &outcome(teams[2], teams[1]))?;
    beat(&mut engine, olympiad, &pin, event, &outcome(teams[2], teams[3]))?;
    beat(&mut engine, olympiad, &pin, event, &outcome(teams[1], teams[0]))?;
    beat(&mut engine, olympiad, &pin, event, &outcome(teams[1], teams[3]))?;
    let settled = beat(&mut engine, olympiad, &pin, event, &outcome(teams[0], teams[3]))?;
    assert_eq!(settled.stage_status, StageStatus::Finished);
    assert_eq!(settled.event_status, EventStatus::Started);

    let detail = engine.event_detail(olympiad, event)?;
    let final_stage = &detail.stages[1];
    assert_eq!(final_stage.status, StageStatus::Running);
    assert_eq!(final_stage.version, Version(2));
    // The qualifiers are reseeded by their group finish.
    assert_eq!(final_stage.groups[0].members, vec![teams[2], teams[1]]);

    let last = beat(&mut engine, olympiad, &pin, event, &outcome(teams[1], teams[2]))?;
    assert_eq!(last.stage_status, StageStatus::Finished);
    assert_eq!(last.event_status, EventStatus::Finished);

    let ranking = stage::rank(engine.store(), final_stage.id)?;
    assert_eq!(ranking, vec![teams[1], teams[2]]);

    Ok(())
}

#[test]
fn group_tables_interleave_into_one_ranking() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(8)?;
    let spec = EventSpec {
        name: "Main Draw".to_string(),
        score_kind: ScoreKind::Outcome,
        teams: teams.clone(),
        stages: vec![StageSpec {
            kind: StageKind::Groups,
            advance_count: None,
            group_sizes: Some(vec![4, 4]),
        }],
    };
    let detail = engine.create_event(olympiad, &pin, Version(9), &spec)?;
    let event = detail.id;

    // Seeds are dealt serpentine style: 1 4 5 8 against 2 3 6 7.
    let stage_view = &detail.stages[0];
    assert_eq!(
        stage_view.groups[0].members,
        vec![teams[0], teams[3], teams[4], teams[7]]
    );
    assert_eq!(
        stage_view.groups[1].members,
        vec![teams[1], teams[2], teams[5], teams[6]]
    );

    // The first group goes by seed; in the second the third seed upsets
    // the second.
    for &(winner, loser) in &[
        (0_usize, 3),
        (0, 4),
        (0, 7),
        (3, 4),
        (3, 7),
        (4, 7),
        (2, 1),
        (2, 5),
        (2, 6),
        (1, 5),
        (1, 6),
        (5, 6),
    ] {
        beat(&mut engine, olympiad, &pin, event, &outcome(teams[winner], teams[loser]))?;
    }

    let detail = engine.event_detail(olympiad, event)?;
    assert_eq!(detail.status, EventStatus::Finished);

    // Group winners first, then the runners up, and so on; ties inside a
    // tier go to the better seed.
    let ranking = stage::rank(engine.store(), detail.stages[0].id)?;
    assert_eq!(
        ranking,
        vec![teams[0], teams[2], teams[1], teams[3], teams[4], teams[5], teams[6], teams[7]]
    );

    Ok(())
}

#[test]
fn authorization_comes_before_validation() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, _teams) = roster(2)?;
    let wrong_pin = Pin::from_str(if pin.to_string() == "0000" { "0001" } else { "0000" })?;

    // A missing olympiad reports not found no matter how bad the rest of
    // the request is.
    let error = engine
        .rename_olympiad(OlympiadId(99), &wrong_pin, Version(7), "")
        .unwrap_err();
    assert_eq!(error, EngineError::OlympiadNotFound(OlympiadId(99)));
    assert_eq!(error.kind(), ErrorKind::NotFound);

    // With the olympiad found, the pin is checked before the version.
    let error = engine
        .rename_olympiad(olympiad, &wrong_pin, Version(7), "")
        .unwrap_err();
    assert_eq!(error, EngineError::WrongPin);
    assert_eq!(error.kind(), ErrorKind::Unauthorized);

    // With the pin right, the version is checked before the payload.
    let error = engine.rename_olympiad(olympiad, &pin, Version(7), "").unwrap_err();
    assert_eq!(
        error,
        EngineError::StaleVersion {
            stored: Version(3),
            expected: Version(7),
        }
    );
    assert_eq!(error.kind(), ErrorKind::Conflict);

    // Only then is the name looked at.
    let error = engine.rename_olympiad(olympiad, &pin, Version(3), "").unwrap_err();
    assert_eq!(error, EngineError::BadName("may not be empty"));
    assert_eq!(error.kind(), ErrorKind::Validation);

    // Nothing moved.
    let summary = engine.show_olympiad(olympiad)?;
    assert_eq!(summary.version, Version(3));
    assert_eq!(summary.name, "Midsummer Games");

    Ok(())
}

#[test]
fn results_are_validated_and_nothing_half_applies() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(5)?;
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Outcome,
        &teams,
        vec![stage_spec(StageKind::SingleElimination, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(6), &spec)?;
    let event = detail.id;

    let group = &detail.stages[0].groups[0];
    let bye = &group.matches[0];
    let opener = &group.matches[1];
    let last = group.matches.iter().find(|row| row.next_match.is_none()).unwrap();

    // The final has no occupants yet.
    let error = engine
        .submit_score(olympiad, &pin, last.id, last.version, &outcome(teams[0], teams[1]))
        .unwrap_err();
    assert_eq!(error, EngineError::MatchNotReady(last.id));

    // A bye is born finished and takes no result either.
    let error = engine
        .submit_score(olympiad, &pin, bye.id, bye.version, &outcome(teams[0], teams[4]))
        .unwrap_err();
    assert_eq!(error, EngineError::MatchNotReady(bye.id));

    // Both occupants, each exactly once.
    let error = engine
        .submit_score(olympiad, &pin, opener.id, opener.version, &outcome(teams[0], teams[4]))
        .unwrap_err();
    assert_eq!(
        error,
        EngineError::NotAnOccupant {
            id: opener.id,
            team: teams[0],
        }
    );

    let error = engine
        .submit_score(olympiad, &pin, opener.id, opener.version, &[(teams[3], 1)])
        .unwrap_err();
    assert_eq!(error, EngineError::ScoresMalformed);

    let error = engine
        .submit_score(
            olympiad,
            &pin,
            opener.id,
            opener.version,
            &[(teams[3], 1), (teams[3], 0)],
        )
        .unwrap_err();
    assert_eq!(error, EngineError::ScoresMalformed);

    // An outcome is a single winner flag, nothing fancier.
    let error = engine
        .submit_score(
            olympiad,
            &pin,
            opener.id,
            opener.version,
            &[(teams[3], 2), (teams[4], 0)],
        )
        .unwrap_err();
    assert_eq!(error, EngineError::BadOutcome);

    // None of the failures moved anything.
    let detail = engine.event_detail(olympiad, event)?;
    assert_eq!(detail.status, EventStatus::Registration);
    assert_eq!(detail.stages[0].groups[0].matches[1].version, Version(1));

    // Points results cannot tie.
    let spec = event_spec(
        "Biathlon",
        ScoreKind::Points,
        &[teams[0], teams[1]],
        vec![stage_spec(StageKind::RoundRobin, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(7), &spec)?;
    let row = &detail.stages[0].groups[0].matches[0];
    let error = engine
        .submit_score(olympiad, &pin, row.id, row.version, &[(teams[0], 3), (teams[1], 3)])
        .unwrap_err();
    assert_eq!(error, EngineError::TiedScore);

    Ok(())
}

#[test]
fn names_are_unique_where_it_matters() -> anyhow::Result<()> {
    let mut engine = Engine::new();
    let first = engine.create_olympiad("Midsummer Games", None)?;

    // Olympiad names are global.
    let error = engine.create_olympiad("Midsummer Games", None).unwrap_err();
    assert_eq!(error, EngineError::NameTaken("Midsummer Games".to_string()));

    // Names are trimmed before any checks.
    let error = engine
        .create_olympiad("  Midsummer Games  ", None)
        .unwrap_err();
    assert_eq!(error, EngineError::NameTaken("Midsummer Games".to_string()));

    // A caller who brings a pin keeps it.
    let second = engine.create_olympiad("Winter Games", Some(Pin::from_str("2468")?))?;
    assert_eq!(second.pin.to_string(), "2468");

    // Player names only need to be free inside their own olympiad.
    engine.create_player(first.id, &first.pin, Version(1), "Ada")?;
    engine.create_player(second.id, &second.pin, Version(1), "Ada")?;
    let error = engine
        .create_player(first.id, &first.pin, Version(2), "Ada")
        .unwrap_err();
    assert_eq!(error, EngineError::NameTaken("Ada".to_string()));

    // A squad cannot take a player's name: the player's team of one
    // already carries it.
    let brigid = engine.create_player(first.id, &first.pin, Version(2), "Brigid")?;
    let error = engine
        .create_team(
            first.id,
            &first.pin,
            Version(3),
            &TeamSpec {
                name: "Ada".to_string(),
                players: vec![brigid.id],
            },
        )
        .unwrap_err();
    assert_eq!(error, EngineError::NameTaken("Ada".to_string()));

    // Renaming to the current name is a plain bump, not a clash with
    // yourself.
    let version = engine.rename_olympiad(first.id, &first.pin, Version(3), "Midsummer Games")?;
    assert_eq!(version, Version(4));

    // Names are capped and must be printable.
    let long = "x".repeat(65);
    let error = engine
        .rename_olympiad(first.id, &first.pin, Version(4), &long)
        .unwrap_err();
    assert_eq!(error, EngineError::BadName("longer than 64 characters"));
    let error = engine
        .rename_olympiad(first.id, &first.pin, Version(4), "Tab\tStop")
        .unwrap_err();
    assert_eq!(error, EngineError::BadName("contains control characters"));

    Ok(())
}

#[test]
fn squads_are_assembled_from_free_players() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(3)?;
    let players: Vec<PlayerId> = engine
        .list_players(olympiad)?
        .iter()
        .map(|player| player.id)
        .collect();

    let relay = engine.create_team(
        olympiad,
        &pin,
        Version(4),
        &TeamSpec {
            name: "Relay".to_string(),
            players: vec![players[0], players[1]],
        },
    )?;
    assert_eq!(relay.version, Version(1));
    assert_eq!(relay.olympiad_version, Version(5));

    // Only the squad is listed; the three individual teams stay behind
    // their players.
    let summaries = engine.list_teams(olympiad)?;
    assert_eq!(summaries.len(), 1);
    let squad = &summaries[0];
    assert_eq!(squad.id, relay.id);
    assert_eq!(squad.kind, TeamKind::Squad);
    assert_eq!(squad.members, vec![players[0], players[1]]);

    let listed = engine.list_players(olympiad)?;
    assert_eq!(listed[0].squad, Some(relay.id));
    assert_eq!(listed[2].squad, None);

    // One squad per player.
    let error = engine
        .create_team(
            olympiad,
            &pin,
            Version(5),
            &TeamSpec {
                name: "Second Relay".to_string(),
                players: vec![players[0]],
            },
        )
        .unwrap_err();
    assert_eq!(error, EngineError::AlreadyInSquad(players[0]));

    // No ghosts, no twins, no empties.
    let error = engine
        .create_team(
            olympiad,
            &pin,
            Version(5),
            &TeamSpec {
                name: "Ghosts".to_string(),
                players: vec![PlayerId(99)],
            },
        )
        .unwrap_err();
    assert_eq!(error, EngineError::PlayerNotFound(PlayerId(99)));

    let error = engine
        .create_team(
            olympiad,
            &pin,
            Version(5),
            &TeamSpec {
                name: "Twins".to_string(),
                players: vec![players[2], players[2]],
            },
        )
        .unwrap_err();
    assert_eq!(error, EngineError::DuplicatePlayer(players[2]));

    let error = engine
        .create_team(
            olympiad,
            &pin,
            Version(5),
            &TeamSpec {
                name: "Nobody".to_string(),
                players: Vec::new(),
            },
        )
        .unwrap_err();
    assert_eq!(error, EngineError::SquadEmpty);

    // Individual teams are managed through their player.
    let error = engine
        .rename_team(olympiad, &pin, teams[0], Version(1), "Solo")
        .unwrap_err();
    assert_eq!(error, EngineError::NotASquad(teams[0]));
    let error = engine.delete_team(olympiad, &pin, teams[0], Version(1)).unwrap_err();
    assert_eq!(error, EngineError::NotASquad(teams[0]));

    // Renaming a player renames the team of one with it.
    engine.rename_player(olympiad, &pin, players[0], Version(1), "Astrid")?;
    let solo = engine.store().team(teams[0])?;
    assert_eq!(solo.name, "Astrid");
    assert_eq!(solo.version, Version(2));

    // Deleting a player pulls them out of their squad.
    engine.delete_player(olympiad, &pin, players[1], Version(1))?;
    let squad = engine
        .list_teams(olympiad)?
        .into_iter()
        .find(|team| team.id == relay.id)
        .unwrap();
    assert_eq!(squad.members, vec![players[0]]);
    assert_eq!(squad.version, Version(2));
    assert_eq!(engine.list_players(olympiad)?.len(), 2);

    // Deleting the squad leaves its players and their teams of one alone.
    engine.delete_team(olympiad, &pin, relay.id, Version(2))?;
    assert!(engine.list_teams(olympiad)?.is_empty());
    assert_eq!(engine.store().teams.len(), 2);
    assert_eq!(engine.list_players(olympiad)?.len(), 2);

    Ok(())
}

#[test]
fn enrollment_protects_the_roster() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(4)?;
    let players: Vec<PlayerId> = engine
        .list_players(olympiad)?
        .iter()
        .map(|player| player.id)
        .collect();

    let relay = engine.create_team(
        olympiad,
        &pin,
        Version(5),
        &TeamSpec {
            name: "Relay".to_string(),
            players: vec![players[2], players[3]],
        },
    )?;

    let field = vec![teams[0], teams[1], relay.id];
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Outcome,
        &field,
        vec![stage_spec(StageKind::RoundRobin, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(6), &spec)?;

    // Enrolled teams and their players are pinned down.
    let error = engine.delete_team(olympiad, &pin, relay.id, Version(1)).unwrap_err();
    assert_eq!(error, EngineError::TeamEnrolled(relay.id));
    let error = engine
        .delete_player(olympiad, &pin, players[0], Version(1))
        .unwrap_err();
    assert_eq!(error, EngineError::PlayerEnrolled(players[0]));
    let error = engine
        .delete_player(olympiad, &pin, players[2], Version(1))
        .unwrap_err();
    assert_eq!(error, EngineError::PlayerEnrolled(players[2]));

    // The same field may compete in several events at once.
    let second = event_spec(
        "Second Draw",
        ScoreKind::Outcome,
        &field,
        vec![stage_spec(StageKind::RoundRobin, None)],
    );
    let second_detail = engine.create_event(olympiad, &pin, Version(7), &second)?;

    // Deleting one event is not enough to free anyone.
    engine.delete_event(olympiad, &pin, detail.id, Version(1))?;
    let error = engine.delete_team(olympiad, &pin, relay.id, Version(1)).unwrap_err();
    assert_eq!(error, EngineError::TeamEnrolled(relay.id));

    // Deleting the last one is.
    engine.delete_event(olympiad, &pin, second_detail.id, Version(1))?;
    engine.delete_team(olympiad, &pin, relay.id, Version(1))?;
    engine.delete_player(olympiad, &pin, players[0], Version(1))?;
    assert_eq!(engine.list_players(olympiad)?.len(), 3);

    // The events took their stages, groups, and matches with them.
    assert!(engine.store().stages.is_empty());
    assert!(engine.store().groups.is_empty());
    assert!(engine.store().matches.is_empty());

    Ok(())
}

#[test]
fn deleting_an_olympiad_clears_every_table() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(5)?;
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Outcome,
        &teams,
        vec![stage_spec(StageKind::SingleElimination, None)],
    );
    engine.create_event(olympiad, &pin, Version(6), &spec)?;

    engine.delete_olympiad(olympiad, &pin, Version(7))?;

    assert!(engine.list_olympiads().is_empty());
    let store = engine.store();
    assert!(store.olympiads.is_empty());
    assert!(store.players.is_empty());
    assert!(store.teams.is_empty());
    assert!(store.events.is_empty());
    assert!(store.stages.is_empty());
    assert!(store.groups.is_empty());
    assert!(store.matches.is_empty());

    let error = engine.show_olympiad(olympiad).unwrap_err();
    assert_eq!(error, EngineError::OlympiadNotFound(olympiad));

    Ok(())
}

#[test]
fn a_snapshot_restores_mid_event() -> anyhow::Result<()> {
    let (mut engine, olympiad, pin, teams) = roster(5)?;
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Outcome,
        &teams,
        vec![stage_spec(StageKind::SingleElimination, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(6), &spec)?;
    let event = detail.id;

    beat(&mut engine, olympiad, &pin, event, &outcome(teams[1], teams[2]))?;
    beat(&mut engine, olympiad, &pin, event, &outcome(teams[3], teams[4]))?;

    let snapshot = ron::ser::to_string_pretty(&engine, ron::ser::PrettyConfig::default())?;
    let mut restored: Engine = ron::from_str(&snapshot)?;

    let before = ron::to_string(&engine.event_detail(olympiad, event)?)?;
    let after = ron::to_string(&restored.event_detail(olympiad, event)?)?;
    assert_eq!(before, after);

    // The restored engine picks up right where the old one stopped.
    beat(&mut restored, olympiad, &pin, event, &outcome(teams[0], teams[3]))?;
    let last = beat(&mut restored, olympiad, &pin, event, &outcome(teams[0], teams[1]))?;
    assert_eq!(last.event_status, EventStatus::Finished);

    // Ids keep allocating past the restored high water mark.
    let player = restored.create_player(olympiad, &pin, Version(7), "Freya")?;
    assert_eq!(player.id, PlayerId(6));

    Ok(())
}

#[test]
fn reference_lists_and_summaries() -> anyhow::Result<()> {
    let kinds = Engine::stage_kinds();
    let labels: Vec<&str> = kinds.iter().map(|info| info.label.as_str()).collect();
    assert_eq!(labels, vec!["Groups", "Round robin", "Single elimination"]);

    let (mut engine, olympiad, pin, teams) = roster(2)?;
    let spec = event_spec(
        "Main Draw",
        ScoreKind::Points,
        &teams,
        vec![stage_spec(StageKind::RoundRobin, None)],
    );
    let detail = engine.create_event(olympiad, &pin, Version(3), &spec)?;

    let olympiads = engine.list_olympiads();
    assert_eq!(olympiads.len(), 1);
    assert_eq!(olympiads[0].name, "Midsummer Games");

    let events = engine.list_events(olympiad)?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "Main Draw");
    assert_eq!(events[0].score_kind, ScoreKind::Points);
    assert_eq!(events[0].status, EventStatus::Registration);

    // The detail view spells out names so a client can render it directly.
    let shown = engine.event_detail(olympiad, detail.id)?;
    assert_eq!(shown.teams[0].name, "Ada");
    assert_eq!(shown.teams[1].name, "Brigid");
    let row = &shown.stages[0].groups[0].matches[0];
    let names: Vec<&str> = row.teams.iter().map(|slot| slot.name.as_str()).collect();
    assert_eq!(names, vec!["Ada", "Brigid"]);

    Ok(())
}
