use rustc_hash::FxHashSet;

use crate::{error::EngineError, team::TeamId};

/// A planned stage before any rows exist: matches indexed by position, links
/// as indices into the same list. The store turns planned matches into real
/// ones in order, so an index link maps 1:1 onto a match id link.
#[derive(Clone, Debug)]
pub struct Blueprint {
    pub matches: Vec<PlannedMatch>,
}

#[derive(Clone, Debug)]
pub struct PlannedMatch {
    /// Zero, one (bye), or two occupants.
    pub teams: Vec<TeamId>,
    /// Index of the match the winner feeds, within the same blueprint.
    pub next: Option<usize>,
}

/// The smallest power of two that fits `n` participants.
#[must_use]
pub fn bracket_size(n: usize) -> usize {
    n.next_power_of_two()
}

/// The standard seeding table for a bracket of `bracket_size` entries, as
/// 0-based seed positions: consecutive pairs are the first round matches.
///
/// For 8 entries the table is `[0, 7, 3, 4, 1, 6, 2, 5]`: seed 1 opens
/// against seed 8 at the top of the draw, seed 2 against seed 7 at the
/// bottom, and the top two seeds can only meet in the final. Each doubling
/// pairs every present seed with the weakest newcomer, which also places the
/// byes of a short field against the strongest seeds.
#[must_use]
pub fn seed_order(bracket_size: usize) -> Vec<usize> {
    let mut order = vec![0];

    while order.len() < bracket_size {
        let doubled = order.len() * 2;
        let mut next = Vec::with_capacity(doubled);
        for &seed in &order {
            next.push(seed);
            next.push(doubled - 1 - seed);
        }
        order = next;
    }

    order
}

/// Plans a single elimination bracket for `seeds` (strongest first).
///
/// The plan holds `bracket_size - 1` matches: a full first round (byes as
/// one-occupant matches), then empty matches round by round up to the single
/// final, the only match without a `next` link.
///
/// # Errors
///
/// `TooFewTeams` below two participants, `DuplicateTeam` when a team is
/// seeded twice.
pub fn single_elimination(seeds: &[TeamId]) -> Result<Blueprint, EngineError> {
    validate(seeds)?;

    let size = bracket_size(seeds.len());
    let order = seed_order(size);
    let mut matches = Vec::with_capacity(size - 1);

    for pair in order.chunks(2) {
        let teams = pair
            .iter()
            .filter_map(|&position| seeds.get(position).copied())
            .collect();
        matches.push(PlannedMatch { teams, next: None });
    }

    // Later rounds halve until the final; feeder j of a round feeds match
    // j / 2 of the next one.
    let mut start = 0;
    let mut len = size / 2;
    while len > 1 {
        let next_start = start + len;
        for _ in 0..len / 2 {
            matches.push(PlannedMatch {
                teams: Vec::new(),
                next: None,
            });
        }
        for j in 0..len {
            matches[start + j].next = Some(next_start + j / 2);
        }
        start = next_start;
        len /= 2;
    }

    Ok(Blueprint { matches })
}

/// Plans one match per unordered pair of `seeds`, no links.
///
/// # Errors
///
/// `TooFewTeams` below two participants, `DuplicateTeam` when a team is
/// seeded twice.
pub fn round_robin(seeds: &[TeamId]) -> Result<Blueprint, EngineError> {
    validate(seeds)?;

    let mut matches = Vec::with_capacity(seeds.len() * (seeds.len() - 1) / 2);
    for (index, &first) in seeds.iter().enumerate() {
        for &second in &seeds[index + 1..] {
            matches.push(PlannedMatch {
                teams: vec![first, second],
                next: None,
            });
        }
    }

    Ok(Blueprint { matches })
}

/// Plans a round robin per group of a caller-defined partition.
///
/// # Errors
///
/// `TooFewTeams` for a group below two participants, `DuplicateTeam` when a
/// team appears twice anywhere in the partition.
pub fn groups(partition: &[Vec<TeamId>]) -> Result<Vec<Blueprint>, EngineError> {
    let mut seen = FxHashSet::default();
    for group in partition {
        for &team in group {
            if !seen.insert(team) {
                return Err(EngineError::DuplicateTeam(team));
            }
        }
    }

    let mut blueprints = Vec::with_capacity(partition.len());
    for group in partition {
        blueprints.push(round_robin(group)?);
    }

    Ok(blueprints)
}

/// Deals `seeds` into groups of the given sizes, serpentine: the first pass
/// hands the top seeds out forwards, the next pass returns backwards, so no
/// group collects all the favorites.
///
/// Sizes must each be at least two and sum to `seeds.len()`; the event spec
/// is validated before any dealing happens.
#[must_use]
pub fn deal_groups(seeds: &[TeamId], sizes: &[usize]) -> Vec<Vec<TeamId>> {
    let mut groups: Vec<Vec<TeamId>> = sizes.iter().map(|&size| Vec::with_capacity(size)).collect();
    let mut seeds = seeds.iter().copied();
    let mut forward = true;

    'deal: loop {
        let mut dealt = false;
        for step in 0..groups.len() {
            let index = if forward {
                step
            } else {
                groups.len() - 1 - step
            };
            if groups[index].len() < sizes[index] {
                let Some(team) = seeds.next() else {
                    break 'deal;
                };
                groups[index].push(team);
                dealt = true;
            }
        }
        if !dealt {
            break;
        }
        forward = !forward;
    }

    groups
}

fn validate(seeds: &[TeamId]) -> Result<(), EngineError> {
    if seeds.len() < 2 {
        return Err(EngineError::TooFewTeams(seeds.len()));
    }

    let mut seen = FxHashSet::default();
    for &team in seeds {
        if !seen.insert(team) {
            return Err(EngineError::DuplicateTeam(team));
        }
    }

    Ok(())
}
