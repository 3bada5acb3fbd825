//! Cross-group ranking of third-placed teams.
//!
//! The best K thirds qualify for the knockout stage. They are compared on
//! their own group's record only (points, goal difference, goals for; no
//! cross-group head-to-head exists), and the set of qualifying group
//! letters is then looked up in the format's combination table, which fixes
//! the bracket berth of every qualifier. A realized combination missing
//! from the table is a format constraint violation, surfaced as
//! `NoMatchingCombination` and never defaulted.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::EngineError;
use crate::format::TournamentFormat;
use crate::model::{
    GroupLetter, GroupStandings, StandingEntry, ThirdPlaceQualification, TieContext, TieCriterion,
    UnresolvableTie,
};

/// Rank all third-placed teams and assign the qualifiers to their berths.
///
/// Every group of the format must be present and final (complete schedule,
/// no open ties): qualification decided from a partial group stage would
/// shift as the remaining results arrive. A tie across the qualification
/// cut is an `UnresolvableTie` in the third-place table.
pub fn rank_third_places(
    standings: &BTreeMap<GroupLetter, GroupStandings>,
    format: &TournamentFormat,
) -> Result<ThirdPlaceQualification, EngineError> {
    let position = format.qualifying_positions + 1;
    let count = format.third_place_count as usize;

    let mut thirds: Vec<(GroupLetter, StandingEntry)> = Vec::with_capacity(standings.len());
    for &letter in &format.group_letters {
        let group = standings.get(&letter).ok_or_else(|| {
            EngineError::invalid(format!("no standings for group {letter}"))
        })?;
        if !group.is_final() {
            return Err(EngineError::invalid(format!(
                "group {letter} standings are not final"
            )));
        }
        let entry = group
            .entries
            .iter()
            .find(|e| e.rank == position)
            .ok_or_else(|| {
                EngineError::invalid(format!("group {letter} has no rank {position}"))
            })?;
        thirds.push((letter, entry.clone()));
    }
    if thirds.len() < count {
        return Err(EngineError::invalid(format!(
            "{} third-placed teams cannot fill {count} berths",
            thirds.len()
        )));
    }

    thirds.sort_by(|(_, a), (_, b)| b.criteria().cmp(&a.criteria()));

    // The cut must fall between distinct records; a cluster of identical
    // triples straddling it cannot be ordered by statistics.
    if thirds.len() > count && thirds[count - 1].1.criteria() == thirds[count].1.criteria() {
        let cut = thirds[count - 1].1.criteria();
        let cluster: Vec<_> = thirds
            .iter()
            .filter(|(_, e)| e.criteria() == cut)
            .map(|(_, e)| e.team)
            .collect();
        return Err(EngineError::UnresolvableTie(UnresolvableTie {
            context: TieContext::ThirdPlaceTable,
            teams: cluster,
            exhausted: TieCriterion::GoalsFor,
        }));
    }

    let mut qualified: Vec<GroupLetter> = thirds[..count].iter().map(|(g, _)| *g).collect();
    qualified.sort_unstable();

    let row = format
        .third_place_table
        .iter()
        .find(|row| row.groups == qualified)
        .ok_or_else(|| EngineError::NoMatchingCombination {
            groups: qualified.clone(),
        })?;

    let mut berths = BTreeMap::new();
    for (berth, letter) in row.berths.iter().enumerate() {
        let team = thirds
            .iter()
            .find(|(g, _)| g == letter)
            .map(|(_, e)| e.team)
            .ok_or_else(|| {
                EngineError::invalid(format!(
                    "combination row assigns group {letter}, which has no ranked third"
                ))
            })?;
        berths.insert(berth as u8, team);
    }
    debug!(?qualified, "third-place qualification resolved");

    Ok(ThirdPlaceQualification {
        qualified,
        berths,
        table: thirds.into_iter().map(|(_, e)| e.team).collect(),
    })
}
