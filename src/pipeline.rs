//! The full computation pipeline.
//!
//! One call takes an immutable input snapshot (match results or a user's
//! prediction, plus recorded tie resolutions, playoff definitions and
//! selections, and knockout picks) and produces a fresh
//! [`TournamentState`]. Failures are scoped: a group that cannot be
//! finalised, a malformed playoff selection or an unresolvable knockout
//! dependency is collected as a [`ScopedIssue`] while every independent
//! part still computes, so a caller can present partial results ("11 of 12
//! groups resolved; group C has an unresolved tie").
//!
//! The pipeline holds no state between calls and never mutates its inputs;
//! running it twice over the same snapshot yields the same output.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bracket::{propagate_bracket, BracketContext};
use crate::bracket::playoff::resolve_playoff;
use crate::error::EngineError;
use crate::format::TournamentFormat;
use crate::model::{
    GroupLetter, GroupStandings, MatchKey, PlayoffId, StandingEntry, TeamId, TournamentInput,
    TournamentState,
};
use crate::standings::compute_group_standings;
use crate::standings::third_place::rank_third_places;
use crate::standings::tiebreak::{build_overrides, resolve_tie, TieOutcome};

/// What part of the computation an issue is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueScope {
    /// Input-level inconsistency outside any single group or match.
    Input,
    Group(GroupLetter),
    ThirdPlace,
    Playoff(PlayoffId),
    Match(MatchKey),
}

impl fmt::Display for IssueScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueScope::Input => f.write_str("input"),
            IssueScope::Group(g) => write!(f, "group {g}"),
            IssueScope::ThirdPlace => f.write_str("third-place qualification"),
            IssueScope::Playoff(id) => write!(f, "playoff {id}"),
            IssueScope::Match(key) => write!(f, "match {key}"),
        }
    }
}

/// A failure or required decision, scoped to the part it affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedIssue {
    pub scope: IssueScope,
    pub error: EngineError,
}

/// Result of one pipeline run: the computed state plus every scoped issue.
#[derive(Debug, Clone)]
pub struct TournamentComputation {
    pub state: TournamentState,
    pub issues: Vec<ScopedIssue>,
}

/// Run the whole pipeline over one input snapshot.
///
/// Returns an error only for conditions that invalidate the run as a whole
/// (a malformed format, duplicate team ids, malformed tie-resolution
/// records); everything scoped to a group, playoff or match is collected
/// into [`TournamentComputation::issues`] instead.
pub fn compute_tournament(
    format: &TournamentFormat,
    input: &TournamentInput,
) -> Result<TournamentComputation, EngineError> {
    format.validate()?;
    let overrides = build_overrides(&input.tie_resolutions)?;

    let mut seen_teams = HashSet::new();
    for team in &input.teams {
        if !seen_teams.insert(team.id) {
            return Err(EngineError::invalid(format!(
                "team id {} appears twice in the reference table",
                team.id
            )));
        }
    }

    let mut issues: Vec<ScopedIssue> = Vec::new();
    let letters: HashSet<GroupLetter> = format.group_letters.iter().copied().collect();

    // Teams per group, in reference-table order.
    let mut group_teams: HashMap<GroupLetter, Vec<TeamId>> = HashMap::new();
    for team in &input.teams {
        let Some(letter) = team.group else { continue };
        if !letters.contains(&letter) {
            issues.push(ScopedIssue {
                scope: IssueScope::Input,
                error: EngineError::invalid(format!(
                    "team {} is assigned to unknown group {letter}",
                    team.id
                )),
            });
            continue;
        }
        group_teams.entry(letter).or_default().push(team.id);
    }
    for m in &input.group_matches {
        if !letters.contains(&m.group) {
            issues.push(ScopedIssue {
                scope: IssueScope::Input,
                error: EngineError::invalid(format!(
                    "match {} belongs to unknown group {}",
                    m.index, m.group
                )),
            });
        }
    }

    // Group stage: each group computes independently.
    let mut standings: BTreeMap<GroupLetter, GroupStandings> = BTreeMap::new();
    for &letter in &format.group_letters {
        let teams = group_teams.remove(&letter).unwrap_or_default();
        if teams.len() != format.group_size as usize {
            issues.push(ScopedIssue {
                scope: IssueScope::Group(letter),
                error: EngineError::invalid(format!(
                    "group {letter} has {} teams, expected {}",
                    teams.len(),
                    format.group_size
                )),
            });
            continue;
        }
        let matches: Vec<_> = input
            .group_matches
            .iter()
            .filter(|m| m.group == letter)
            .cloned()
            .collect();
        let mut group = match compute_group_standings(
            letter,
            &teams,
            &matches,
            format.matches_per_group(),
        ) {
            Ok(group) => group,
            Err(error) => {
                warn!(group = %letter, %error, "group standings failed");
                issues.push(ScopedIssue {
                    scope: IssueScope::Group(letter),
                    error,
                });
                continue;
            }
        };

        let mut remaining = Vec::new();
        for tie in std::mem::take(&mut group.tie_groups) {
            match resolve_tie(letter, &tie, &matches, &group.entries, &overrides) {
                Ok(TieOutcome::Resolved(order)) => apply_tie_order(&mut group, &order),
                Ok(TieOutcome::Unresolvable(unresolved)) => {
                    debug!(group = %letter, teams = ?unresolved.teams, "tie needs a decision");
                    issues.push(ScopedIssue {
                        scope: IssueScope::Group(letter),
                        error: EngineError::UnresolvableTie(unresolved),
                    });
                    remaining.push(tie);
                }
                Err(error) => {
                    issues.push(ScopedIssue {
                        scope: IssueScope::Group(letter),
                        error,
                    });
                    remaining.push(tie);
                }
            }
        }
        group.tie_groups = remaining;
        standings.insert(letter, group);
    }

    // Third-place qualification waits for every group to be final.
    let all_final = format.group_letters.len() == standings.len()
        && standings.values().all(|g| g.is_final());
    let third_place = if format.third_place_count > 0 && all_final {
        match rank_third_places(&standings, format) {
            Ok(qualification) => Some(qualification),
            Err(error) => {
                warn!(%error, "third-place qualification failed");
                issues.push(ScopedIssue {
                    scope: IssueScope::ThirdPlace,
                    error,
                });
                None
            }
        }
    } else {
        None
    };

    // Playoffs: trivial composition per definition, selections optional.
    let mut playoff_winners: BTreeMap<PlayoffId, TeamId> = BTreeMap::new();
    let mut playoff_ids = HashSet::new();
    for tie in &input.playoffs {
        if !playoff_ids.insert(tie.id) {
            issues.push(ScopedIssue {
                scope: IssueScope::Playoff(tie.id),
                error: EngineError::invalid(format!("playoff {} is defined twice", tie.id)),
            });
            continue;
        }
        let Some(selection) = input
            .playoff_selections
            .iter()
            .find(|s| s.playoff == tie.id)
        else {
            continue;
        };
        match resolve_playoff(tie, selection) {
            Ok(winner) => {
                playoff_winners.insert(tie.id, winner);
            }
            Err(error) => {
                issues.push(ScopedIssue {
                    scope: IssueScope::Playoff(tie.id),
                    error,
                });
            }
        }
    }
    for id in format.playoff_ids() {
        if !playoff_ids.contains(&id) {
            issues.push(ScopedIssue {
                scope: IssueScope::Input,
                error: EngineError::invalid(format!(
                    "topology references playoff {id}, which has no definition"
                )),
            });
        }
    }
    for selection in &input.playoff_selections {
        if !playoff_ids.contains(&selection.playoff) {
            issues.push(ScopedIssue {
                scope: IssueScope::Playoff(selection.playoff),
                error: EngineError::invalid(format!(
                    "selection targets unknown playoff {}",
                    selection.playoff
                )),
            });
        }
    }

    // Knockout propagation.
    let propagation = propagate_bracket(
        &format.topology,
        &BracketContext {
            standings: &standings,
            third_place: third_place.as_ref(),
            playoff_winners: &playoff_winners,
        },
        &input.knockout_picks,
    );
    issues.extend(propagation.issues.into_iter().map(|issue| ScopedIssue {
        scope: IssueScope::Match(issue.key),
        error: issue.error,
    }));

    let state = TournamentState {
        standings,
        playoff_winners,
        third_place,
        bracket: propagation.bracket,
    };
    info!(
        groups = state.standings.len(),
        final_groups = state.standings.values().filter(|g| g.is_final()).count(),
        issues = issues.len(),
        "tournament state computed"
    );
    Ok(TournamentComputation { state, issues })
}

/// Rewrite a resolved tie's span of the table in the decided order. Tie
/// groups occupy consecutive positions, so the affected slots are exactly
/// the positions currently held by the tied teams.
fn apply_tie_order(group: &mut GroupStandings, order: &[TeamId]) {
    let slots: Vec<usize> = group
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| order.contains(&e.team))
        .map(|(i, _)| i)
        .collect();
    let by_team: HashMap<TeamId, StandingEntry> = group
        .entries
        .iter()
        .filter(|e| order.contains(&e.team))
        .map(|e| (e.team, e.clone()))
        .collect();
    for (&slot, &team) in slots.iter().zip(order) {
        let mut entry = by_team[&team].clone();
        entry.rank = slot as u8 + 1;
        group.entries[slot] = entry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::model::{
        GroupMatch, KnockoutPick, PlayoffSelection, PlayoffShape, PlayoffTie, Round, Team,
        TieCriterion, TieResolution,
    };

    /// Group schedule template: pairs of in-group team numbers (1-4).
    const SCHEDULE: [(u32, u32); 6] = [(1, 2), (3, 4), (1, 3), (2, 4), (1, 4), (2, 3)];

    fn group_letter(i: usize) -> char {
        (b'A' + i as u8) as char
    }

    /// Team id for in-group team number `n` (1-4) of group index `i`.
    fn team_id(i: usize, n: u32) -> TeamId {
        (i as u32 + 1) * 100 + n
    }

    /// A complete official snapshot: in every group the lower team number
    /// wins 1-0, except the third-vs-fourth match, whose margin shrinks
    /// from group A to group L so the best thirds are A through F.
    fn world_cup_input() -> TournamentInput {
        let mut teams = Vec::new();
        let mut group_matches = Vec::new();
        for i in 0..12 {
            let letter = group_letter(i);
            for n in 1..=4 {
                teams.push(Team {
                    id: team_id(i, n),
                    name: format!("Team {letter}{n}"),
                    group: Some(letter),
                });
            }
            for (index, (home, away)) in SCHEDULE.iter().enumerate() {
                let home_goals = if *home == 3 { 12 - i as i32 } else { 1 };
                group_matches.push(GroupMatch {
                    group: letter,
                    index: index as u8,
                    home: team_id(i, *home),
                    away: team_id(i, *away),
                    home_score: Some(home_goals),
                    away_score: Some(0),
                });
            }
        }
        for id in 9901..=9907u32 {
            teams.push(Team {
                id,
                name: format!("Playoff team {id}"),
                group: None,
            });
        }

        TournamentInput {
            teams,
            group_matches,
            tie_resolutions: Vec::new(),
            playoffs: vec![
                PlayoffTie {
                    id: 1,
                    shape: PlayoffShape::TwoSemifinals {
                        semi_one: (9901, 9902),
                        semi_two: (9903, 9904),
                    },
                },
                PlayoffTie {
                    id: 2,
                    shape: PlayoffShape::SemifinalWithBye {
                        semi: (9905, 9906),
                        seeded: 9907,
                    },
                },
            ],
            playoff_selections: vec![
                PlayoffSelection {
                    playoff: 1,
                    semifinal_winners: vec![9901, 9903],
                    final_winner: 9903,
                },
                PlayoffSelection {
                    playoff: 2,
                    semifinal_winners: vec![9905],
                    final_winner: 9907,
                },
            ],
            knockout_picks: Vec::new(),
        }
    }

    /// Repeatedly pick the home side of every open match until the bracket
    /// stops growing, the way a user fills in a bracket round by round.
    fn fill_picks_home_wins(format: &TournamentFormat, input: &mut TournamentInput) {
        loop {
            let computation = compute_tournament(format, input).unwrap();
            let mut added = false;
            for m in computation.state.bracket.matches.values() {
                if m.winner.is_none()
                    && !input.knockout_picks.iter().any(|p| p.key == m.key)
                {
                    input.knockout_picks.push(KnockoutPick {
                        key: m.key,
                        winner: m.home,
                        home_score: None,
                        away_score: None,
                    });
                    added = true;
                }
            }
            if !added {
                return;
            }
        }
    }

    #[test]
    fn complete_snapshot_resolves_the_whole_tournament() {
        let format = TournamentFormat::world_cup_48();
        let mut input = world_cup_input();
        fill_picks_home_wins(&format, &mut input);

        let computation = compute_tournament(&format, &input).unwrap();
        assert!(
            computation.issues.is_empty(),
            "unexpected issues: {:?}",
            computation.issues
        );

        let state = &computation.state;
        assert_eq!(state.standings.len(), 12);
        assert!(state.standings.values().all(|g| g.is_final()));
        assert_eq!(state.playoff_winners[&1], 9903);
        assert_eq!(state.playoff_winners[&2], 9907);

        let qualification = state.third_place.as_ref().unwrap();
        assert_eq!(qualification.qualified, vec!['A', 'B', 'C', 'D', 'E', 'F']);
        // Row "ABCDEF" -> berths "CAFBDE", each berth holding that group's third.
        let by_berth: Vec<TeamId> = qualification.berths.values().copied().collect();
        assert_eq!(by_berth, vec![303, 103, 603, 203, 403, 503]);

        assert_eq!(state.bracket.matches.len(), 32);
        assert!(state.bracket.matches.values().all(|m| m.winner.is_some()));
        assert_eq!(state.bracket.champion, Some(101));
        assert_eq!(state.bracket.runner_up, Some(601));
        assert_eq!(state.bracket.third_place, Some(901));
    }

    #[test]
    fn before_any_picks_only_knockout_dependencies_are_open() {
        let format = TournamentFormat::world_cup_48();
        let input = world_cup_input();
        let computation = compute_tournament(&format, &input).unwrap();

        // Groups, thirds and playoffs all resolve; every round-of-32 pairing
        // is known, and only later rounds wait for winner selections.
        assert!(computation.state.third_place.is_some());
        assert_eq!(
            computation
                .state
                .bracket
                .matches
                .keys()
                .filter(|k| k.round == Round::RoundOf32)
                .count(),
            16
        );
        assert!(!computation.issues.is_empty());
        assert!(computation.issues.iter().all(|issue| matches!(
            issue,
            ScopedIssue {
                scope: IssueScope::Match(_),
                error: EngineError::UnresolvedDependency { .. },
            }
        )));
    }

    /// Rewrite group C so its top two drew head-to-head and finished with
    /// identical records everywhere.
    fn tie_group_c(input: &mut TournamentInput) {
        let scores: [(i32, i32); 6] = [(1, 1), (10, 0), (2, 0), (2, 0), (2, 0), (2, 0)];
        input
            .group_matches
            .iter_mut()
            .filter(|m| m.group == 'C')
            .zip(scores)
            .for_each(|(m, (h, a))| {
                m.home_score = Some(h);
                m.away_score = Some(a);
            });
    }

    #[test]
    fn unresolved_tie_is_scoped_to_its_group() {
        let format = TournamentFormat::world_cup_48();
        let mut input = world_cup_input();
        tie_group_c(&mut input);

        let computation = compute_tournament(&format, &input).unwrap();
        let tie_issue = computation
            .issues
            .iter()
            .find(|i| i.scope == IssueScope::Group('C'))
            .expect("group C should report its tie");
        match &tie_issue.error {
            EngineError::UnresolvableTie(tie) => assert_eq!(tie.teams, vec![301, 302]),
            other => panic!("expected an unresolvable tie, got {other}"),
        }

        // The other eleven groups still finalise, third place waits.
        let final_groups = computation
            .state
            .standings
            .values()
            .filter(|g| g.is_final())
            .count();
        assert_eq!(final_groups, 11);
        assert!(computation.state.third_place.is_none());
        // Branches independent of group C (and of the pending third-place
        // berths) still resolve, e.g. winner of E against second of D.
        assert!(computation
            .state
            .bracket
            .matches
            .contains_key(&MatchKey::new(Round::RoundOf32, 2)));
        assert!(!computation
            .state
            .bracket
            .matches
            .contains_key(&MatchKey::new(Round::RoundOf32, 1)));
    }

    #[test]
    fn recorded_resolution_finalises_the_tied_group() {
        let format = TournamentFormat::world_cup_48();
        let mut input = world_cup_input();
        tie_group_c(&mut input);
        input.tie_resolutions.push(TieResolution {
            group: 'C',
            teams: vec![301, 302],
            order: vec![302, 301],
            resolved_by: TieCriterion::DrawingOfLots,
            recorded_at: Utc::now(),
        });

        let computation = compute_tournament(&format, &input).unwrap();
        let group_c = &computation.state.standings[&'C'];
        assert!(group_c.is_final());
        assert_eq!(group_c.entries[0].team, 302);
        assert_eq!(group_c.entries[0].rank, 1);
        assert_eq!(group_c.entries[1].team, 301);
        assert!(computation
            .issues
            .iter()
            .all(|i| i.scope != IssueScope::Group('C')));

        // The recorded decision keeps reproducing the same state.
        let again = compute_tournament(&format, &input).unwrap();
        assert_eq!(computation.state, again.state);
    }

    #[test]
    fn missing_playoff_definition_is_reported() {
        let format = TournamentFormat::world_cup_48();
        let mut input = world_cup_input();
        input.playoffs.pop();
        input.playoff_selections.pop();

        let computation = compute_tournament(&format, &input).unwrap();
        assert!(computation.issues.iter().any(|i| {
            i.scope == IssueScope::Input
                && matches!(&i.error, EngineError::InvalidInput(msg) if msg.contains("playoff 2"))
        }));
    }

    #[test]
    fn duplicate_team_id_fails_the_whole_run() {
        let format = TournamentFormat::world_cup_48();
        let mut input = world_cup_input();
        let duplicate = input.teams[0].clone();
        input.teams.push(duplicate);
        assert!(matches!(
            compute_tournament(&format, &input),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn input_snapshot_deserializes_from_json() {
        let raw = r#"{
            "teams": [
                {"id": 301, "name": "Team C1", "group": "C"},
                {"id": 9901, "name": "Playoff team", "group": null}
            ],
            "group_matches": [
                {"group": "C", "index": 0, "home": 301, "away": 302,
                 "home_score": 1, "away_score": 1}
            ],
            "tie_resolutions": [
                {"group": "C", "teams": [301, 302], "order": [302, 301],
                 "resolved_by": "DrawingOfLots",
                 "recorded_at": "2026-07-02T18:30:00Z"}
            ],
            "playoffs": [
                {"id": 2, "shape": {"SemifinalWithBye":
                    {"semi": [9905, 9906], "seeded": 9907}}}
            ],
            "playoff_selections": [
                {"playoff": 2, "semifinal_winners": [9906], "final_winner": 9906}
            ],
            "knockout_picks": [
                {"key": "R32#3", "winner": 301, "home_score": 2, "away_score": 0}
            ]
        }"#;
        let input: TournamentInput = serde_json::from_str(raw).unwrap();
        assert_eq!(input.teams[0].group, Some('C'));
        assert_eq!(input.group_matches[0].score(), Some((1, 1)));
        assert_eq!(input.tie_resolutions[0].resolved_by, TieCriterion::DrawingOfLots);
        assert_eq!(input.knockout_picks[0].key.round, Round::RoundOf32);
    }
}
