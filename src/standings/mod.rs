//! Group standings computation.
//!
//! Points are 3 for a win, 1 for a draw, 0 for a loss; unplayed matches
//! contribute nothing. The table is ordered descending by points, then goal
//! difference, then goals for. Teams whose three criteria are identical
//! share a tie group, reported alongside the table for the tiebreak
//! resolver; the calculator itself never invents an order for them.

pub mod third_place;
pub mod tiebreak;

use std::collections::HashMap;

use tracing::debug;

use crate::error::EngineError;
use crate::model::{GroupLetter, GroupMatch, GroupStandings, StandingEntry, TeamId};

/// Compute the standings of one group from its scheduled matches.
///
/// A partially played schedule is still rankable; `complete` on the result
/// reports whether every one of `scheduled` matches has scores. Fails with
/// `InvalidInput` when a match references a team outside `teams`, carries a
/// negative score, or reuses a schedule index.
pub fn compute_group_standings(
    group: GroupLetter,
    teams: &[TeamId],
    matches: &[GroupMatch],
    scheduled: usize,
) -> Result<GroupStandings, EngineError> {
    if teams.is_empty() {
        return Err(EngineError::invalid(format!("group {group} has no teams")));
    }
    let mut tally: HashMap<TeamId, StandingEntry> = teams
        .iter()
        .map(|&team| {
            (
                team,
                StandingEntry {
                    team,
                    played: 0,
                    points: 0,
                    goal_difference: 0,
                    goals_for: 0,
                    goals_against: 0,
                    rank: 0,
                },
            )
        })
        .collect();
    if tally.len() != teams.len() {
        return Err(EngineError::invalid(format!(
            "group {group} lists a team twice"
        )));
    }

    let mut seen_indices = Vec::with_capacity(matches.len());
    let mut played = 0usize;
    for m in matches {
        if m.group != group {
            return Err(EngineError::invalid(format!(
                "match {} belongs to group {}, not group {group}",
                m.index, m.group
            )));
        }
        if seen_indices.contains(&m.index) {
            return Err(EngineError::invalid(format!(
                "group {group} schedule index {} appears twice",
                m.index
            )));
        }
        seen_indices.push(m.index);
        if !tally.contains_key(&m.home) || !tally.contains_key(&m.away) {
            return Err(EngineError::invalid(format!(
                "match {} in group {group} references a team outside the group",
                m.index
            )));
        }
        if m.home == m.away {
            return Err(EngineError::invalid(format!(
                "match {} in group {group} pairs a team with itself",
                m.index
            )));
        }

        let Some((home_goals, away_goals)) = m.score() else {
            continue;
        };
        if home_goals < 0 || away_goals < 0 {
            return Err(EngineError::invalid(format!(
                "match {} in group {group} has a negative score",
                m.index
            )));
        }
        played += 1;
        for (team, scored, conceded) in [
            (m.home, home_goals, away_goals),
            (m.away, away_goals, home_goals),
        ] {
            if let Some(entry) = tally.get_mut(&team) {
                apply_result(entry, scored, conceded);
            }
        }
    }

    // Keep the caller's team order for equal triples: the sort is stable, so
    // unresolved positions stay deterministic until a tiebreak settles them.
    let mut entries: Vec<StandingEntry> = teams.iter().map(|t| tally[t].clone()).collect();
    entries.sort_by(|a, b| b.criteria().cmp(&a.criteria()));
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u8 + 1;
    }

    let tie_groups = collect_tie_groups(&entries);
    let complete = matches.len() == scheduled && played == scheduled;
    debug!(
        group = %group,
        played,
        ties = tie_groups.len(),
        complete,
        "group standings computed"
    );

    Ok(GroupStandings {
        group,
        entries,
        tie_groups,
        complete,
    })
}

fn apply_result(entry: &mut StandingEntry, scored: i32, conceded: i32) {
    entry.played += 1;
    entry.goals_for += scored as u32;
    entry.goals_against += conceded as u32;
    entry.goal_difference += scored - conceded;
    entry.points += match scored.cmp(&conceded) {
        std::cmp::Ordering::Greater => 3,
        std::cmp::Ordering::Equal => 1,
        std::cmp::Ordering::Less => 0,
    };
}

/// Runs of consecutive entries with identical (points, GD, GF) triples.
fn collect_tie_groups(entries: &[StandingEntry]) -> Vec<Vec<TeamId>> {
    let mut groups = Vec::new();
    let mut run: Vec<TeamId> = Vec::new();
    for pair in entries.windows(2) {
        if pair[0].criteria() == pair[1].criteria() {
            if run.is_empty() {
                run.push(pair[0].team);
            }
            run.push(pair[1].team);
        } else if !run.is_empty() {
            groups.push(std::mem::take(&mut run));
        }
    }
    if !run.is_empty() {
        groups.push(run);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_match(group: char, index: u8, home: TeamId, away: TeamId, score: Option<(i32, i32)>) -> GroupMatch {
        GroupMatch {
            group,
            index,
            home,
            away,
            home_score: score.map(|(h, _)| h),
            away_score: score.map(|(_, a)| a),
        }
    }

    /// Full schedule where team 1 wins everything, 2 beats 3 and 4, 3 beats 4:
    /// 9 pts at +5, 6 pts at +1, 3 pts at -2, 0 pts at -4.
    fn decided_group() -> Vec<GroupMatch> {
        vec![
            make_match('A', 0, 1, 2, Some((2, 0))),
            make_match('A', 1, 3, 4, Some((1, 0))),
            make_match('A', 2, 1, 3, Some((2, 0))),
            make_match('A', 3, 2, 4, Some((2, 0))),
            make_match('A', 4, 1, 4, Some((1, 0))),
            make_match('A', 5, 2, 3, Some((1, 0))),
        ]
    }

    #[test]
    fn fully_decided_group_orders_by_points() {
        let standings =
            compute_group_standings('A', &[1, 2, 3, 4], &decided_group(), 6).unwrap();
        let order: Vec<TeamId> = standings.entries.iter().map(|e| e.team).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert!(standings.tie_groups.is_empty());
        assert!(standings.complete);

        let top = &standings.entries[0];
        assert_eq!((top.points, top.goal_difference, top.rank), (9, 5, 1));
        let bottom = &standings.entries[3];
        assert_eq!((bottom.points, bottom.goal_difference, bottom.rank), (0, -4, 4));
    }

    #[test]
    fn partial_schedule_is_rankable_but_not_complete() {
        let matches = vec![
            make_match('A', 0, 1, 2, Some((1, 0))),
            make_match('A', 1, 3, 4, None),
        ];
        let standings = compute_group_standings('A', &[1, 2, 3, 4], &matches, 6).unwrap();
        assert!(!standings.complete);
        assert_eq!(standings.entries[0].team, 1);
        // Teams 3 and 4 have not played: identical zero triples, one tie group.
        assert_eq!(standings.tie_groups.len(), 1);
        assert_eq!(standings.tie_groups[0], vec![3, 4]);
    }

    #[test]
    fn goal_difference_breaks_equal_points() {
        let matches = vec![
            make_match('B', 0, 5, 6, Some((3, 0))),
            make_match('B', 1, 6, 5, Some((1, 0))),
        ];
        let standings = compute_group_standings('B', &[5, 6], &matches, 2).unwrap();
        assert_eq!(standings.entries[0].team, 5);
        assert!(standings.tie_groups.is_empty());
    }

    #[test]
    fn identical_triples_share_a_tie_group() {
        // Both matches drawn with the same score: everything equal.
        let matches = vec![
            make_match('C', 0, 7, 8, Some((1, 1))),
            make_match('C', 1, 8, 7, Some((0, 0))),
        ];
        let standings = compute_group_standings('C', &[7, 8], &matches, 2).unwrap();
        assert_eq!(standings.tie_groups, vec![vec![7, 8]]);
        // Provisional order follows the supplied team order.
        assert_eq!(standings.entries[0].team, 7);
    }

    #[test]
    fn foreign_team_rejected() {
        let matches = vec![make_match('A', 0, 1, 99, Some((1, 0)))];
        let err = compute_group_standings('A', &[1, 2], &matches, 1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn negative_score_rejected() {
        let matches = vec![make_match('A', 0, 1, 2, Some((-1, 0)))];
        let err = compute_group_standings('A', &[1, 2], &matches, 1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn duplicate_schedule_index_rejected() {
        let matches = vec![
            make_match('A', 0, 1, 2, Some((1, 0))),
            make_match('A', 0, 2, 1, Some((1, 0))),
        ];
        let err = compute_group_standings('A', &[1, 2], &matches, 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
