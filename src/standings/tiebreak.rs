//! Tiebreak resolution for teams with identical table criteria.
//!
//! The cascade works exclusively on matches among the tied teams: points in
//! that mini-table, then its goal difference, then its goals scored. The
//! first criterion that separates anyone wins; each remaining cluster gets
//! the full cascade again, recomputed among the smaller subset. A pair the
//! mini-table cannot separate falls back to overall goal difference and
//! goals for. Whatever is left is reported as an [`UnresolvableTie`]; the
//! engine never orders such teams itself (fair-play points and drawings of
//! lots are data the caller records and feeds back as a [`TieResolution`]).

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::EngineError;
use crate::model::{
    GroupLetter, GroupMatch, StandingEntry, TeamId, TieContext, TieCriterion, TieResolution,
    UnresolvableTie,
};

/// Recorded manual resolutions, keyed by (group, sorted tied-team tuple) for
/// exact-match application.
pub type TieOverrides = BTreeMap<(GroupLetter, Vec<TeamId>), TieResolution>;

/// Outcome of one tiebreak attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TieOutcome {
    /// A total order over the tie group, best first.
    Resolved(Vec<TeamId>),
    /// The statistical cascade is exhausted; a recorded decision is needed.
    Unresolvable(UnresolvableTie),
}

/// Index recorded resolutions by their exact-match key.
///
/// Fails with `InvalidInput` when a record's team list is not sorted and
/// unique, its order is not a permutation of its teams, or the same tie is
/// recorded twice.
pub fn build_overrides(resolutions: &[TieResolution]) -> Result<TieOverrides, EngineError> {
    let mut overrides = TieOverrides::new();
    for res in resolutions {
        if res.teams.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EngineError::invalid(format!(
                "tie resolution for group {} must list teams sorted and unique",
                res.group
            )));
        }
        let mut order_sorted = res.order.clone();
        order_sorted.sort_unstable();
        if order_sorted != res.teams {
            return Err(EngineError::invalid(format!(
                "tie resolution order {:?} is not a permutation of teams {:?}",
                res.order, res.teams
            )));
        }
        let key = (res.group, res.teams.clone());
        if overrides.insert(key, res.clone()).is_some() {
            return Err(EngineError::invalid(format!(
                "duplicate tie resolution for group {} teams {:?}",
                res.group, res.teams
            )));
        }
    }
    Ok(overrides)
}

/// Resolve the order of one tie group.
///
/// `matches` are the full set of the group's matches (the mini-table is
/// derived from the ones played among the tied teams); `overall` is the
/// group's computed table, used by the two-team fallback. A matching
/// override is applied verbatim, without re-running the cascade, so the
/// same recorded decision always reproduces the same order.
pub fn resolve_tie(
    group: GroupLetter,
    tied: &[TeamId],
    matches: &[GroupMatch],
    overall: &[StandingEntry],
    overrides: &TieOverrides,
) -> Result<TieOutcome, EngineError> {
    if tied.len() < 2 {
        return Err(EngineError::invalid(format!(
            "tie group in group {group} needs at least two teams"
        )));
    }
    let overall_by_team: HashMap<TeamId, &StandingEntry> =
        overall.iter().map(|e| (e.team, e)).collect();
    for team in tied {
        if !overall_by_team.contains_key(team) {
            return Err(EngineError::invalid(format!(
                "tied team {team} is not in group {group}'s table"
            )));
        }
    }

    match resolve_subset(group, tied, matches, &overall_by_team, overrides) {
        Ok(order) => {
            debug!(group = %group, ?order, "tie resolved");
            Ok(TieOutcome::Resolved(order))
        }
        Err(tie) => Ok(TieOutcome::Unresolvable(tie)),
    }
}

/// Per-team totals over the matches played among a tied subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
struct MiniRecord {
    points: u32,
    goal_difference: i32,
    goals_for: u32,
}

fn resolve_subset(
    group: GroupLetter,
    subset: &[TeamId],
    matches: &[GroupMatch],
    overall: &HashMap<TeamId, &StandingEntry>,
    overrides: &TieOverrides,
) -> Result<Vec<TeamId>, UnresolvableTie> {
    let mut key_teams = subset.to_vec();
    key_teams.sort_unstable();
    if let Some(res) = overrides.get(&(group, key_teams)) {
        debug!(group = %group, teams = ?subset, "applying recorded tie resolution");
        return Ok(res.order.clone());
    }

    let mini = mini_table(subset, matches);

    // First criterion that separates anyone wins; clusters it leaves behind
    // get the cascade again, recomputed among the smaller subset.
    let criteria: [fn(&MiniRecord) -> i64; 3] = [
        |r| r.points as i64,
        |r| r.goal_difference as i64,
        |r| r.goals_for as i64,
    ];
    for stat in criteria {
        let clusters = cluster_by(subset, |team| stat(&mini[&team]));
        if clusters.len() > 1 {
            let mut order = Vec::with_capacity(subset.len());
            for cluster in clusters {
                if cluster.len() == 1 {
                    order.extend(cluster);
                } else {
                    order.extend(resolve_subset(group, &cluster, matches, overall, overrides)?);
                }
            }
            return Ok(order);
        }
    }

    // The mini-table is spent. For exactly two teams, fall back to the
    // overall table's goal difference and goals for.
    if subset.len() == 2 {
        let fallbacks: [fn(&StandingEntry) -> i64; 2] = [
            |e| e.goal_difference as i64,
            |e| e.goals_for as i64,
        ];
        for stat in fallbacks {
            let clusters = cluster_by(subset, |team| stat(overall[&team]));
            if clusters.len() == 2 {
                return Ok(clusters.into_iter().flatten().collect());
            }
        }
    }

    Err(UnresolvableTie {
        context: TieContext::Group(group),
        teams: subset.to_vec(),
        exhausted: TieCriterion::HeadToHead,
    })
}

fn mini_table(subset: &[TeamId], matches: &[GroupMatch]) -> HashMap<TeamId, MiniRecord> {
    let mut mini: HashMap<TeamId, MiniRecord> =
        subset.iter().map(|&t| (t, MiniRecord::default())).collect();
    for m in matches {
        if !mini.contains_key(&m.home) || !mini.contains_key(&m.away) {
            continue;
        }
        let Some((home_goals, away_goals)) = m.score() else {
            continue;
        };
        for (team, scored, conceded) in [
            (m.home, home_goals, away_goals),
            (m.away, away_goals, home_goals),
        ] {
            if let Some(rec) = mini.get_mut(&team) {
                record(rec, scored, conceded);
            }
        }
    }
    mini
}

fn record(rec: &mut MiniRecord, scored: i32, conceded: i32) {
    rec.goals_for += scored as u32;
    rec.goal_difference += scored - conceded;
    rec.points += match scored.cmp(&conceded) {
        std::cmp::Ordering::Greater => 3,
        std::cmp::Ordering::Equal => 1,
        std::cmp::Ordering::Less => 0,
    };
}

/// Split `teams` into clusters of equal stat value, best first, preserving
/// the incoming order within a cluster.
fn cluster_by(teams: &[TeamId], stat: impl Fn(TeamId) -> i64) -> Vec<Vec<TeamId>> {
    let mut values: Vec<i64> = teams.iter().map(|&t| stat(t)).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    values.dedup();

    values
        .into_iter()
        .map(|v| {
            teams
                .iter()
                .copied()
                .filter(|&t| stat(t) == v)
                .collect::<Vec<_>>()
        })
        .collect()
}
