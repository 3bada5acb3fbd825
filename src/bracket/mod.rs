//! Knockout bracket propagation.
//!
//! The propagator walks the declarative topology strictly in round order and
//! dereferences each match's two source slots: fixed teams, group
//! positions, best-third berths, playoff winners, and the winner or loser
//! of an earlier match. Deciding who wins a resolved pairing is the
//! caller's job (real recorded results or a user's picks, via
//! [`KnockoutPick`]s); the propagator only sequences and dereferences.
//!
//! A match whose sources cannot be dereferenced yet is collected as a
//! scoped [`BracketIssue`] and skipped; independent branches keep
//! resolving, so a half-played tournament still yields every bracket
//! position that is actually decidable. Nothing is ever defaulted to a
//! placeholder team.

pub mod playoff;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::EngineError;
use crate::model::{
    BracketResolution, GroupLetter, GroupStandings, KnockoutMatchDef, KnockoutPick, MatchKey,
    PlayoffId, ResolvedMatch, Round, Slot, TeamId, ThirdPlaceQualification,
};

/// Resolved inputs the propagator dereferences slots against.
#[derive(Debug, Clone, Copy)]
pub struct BracketContext<'a> {
    pub standings: &'a BTreeMap<GroupLetter, GroupStandings>,
    pub third_place: Option<&'a ThirdPlaceQualification>,
    pub playoff_winners: &'a BTreeMap<PlayoffId, TeamId>,
}

/// A failure scoped to one knockout match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketIssue {
    pub key: MatchKey,
    pub error: EngineError,
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone)]
pub struct Propagation {
    pub bracket: BracketResolution,
    pub issues: Vec<BracketIssue>,
}

/// Propagate the bracket as far as the supplied inputs allow.
pub fn propagate_bracket(
    topology: &[KnockoutMatchDef],
    ctx: &BracketContext<'_>,
    picks: &[KnockoutPick],
) -> Propagation {
    let mut issues = Vec::new();

    let mut picks_by_key: BTreeMap<MatchKey, &KnockoutPick> = BTreeMap::new();
    for pick in picks {
        if !topology.iter().any(|def| def.key == pick.key) {
            issues.push(BracketIssue {
                key: pick.key,
                error: EngineError::invalid(format!(
                    "pick targets {}, which is not in the topology",
                    pick.key
                )),
            });
            continue;
        }
        if picks_by_key.insert(pick.key, pick).is_some() {
            issues.push(BracketIssue {
                key: pick.key,
                error: EngineError::invalid(format!("duplicate pick for {}", pick.key)),
            });
        }
    }

    let mut ordered: Vec<&KnockoutMatchDef> = topology.iter().collect();
    ordered.sort_by_key(|def| def.key);

    let mut matches: BTreeMap<MatchKey, ResolvedMatch> = BTreeMap::new();
    for def in ordered {
        let sides = def
            .slots
            .iter()
            .map(|slot| resolve_slot(slot, def.key, ctx, &matches))
            .collect::<Result<Vec<TeamId>, EngineError>>();
        let (home, away) = match sides {
            Ok(sides) => (sides[0], sides[1]),
            Err(error) => {
                debug!(key = %def.key, %error, "match not yet resolvable");
                issues.push(BracketIssue { key: def.key, error });
                continue;
            }
        };

        let mut resolved = ResolvedMatch {
            key: def.key,
            home,
            away,
            winner: None,
            loser: None,
            home_score: None,
            away_score: None,
        };
        if let Some(pick) = picks_by_key.get(&def.key) {
            if pick.winner == home || pick.winner == away {
                resolved.winner = Some(pick.winner);
                resolved.loser = Some(if pick.winner == home { away } else { home });
                resolved.home_score = pick.home_score;
                resolved.away_score = pick.away_score;
            } else {
                issues.push(BracketIssue {
                    key: def.key,
                    error: EngineError::invalid(format!(
                        "picked winner {} plays in neither side of {}",
                        pick.winner, def.key
                    )),
                });
            }
        }
        matches.insert(def.key, resolved);
    }

    let final_match = matches
        .values()
        .find(|m| m.key.round == Round::Final && m.winner.is_some());
    let third_match = matches
        .values()
        .find(|m| m.key.round == Round::ThirdPlace && m.winner.is_some());

    let bracket = BracketResolution {
        champion: final_match.and_then(|m| m.winner),
        runner_up: final_match.and_then(|m| m.loser),
        third_place: third_match.and_then(|m| m.winner),
        matches,
    };
    debug!(
        resolved = bracket.matches.len(),
        open_issues = issues.len(),
        "bracket propagated"
    );
    Propagation { bracket, issues }
}

fn resolve_slot(
    slot: &Slot,
    key: MatchKey,
    ctx: &BracketContext<'_>,
    matches: &BTreeMap<MatchKey, ResolvedMatch>,
) -> Result<TeamId, EngineError> {
    match slot {
        Slot::Team(id) => Ok(*id),
        Slot::GroupPosition { group, position } => {
            let standings = ctx.standings.get(group).ok_or_else(|| {
                EngineError::UnresolvedDependency {
                    key,
                    missing: format!("standings for group {group}"),
                }
            })?;
            if !standings.is_final() {
                return Err(EngineError::UnresolvedDependency {
                    key,
                    missing: format!("final standings for group {group}"),
                });
            }
            standings.team_at(*position).ok_or_else(|| {
                EngineError::invalid(format!("group {group} has no position {position}"))
            })
        }
        Slot::BestThird { berth } => {
            let qualification =
                ctx.third_place
                    .ok_or_else(|| EngineError::UnresolvedDependency {
                        key,
                        missing: "third-place qualification".into(),
                    })?;
            qualification.berths.get(berth).copied().ok_or_else(|| {
                EngineError::invalid(format!("no team assigned to best-third berth {berth}"))
            })
        }
        Slot::PlayoffWinner(id) => {
            ctx.playoff_winners
                .get(id)
                .copied()
                .ok_or_else(|| EngineError::UnresolvedDependency {
                    key,
                    missing: format!("winner of playoff {id}"),
                })
        }
        Slot::WinnerOf(source) => matches
            .get(source)
            .and_then(|m| m.winner)
            .ok_or_else(|| EngineError::UnresolvedDependency {
                key,
                missing: format!("winner of {source}"),
            }),
        Slot::LoserOf(source) => matches
            .get(source)
            .and_then(|m| m.loser)
            .ok_or_else(|| EngineError::UnresolvedDependency {
                key,
                missing: format!("loser of {source}"),
            }),
    }
}
