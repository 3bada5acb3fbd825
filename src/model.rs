use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Team identifier from the reference table.
pub type TeamId = u32;

/// Group letter (A–L in the built-in format).
pub type GroupLetter = char;

/// Identifier of a play-in playoff bracket.
pub type PlayoffId = u32;

/// A team in the reference table. Immutable input data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Group assignment; `None` for playoff-only entrants.
    pub group: Option<GroupLetter>,
}

/// One scheduled group-stage match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMatch {
    pub group: GroupLetter,
    /// Position in the group's fixed schedule (0–5 for a four-team group).
    pub index: u8,
    pub home: TeamId,
    pub away: TeamId,
    /// `None` until the match has been played.
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

impl GroupMatch {
    /// Both scores, if the match has been played.
    pub fn score(&self) -> Option<(i32, i32)> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => Some((h, a)),
            _ => None,
        }
    }
}

/// One row of a computed group table. Derived, recomputed on every call;
/// never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub team: TeamId,
    pub played: u8,
    pub points: u32,
    pub goal_difference: i32,
    pub goals_for: u32,
    pub goals_against: u32,
    /// 1-based position within the group after ordering.
    pub rank: u8,
}

impl StandingEntry {
    /// The composite sort key: points, then goal difference, then goals for.
    pub fn criteria(&self) -> (u32, i32, u32) {
        (self.points, self.goal_difference, self.goals_for)
    }
}

/// An ordered group table plus any subsets the numeric criteria could not
/// separate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStandings {
    pub group: GroupLetter,
    /// Entries in ranked order, best first.
    pub entries: Vec<StandingEntry>,
    /// Subsets (size >= 2) with identical (points, GD, GF) triples, in table
    /// order. Empty once every position is settled.
    pub tie_groups: Vec<Vec<TeamId>>,
    /// Whether every scheduled match in the group has a score.
    pub complete: bool,
}

impl GroupStandings {
    /// A table is final when the schedule is complete and no tie remains.
    pub fn is_final(&self) -> bool {
        self.complete && self.tie_groups.is_empty()
    }

    pub fn entry(&self, team: TeamId) -> Option<&StandingEntry> {
        self.entries.iter().find(|e| e.team == team)
    }

    pub fn team_at(&self, rank: u8) -> Option<TeamId> {
        self.entries.iter().find(|e| e.rank == rank).map(|e| e.team)
    }
}

/// Where a tie was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieContext {
    /// Within one group's table.
    Group(GroupLetter),
    /// Across groups, in the third-place qualification table.
    ThirdPlaceTable,
}

impl fmt::Display for TieContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieContext::Group(g) => write!(f, "group {g}"),
            TieContext::ThirdPlaceTable => write!(f, "third-place table"),
        }
    }
}

/// Tiebreak criteria, in cascade order. `FairPlay` and `DrawingOfLots` are
/// caller-supplied data, never computed by the engine; they appear only in
/// recorded [`TieResolution`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieCriterion {
    Points,
    GoalDifference,
    GoalsFor,
    HeadToHead,
    FairPlay,
    DrawingOfLots,
}

impl fmt::Display for TieCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TieCriterion::Points => "points",
            TieCriterion::GoalDifference => "goal difference",
            TieCriterion::GoalsFor => "goals for",
            TieCriterion::HeadToHead => "head-to-head",
            TieCriterion::FairPlay => "fair play",
            TieCriterion::DrawingOfLots => "drawing of lots",
        };
        f.write_str(s)
    }
}

/// Signal that a subset of teams cannot be ordered by the statistical
/// criteria. Transient: the caller records a resolution externally and feeds
/// it back as a [`TieResolution`] on the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvableTie {
    pub context: TieContext,
    /// The still-tied teams, in current table order.
    pub teams: Vec<TeamId>,
    /// The last criterion the engine exhausted before giving up.
    pub exhausted: TieCriterion,
}

impl fmt::Display for UnresolvableTie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "teams {:?} in {} remain tied after {}",
            self.teams, self.context, self.exhausted
        )
    }
}

/// An externally recorded resolution of a previously reported tie. Keyed by
/// (group letter, sorted tied-team tuple) so it applies only to the exact
/// same tie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieResolution {
    pub group: GroupLetter,
    /// The tied teams, sorted ascending: the exact-match lookup key.
    pub teams: Vec<TeamId>,
    /// Total order over `teams`, best first.
    pub order: Vec<TeamId>,
    /// Which external criterion settled it.
    pub resolved_by: TieCriterion,
    pub recorded_at: DateTime<Utc>,
}

/// A play-in playoff bracket feeding one knockout slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayoffTie {
    pub id: PlayoffId,
    pub shape: PlayoffShape,
}

/// The two playoff shapes used by the competition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlayoffShape {
    /// Two semifinal pairings; the winners meet in the final.
    TwoSemifinals {
        semi_one: (TeamId, TeamId),
        semi_two: (TeamId, TeamId),
    },
    /// One semifinal pairing; the winner meets a seeded team in the final.
    SemifinalWithBye {
        semi: (TeamId, TeamId),
        seeded: TeamId,
    },
}

/// Winner selections for one playoff: real recorded results or a user's
/// picks, depending on the mode the pipeline runs in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayoffSelection {
    pub playoff: PlayoffId,
    /// One winner per semifinal, in definition order.
    pub semifinal_winners: Vec<TeamId>,
    pub final_winner: TeamId,
}

/// Knockout rounds in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Round {
    RoundOf32,
    RoundOf16,
    Quarterfinal,
    Semifinal,
    ThirdPlace,
    Final,
}

impl Round {
    pub const IN_ORDER: [Round; 6] = [
        Round::RoundOf32,
        Round::RoundOf16,
        Round::Quarterfinal,
        Round::Semifinal,
        Round::ThirdPlace,
        Round::Final,
    ];

    /// Index into per-round tables (scoring values).
    pub fn index(self) -> usize {
        match self {
            Round::RoundOf32 => 0,
            Round::RoundOf16 => 1,
            Round::Quarterfinal => 2,
            Round::Semifinal => 3,
            Round::ThirdPlace => 4,
            Round::Final => 5,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Round::RoundOf32 => "R32",
            Round::RoundOf16 => "R16",
            Round::Quarterfinal => "QF",
            Round::Semifinal => "SF",
            Round::ThirdPlace => "3P",
            Round::Final => "F",
        }
    }
}

/// Stable identifier of one knockout match: round plus index within round.
/// Serialized as its string form (`"R32#7"`) so it can key maps in the
/// exchanged JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MatchKey {
    pub round: Round,
    pub index: u8,
}

impl MatchKey {
    pub fn new(round: Round, index: u8) -> Self {
        MatchKey { round, index }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.round.code(), self.index)
    }
}

impl std::str::FromStr for MatchKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, index) = s
            .split_once('#')
            .ok_or_else(|| format!("malformed match key {s:?}"))?;
        let round = Round::IN_ORDER
            .into_iter()
            .find(|r| r.code() == code)
            .ok_or_else(|| format!("unknown round {code:?} in match key"))?;
        let index = index
            .parse()
            .map_err(|_| format!("malformed match index in {s:?}"))?;
        Ok(MatchKey { round, index })
    }
}

impl From<MatchKey> for String {
    fn from(key: MatchKey) -> String {
        key.to_string()
    }
}

impl TryFrom<String> for MatchKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Where a knockout match draws one participant from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    /// A fixed team.
    Team(TeamId),
    /// The team ranked `position` (1-based) in a group's final table.
    GroupPosition { group: GroupLetter, position: u8 },
    /// One of the best-third berths assigned by the third-place ranker.
    BestThird { berth: u8 },
    /// The winner of a play-in playoff.
    PlayoffWinner(PlayoffId),
    /// The winner of an earlier knockout match.
    WinnerOf(MatchKey),
    /// The loser of an earlier knockout match (the third-place match draws
    /// the two semifinal losers).
    LoserOf(MatchKey),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Team(id) => write!(f, "team {id}"),
            Slot::GroupPosition { group, position } => {
                write!(f, "group {group} position {position}")
            }
            Slot::BestThird { berth } => write!(f, "best-third berth {berth}"),
            Slot::PlayoffWinner(id) => write!(f, "winner of playoff {id}"),
            Slot::WinnerOf(key) => write!(f, "winner of {key}"),
            Slot::LoserOf(key) => write!(f, "loser of {key}"),
        }
    }
}

/// One entry of the declarative knockout topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnockoutMatchDef {
    pub key: MatchKey,
    /// Home slot, then away slot.
    pub slots: [Slot; 2],
}

/// A caller-supplied winner selection for one knockout match: a real
/// recorded result or a user's pick. Scores are carried through unchanged;
/// the engine never interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnockoutPick {
    pub key: MatchKey,
    pub winner: TeamId,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

/// A knockout match with its participants dereferenced and, once a winner
/// selection exists, its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMatch {
    pub key: MatchKey,
    pub home: TeamId,
    pub away: TeamId,
    /// `None` while no winner selection has been supplied.
    pub winner: Option<TeamId>,
    pub loser: Option<TeamId>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

/// The fully propagated knockout bracket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketResolution {
    /// Every match whose participants could be dereferenced, by key.
    pub matches: BTreeMap<MatchKey, ResolvedMatch>,
    pub champion: Option<TeamId>,
    pub runner_up: Option<TeamId>,
    pub third_place: Option<TeamId>,
}

/// Outcome of the third-place ranking: which groups' thirds qualified and
/// which best-third berth each qualifier occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdPlaceQualification {
    /// Qualifying group letters, sorted ascending.
    pub qualified: Vec<GroupLetter>,
    /// Berth index to qualifying team.
    pub berths: BTreeMap<u8, TeamId>,
    /// All third-placed teams in ranking order, best first.
    pub table: Vec<TeamId>,
}

/// Aggregate outcome of one pipeline run. Two instances coexist per scoring
/// operation: the user's predicted state and the official real state. The
/// engine never retains one across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentState {
    pub standings: BTreeMap<GroupLetter, GroupStandings>,
    pub playoff_winners: BTreeMap<PlayoffId, TeamId>,
    pub third_place: Option<ThirdPlaceQualification>,
    pub bracket: BracketResolution,
}

/// The immutable input snapshot one pipeline run consumes. For official
/// standings this is administrator-entered result data; for a preview it is
/// a user's prediction in the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TournamentInput {
    pub teams: Vec<Team>,
    pub group_matches: Vec<GroupMatch>,
    pub tie_resolutions: Vec<TieResolution>,
    pub playoffs: Vec<PlayoffTie>,
    pub playoff_selections: Vec<PlayoffSelection>,
    pub knockout_picks: Vec<KnockoutPick>,
}
