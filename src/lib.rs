//! Deterministic tournament outcome computation engine.
//!
//! The core of a prediction game for a 48-team football tournament: users
//! submit predicted group standings, playoff outcomes and bracket winners,
//! and the same engine that computes the official tournament state from
//! real results also previews a user's in-progress prediction. Both runs
//! must agree bit for bit, so everything here is a pure, synchronous
//! computation over an immutable input snapshot:
//!
//! - **standings** ranks each group and flags ties the numeric criteria
//!   cannot settle; the tiebreak cascade works on head-to-head mini-tables
//!   and honours externally recorded resolutions
//! - **third place** ranks the third-placed teams across groups and maps
//!   the qualifying set to fixed bracket berths via the combination table
//! - **playoff** resolution feeds play-in winners into the bracket
//! - **bracket** propagation dereferences the declarative knockout topology
//!   round by round (the third-place match draws the semifinal losers)
//! - **scoring** compares a predicted state against the real one and
//!   awards the format's fixed point values
//!
//! The engine performs no I/O, persists nothing, and shares no mutable
//! state between calls; concurrent callers need no coordination. HTTP,
//! storage, authentication and rendering are the surrounding service's
//! concern. Failures are scoped and collected (see [`pipeline`]), so one
//! unresolved group never hides the other eleven.

pub mod bracket;
pub mod error;
pub mod format;
pub mod model;
pub mod pipeline;
pub mod scoring;
pub mod standings;

pub use bracket::playoff::resolve_playoff;
pub use bracket::{propagate_bracket, BracketContext, BracketIssue, Propagation};
pub use error::EngineError;
pub use format::{ScoringRules, ThirdPlaceRow, TournamentFormat};
pub use model::{
    BracketResolution, GroupLetter, GroupMatch, GroupStandings, KnockoutMatchDef, KnockoutPick,
    MatchKey, PlayoffId, PlayoffSelection, PlayoffShape, PlayoffTie, ResolvedMatch, Round, Slot,
    StandingEntry, Team, TeamId, ThirdPlaceQualification, TieContext, TieCriterion, TieResolution,
    TournamentInput, TournamentState, UnresolvableTie,
};
pub use pipeline::{compute_tournament, IssueScope, ScopedIssue, TournamentComputation};
pub use scoring::{score_prediction, ScoreBreakdown};
pub use standings::third_place::rank_third_places;
pub use standings::tiebreak::{build_overrides, resolve_tie, TieOutcome, TieOverrides};
pub use standings::compute_group_standings;
