use thiserror::Error;

use crate::model::{GroupLetter, MatchKey, UnresolvableTie};

/// Errors and required-decision signals produced by the engine.
///
/// `UnresolvableTie` is not a computation failure: it tells the caller a
/// decision (fair-play data, drawing of lots, an admin ruling) is needed
/// before the affected table can be finalised. Everything is reported
/// synchronously as a structured result; nothing is ever coerced to a
/// default (an unresolved tie is never auto-ordered by team id).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed or out-of-range input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A subset of teams cannot be ordered by the statistical criteria;
    /// resolution requires an externally supplied total order.
    #[error("{0}")]
    UnresolvableTie(UnresolvableTie),

    /// The realized set of qualifying third-place groups has no row in the
    /// format's combination table. A known competition-format constraint,
    /// surfaced as an incomplete tournament state.
    #[error("no qualifying combination for third-place groups {groups:?}")]
    NoMatchingCombination { groups: Vec<GroupLetter> },

    /// A knockout match was asked to resolve before both of its source
    /// slots were resolvable.
    #[error("match {key} depends on {missing}, which is not yet resolved")]
    UnresolvedDependency { key: MatchKey, missing: String },
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}
