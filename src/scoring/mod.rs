//! Prediction scoring.
//!
//! Compares a user's predicted tournament state against the official one
//! and awards the fixed point values of the format's
//! [`ScoringRules`](crate::format::ScoringRules).
//! Scoring is computed only for categories where real results exist: a
//! half-played tournament simply contributes nothing for the undecided
//! parts. Pure comparison, no side effects.

use serde::{Deserialize, Serialize};

use crate::format::TournamentFormat;
use crate::model::TournamentState;

/// Points earned per category plus the grand total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Exact-position and qualifier awards across all scored groups.
    pub group_stage: u32,
    /// Correctly predicted playoff winners.
    pub playoffs: u32,
    /// Correctly selected third-place qualifier groups.
    pub third_place: u32,
    /// Correct knockout winners, split by round (`Round::index` order).
    pub knockout_by_round: [u32; 6],
    /// Champion bonus, awarded at most once.
    pub champion_bonus: u32,
    pub total: u32,
}

/// Score a predicted state against the real one.
pub fn score_prediction(
    format: &TournamentFormat,
    predicted: &TournamentState,
    real: &TournamentState,
) -> ScoreBreakdown {
    let rules = &format.scoring;
    let cut = format.qualifying_positions;
    let mut score = ScoreBreakdown::default();

    // Group stage: a group scores once its real table is final, against a
    // final predicted table for the same group.
    for (letter, real_group) in &real.standings {
        if !real_group.is_final() {
            continue;
        }
        let Some(pred_group) = predicted.standings.get(letter) else {
            continue;
        };
        if !pred_group.is_final() {
            continue;
        }
        for real_entry in &real_group.entries {
            let Some(pred_entry) = pred_group.entry(real_entry.team) else {
                continue;
            };
            if pred_entry.rank == real_entry.rank {
                score.group_stage += rules.exact_position;
            } else if pred_entry.rank <= cut && real_entry.rank <= cut {
                score.group_stage += rules.qualifier;
            }
        }
    }

    for (playoff, real_winner) in &real.playoff_winners {
        if predicted.playoff_winners.get(playoff) == Some(real_winner) {
            score.playoffs += rules.playoff_winner;
        }
    }

    if let (Some(pred_qual), Some(real_qual)) = (&predicted.third_place, &real.third_place) {
        for letter in &real_qual.qualified {
            if pred_qual.qualified.contains(letter) {
                score.third_place += rules.third_place_qualifier;
            }
        }
    }

    // Knockout: a match scores only when the predicted winner for the same
    // match key equals the real winner.
    for (key, real_match) in &real.bracket.matches {
        let Some(real_winner) = real_match.winner else {
            continue;
        };
        let predicted_winner = predicted
            .bracket
            .matches
            .get(key)
            .and_then(|m| m.winner);
        if predicted_winner == Some(real_winner) {
            score.knockout_by_round[key.round.index()] += rules.round_award(key.round);
        }
    }
    if real.bracket.champion.is_some() && predicted.bracket.champion == real.bracket.champion {
        score.champion_bonus = rules.champion_bonus;
    }

    score.total = score.group_stage
        + score.playoffs
        + score.third_place
        + score.knockout_by_round.iter().sum::<u32>()
        + score.champion_bonus;
    score
}
