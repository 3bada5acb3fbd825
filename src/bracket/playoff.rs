//! Play-in playoff resolution.
//!
//! Playoffs are two-legged eliminations with a mandated winner, so there is
//! no tiebreak logic here: the resolver only composes the supplied winner
//! selections (real results or a user's picks) into the single team the
//! playoff feeds onward.

use crate::error::EngineError;
use crate::model::{PlayoffSelection, PlayoffShape, PlayoffTie, TeamId};

fn pick_winner(
    pairing: (TeamId, TeamId),
    selected: TeamId,
    what: &str,
) -> Result<TeamId, EngineError> {
    if selected == pairing.0 || selected == pairing.1 {
        Ok(selected)
    } else {
        Err(EngineError::invalid(format!(
            "{what} winner {selected} is not one of {} and {}",
            pairing.0, pairing.1
        )))
    }
}

/// Resolve one playoff to its winner.
///
/// The selection must name one winner per semifinal, each a participant of
/// its pairing, and a final winner drawn from the two resulting finalists.
pub fn resolve_playoff(
    tie: &PlayoffTie,
    selection: &PlayoffSelection,
) -> Result<TeamId, EngineError> {
    if selection.playoff != tie.id {
        return Err(EngineError::invalid(format!(
            "selection for playoff {} applied to playoff {}",
            selection.playoff, tie.id
        )));
    }

    let finalists = match &tie.shape {
        PlayoffShape::TwoSemifinals { semi_one, semi_two } => {
            let &[w1, w2] = selection.semifinal_winners.as_slice() else {
                return Err(EngineError::invalid(format!(
                    "playoff {} needs two semifinal winners",
                    tie.id
                )));
            };
            (
                pick_winner(*semi_one, w1, "semifinal")?,
                pick_winner(*semi_two, w2, "semifinal")?,
            )
        }
        PlayoffShape::SemifinalWithBye { semi, seeded } => {
            let &[w] = selection.semifinal_winners.as_slice() else {
                return Err(EngineError::invalid(format!(
                    "playoff {} needs exactly one semifinal winner",
                    tie.id
                )));
            };
            (pick_winner(*semi, w, "semifinal")?, *seeded)
        }
    };

    pick_winner(finalists, selection.final_winner, "final")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_semis() -> PlayoffTie {
        PlayoffTie {
            id: 1,
            shape: PlayoffShape::TwoSemifinals {
                semi_one: (101, 102),
                semi_two: (103, 104),
            },
        }
    }

    fn with_bye() -> PlayoffTie {
        PlayoffTie {
            id: 2,
            shape: PlayoffShape::SemifinalWithBye {
                semi: (105, 106),
                seeded: 107,
            },
        }
    }

    fn selection(playoff: u32, semis: &[TeamId], final_winner: TeamId) -> PlayoffSelection {
        PlayoffSelection {
            playoff,
            semifinal_winners: semis.to_vec(),
            final_winner,
        }
    }

    #[test]
    fn two_semifinal_playoff_resolves_to_final_winner() {
        let winner = resolve_playoff(&two_semis(), &selection(1, &[102, 103], 103)).unwrap();
        assert_eq!(winner, 103);
    }

    #[test]
    fn bye_playoff_lets_the_seeded_team_win_the_final() {
        let winner = resolve_playoff(&with_bye(), &selection(2, &[106], 107)).unwrap();
        assert_eq!(winner, 107);
    }

    #[test]
    fn semifinal_winner_must_be_a_participant() {
        let err = resolve_playoff(&two_semis(), &selection(1, &[999, 103], 103)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn final_winner_must_be_a_finalist() {
        // 104 lost its semifinal to 103, so it cannot win the final.
        let err = resolve_playoff(&two_semis(), &selection(1, &[101, 103], 104)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn selection_must_target_the_same_playoff() {
        let err = resolve_playoff(&two_semis(), &selection(2, &[101, 103], 101)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn wrong_semifinal_count_rejected() {
        let err = resolve_playoff(&with_bye(), &selection(2, &[105, 106], 105)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
