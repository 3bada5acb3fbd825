//! Tournament format configuration.
//!
//! Everything that is fixed per competition edition lives here as one
//! explicit, immutable value passed into every pipeline call: group letters
//! and size, qualification counts, the declarative knockout topology, the
//! third-place combination table, and the scoring values. There is no
//! process-wide format state, so multiple formats/seasons can be computed
//! side by side without interference.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{GroupLetter, KnockoutMatchDef, MatchKey, PlayoffId, Round, Slot};

/// One row of the third-place combination table: which groups' thirds
/// qualified, and which best-third berth each of them occupies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThirdPlaceRow {
    /// Sorted qualifying group letters: the lookup key.
    pub groups: Vec<GroupLetter>,
    /// Letter occupying each berth, indexed by berth number.
    pub berths: Vec<GroupLetter>,
}

/// Fixed point values for the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Predicted group position exactly matches the real final position.
    pub exact_position: u32,
    /// Predicted and real position both inside the direct-qualification cut
    /// without an exact match.
    pub qualifier: u32,
    /// Correctly predicted playoff winner, per playoff.
    pub playoff_winner: u32,
    /// Correctly selected qualifying third-place group, per group.
    pub third_place_qualifier: u32,
    /// Award for a correct knockout winner, indexed by [`Round::index`].
    pub round_points: [u32; 6],
    /// Additional bonus for predicting the outright champion.
    pub champion_bonus: u32,
}

impl ScoringRules {
    pub fn round_award(&self, round: Round) -> u32 {
        self.round_points[round.index()]
    }
}

/// The complete format of one competition edition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentFormat {
    /// Group letters in draw order.
    pub group_letters: Vec<GroupLetter>,
    /// Teams per group.
    pub group_size: u8,
    /// Top-N per group qualify for the knockout stage directly.
    pub qualifying_positions: u8,
    /// How many third-placed teams qualify via the combination table.
    pub third_place_count: u8,
    /// The knockout stage as one declarative table, match key to two typed
    /// source slots, consumed uniformly by the propagator.
    pub topology: Vec<KnockoutMatchDef>,
    pub third_place_table: Vec<ThirdPlaceRow>,
    pub scoring: ScoringRules,
}

impl TournamentFormat {
    /// Scheduled matches per group: a full single round-robin.
    pub fn matches_per_group(&self) -> usize {
        let n = self.group_size as usize;
        n * (n - 1) / 2
    }

    /// Playoff ids referenced by the knockout topology.
    pub fn playoff_ids(&self) -> BTreeSet<PlayoffId> {
        self.topology
            .iter()
            .flat_map(|def| def.slots.iter())
            .filter_map(|slot| match slot {
                Slot::PlayoffWinner(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn match_def(&self, key: MatchKey) -> Option<&KnockoutMatchDef> {
        self.topology.iter().find(|def| def.key == key)
    }

    /// Structural validation. Run once per pipeline call; all findings are
    /// `InvalidInput`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.group_letters.is_empty() {
            return Err(EngineError::invalid("format has no groups"));
        }
        let letters: HashSet<GroupLetter> = self.group_letters.iter().copied().collect();
        if letters.len() != self.group_letters.len() {
            return Err(EngineError::invalid("duplicate group letters"));
        }
        if self.group_size < 2 {
            return Err(EngineError::invalid("groups need at least two teams"));
        }
        if self.qualifying_positions == 0 || self.qualifying_positions > self.group_size {
            return Err(EngineError::invalid(format!(
                "qualifying_positions {} out of range for group size {}",
                self.qualifying_positions, self.group_size
            )));
        }
        if self.third_place_count > 0 {
            if self.third_place_count as usize > self.group_letters.len() {
                return Err(EngineError::invalid(
                    "third_place_count exceeds the number of groups",
                ));
            }
            if self.group_size <= self.qualifying_positions {
                return Err(EngineError::invalid(
                    "third-place qualification needs a position below the direct cut",
                ));
            }
        }

        self.validate_topology(&letters)?;
        self.validate_third_place_table(&letters)?;

        let points = &self.scoring.round_points;
        if points.windows(2).any(|w| w[1] < w[0]) {
            return Err(EngineError::invalid(
                "round_points must not decrease from round of 32 to final",
            ));
        }
        Ok(())
    }

    fn validate_topology(&self, letters: &HashSet<GroupLetter>) -> Result<(), EngineError> {
        let mut keys = HashSet::new();
        let mut slots_seen = Vec::new();
        let mut finals = 0usize;
        let mut third_place_matches = 0usize;

        for def in &self.topology {
            if !keys.insert(def.key) {
                return Err(EngineError::invalid(format!(
                    "duplicate knockout match key {}",
                    def.key
                )));
            }
            match def.key.round {
                Round::Final => finals += 1,
                Round::ThirdPlace => third_place_matches += 1,
                _ => {}
            }
            for slot in &def.slots {
                if slots_seen.contains(slot) {
                    return Err(EngineError::invalid(format!(
                        "slot {slot} feeds more than one match"
                    )));
                }
                slots_seen.push(*slot);
                match slot {
                    Slot::Team(_) => {}
                    Slot::GroupPosition { group, position } => {
                        if !letters.contains(group) {
                            return Err(EngineError::invalid(format!(
                                "slot references unknown group {group}"
                            )));
                        }
                        if *position == 0 || *position > self.group_size {
                            return Err(EngineError::invalid(format!(
                                "group position {position} out of range"
                            )));
                        }
                    }
                    Slot::BestThird { berth } => {
                        if *berth >= self.third_place_count {
                            return Err(EngineError::invalid(format!(
                                "best-third berth {berth} out of range"
                            )));
                        }
                    }
                    Slot::PlayoffWinner(_) => {}
                    Slot::WinnerOf(source) | Slot::LoserOf(source) => {
                        if !self.topology.iter().any(|d| d.key == *source) {
                            return Err(EngineError::invalid(format!(
                                "slot references unknown match {source}"
                            )));
                        }
                        if source.round >= def.key.round {
                            return Err(EngineError::invalid(format!(
                                "match {} draws from {}, which is not an earlier round",
                                def.key, source
                            )));
                        }
                    }
                }
            }
        }
        if finals != 1 {
            return Err(EngineError::invalid("topology must contain exactly one final"));
        }
        if third_place_matches > 1 {
            return Err(EngineError::invalid(
                "topology may contain at most one third-place match",
            ));
        }
        Ok(())
    }

    fn validate_third_place_table(
        &self,
        letters: &HashSet<GroupLetter>,
    ) -> Result<(), EngineError> {
        let count = self.third_place_count as usize;
        for row in &self.third_place_table {
            if row.groups.len() != count || row.berths.len() != count {
                return Err(EngineError::invalid(format!(
                    "combination row {:?} does not cover {count} qualifiers",
                    row.groups
                )));
            }
            if row.groups.windows(2).any(|w| w[0] >= w[1]) {
                return Err(EngineError::invalid(format!(
                    "combination row {:?} is not sorted",
                    row.groups
                )));
            }
            let row_set: HashSet<GroupLetter> = row.groups.iter().copied().collect();
            if !row_set.is_subset(letters) {
                return Err(EngineError::invalid(format!(
                    "combination row {:?} names unknown groups",
                    row.groups
                )));
            }
            let berth_set: HashSet<GroupLetter> = row.berths.iter().copied().collect();
            if berth_set != row_set {
                return Err(EngineError::invalid(format!(
                    "combination row {:?} berths are not a permutation of its groups",
                    row.groups
                )));
            }
        }
        Ok(())
    }
}

// ── Built-in 48-team format ──────────────────────────────────────────────────

/// Best-third berths, tied to the round-of-32 match each one feeds:
/// berth 0 -> R32#0, 1 -> R32#6, 2 -> R32#12, 3 -> R32#13, 4 -> R32#14,
/// 5 -> R32#15.
const BEST_THIRD_BERTHS: u8 = 6;

/// Published third-place combination rows: (qualifying letters, letter per
/// berth). No berth pairs a third with a side from its own group.
/// Combinations not listed here fail with `NoMatchingCombination`.
const THIRD_PLACE_ROWS: &[(&str, &str)] = &[
    ("ABCDEF", "CAFBDE"),
    ("ABCDEG", "EGCABD"),
    ("ABCDEH", "HAECDB"),
    ("ABCDEL", "LAECBD"),
    ("ABCDFG", "GCFABD"),
    ("ABCEFG", "FAGECB"),
    ("ABCJKL", "KJCABL"),
    ("ABDEFG", "DGBFAE"),
    ("ABGHIL", "GLHAIB"),
    ("ACDEFG", "ECGAFD"),
    ("AEFHKL", "EAFHKL"),
    ("BCDEFG", "CFBGDE"),
    ("CDEIJK", "IDJECK"),
    ("DEFGHI", "FHDGIE"),
    ("GHIJKL", "HJGIKL"),
];

impl TournamentFormat {
    /// The built-in 48-team finals format: 12 groups of four, the top two of
    /// each group plus the six best thirds plus the winners of two play-in
    /// playoffs enter a 32-team single-elimination bracket.
    pub fn world_cup_48() -> Self {
        let winner = |g: char| Slot::GroupPosition { group: g, position: 1 };
        let second = |g: char| Slot::GroupPosition { group: g, position: 2 };
        let third = |berth: u8| Slot::BestThird { berth };
        let key = MatchKey::new;

        let mut topology = Vec::with_capacity(32);

        // Round of 32. No pairing rematches two sides of the same group;
        // the combination table keeps each best-third berth away from its
        // own group's opponents too.
        let r32: [(Slot, Slot); 16] = [
            (winner('A'), third(0)),
            (winner('C'), second('B')),
            (winner('E'), second('D')),
            (winner('G'), second('F')),
            (winner('I'), second('H')),
            (winner('K'), second('J')),
            (winner('B'), third(1)),
            (winner('D'), second('C')),
            (winner('F'), second('E')),
            (winner('H'), second('G')),
            (winner('J'), second('I')),
            (winner('L'), second('K')),
            (second('A'), third(2)),
            (second('L'), third(3)),
            (Slot::PlayoffWinner(1), third(4)),
            (Slot::PlayoffWinner(2), third(5)),
        ];
        for (i, (home, away)) in r32.into_iter().enumerate() {
            topology.push(KnockoutMatchDef {
                key: key(Round::RoundOf32, i as u8),
                slots: [home, away],
            });
        }

        // Later rounds pair adjacent winners of the previous round.
        for i in 0..8u8 {
            topology.push(KnockoutMatchDef {
                key: key(Round::RoundOf16, i),
                slots: [
                    Slot::WinnerOf(key(Round::RoundOf32, 2 * i)),
                    Slot::WinnerOf(key(Round::RoundOf32, 2 * i + 1)),
                ],
            });
        }
        for i in 0..4u8 {
            topology.push(KnockoutMatchDef {
                key: key(Round::Quarterfinal, i),
                slots: [
                    Slot::WinnerOf(key(Round::RoundOf16, 2 * i)),
                    Slot::WinnerOf(key(Round::RoundOf16, 2 * i + 1)),
                ],
            });
        }
        for i in 0..2u8 {
            topology.push(KnockoutMatchDef {
                key: key(Round::Semifinal, i),
                slots: [
                    Slot::WinnerOf(key(Round::Quarterfinal, 2 * i)),
                    Slot::WinnerOf(key(Round::Quarterfinal, 2 * i + 1)),
                ],
            });
        }
        // The third-place match draws the semifinal losers, never winners.
        topology.push(KnockoutMatchDef {
            key: key(Round::ThirdPlace, 0),
            slots: [
                Slot::LoserOf(key(Round::Semifinal, 0)),
                Slot::LoserOf(key(Round::Semifinal, 1)),
            ],
        });
        topology.push(KnockoutMatchDef {
            key: key(Round::Final, 0),
            slots: [
                Slot::WinnerOf(key(Round::Semifinal, 0)),
                Slot::WinnerOf(key(Round::Semifinal, 1)),
            ],
        });

        let third_place_table = THIRD_PLACE_ROWS
            .iter()
            .map(|(groups, berths)| ThirdPlaceRow {
                groups: groups.chars().collect(),
                berths: berths.chars().collect(),
            })
            .collect();

        TournamentFormat {
            group_letters: ('A'..='L').collect(),
            group_size: 4,
            qualifying_positions: 2,
            third_place_count: BEST_THIRD_BERTHS,
            topology,
            third_place_table,
            scoring: ScoringRules {
                exact_position: 5,
                qualifier: 2,
                playoff_winner: 4,
                third_place_qualifier: 1,
                round_points: [2, 3, 4, 6, 8, 8],
                champion_bonus: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_format_is_valid() {
        let format = TournamentFormat::world_cup_48();
        format.validate().expect("built-in format should validate");
        assert_eq!(format.topology.len(), 16 + 8 + 4 + 2 + 1 + 1);
        assert_eq!(format.matches_per_group(), 6);
        assert_eq!(
            format.playoff_ids().into_iter().collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn every_round_of_32_entrant_is_distinct() {
        let format = TournamentFormat::world_cup_48();
        let r32_slots: Vec<_> = format
            .topology
            .iter()
            .filter(|d| d.key.round == Round::RoundOf32)
            .flat_map(|d| d.slots.iter())
            .collect();
        assert_eq!(r32_slots.len(), 32);
        for (i, a) in r32_slots.iter().enumerate() {
            for b in &r32_slots[i + 1..] {
                assert_ne!(a, b, "slot {a} appears twice in the round of 32");
            }
        }
    }

    #[test]
    fn combination_rows_are_permutations() {
        let format = TournamentFormat::world_cup_48();
        assert!(!format.third_place_table.is_empty());
        for row in &format.third_place_table {
            let mut sorted = row.berths.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, row.groups, "row {:?} is not a permutation", row.groups);
        }
    }

    #[test]
    fn duplicate_match_key_rejected() {
        let mut format = TournamentFormat::world_cup_48();
        let dup = format.topology[0].clone();
        format.topology.push(dup);
        assert!(matches!(
            format.validate(),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn backwards_dependency_rejected() {
        let mut format = TournamentFormat::world_cup_48();
        // Point a round-of-32 slot at the final.
        format.topology[0].slots[0] = Slot::WinnerOf(MatchKey::new(Round::Final, 0));
        assert!(matches!(
            format.validate(),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn decreasing_round_points_rejected() {
        let mut format = TournamentFormat::world_cup_48();
        format.scoring.round_points = [4, 3, 4, 6, 8, 8];
        assert!(matches!(
            format.validate(),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn round_award_uses_round_index() {
        let rules = TournamentFormat::world_cup_48().scoring;
        assert_eq!(rules.round_award(Round::RoundOf32), 2);
        assert_eq!(rules.round_award(Round::Final), 8);
    }
}
