//! Outcome enumeration: every distinct unordered roll of n dice and its probability.
//!
//! An outcome is stored canonically as per-face counts. Probabilities follow the
//! multinomial formula
//!
//! ```text
//! P(counts) = n! / (c1! * c2! * ... * c6!) / 6^n
//! ```
//!
//! Tables for n = 0..=5 are built once per process on first use and shared by
//! every state that rolls the same number of dice.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{DecathlonError, Result};

/// n! for n in 0..=5.
const FACTORIAL: [u32; MAX_DICE + 1] = [1, 1, 2, 6, 24, 120];

/// Unordered multiset of die faces, stored as counts per face.
///
/// `counts[f - 1]` is the number of dice showing face `f`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Outcome {
    counts: [u8; FACES],
}

/// An outcome paired with its probability under independent fair dice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedOutcome {
    pub outcome: Outcome,
    pub probability: f64,
}

impl Outcome {
    /// Build from per-face counts. Rejects more than [`MAX_DICE`] dice.
    pub fn from_counts(counts: [u8; FACES]) -> Result<Self> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total > MAX_DICE {
            return Err(DecathlonError::InvalidState(format!(
                "outcome has {total} dice, at most {MAX_DICE} supported"
            )));
        }
        Ok(Self { counts })
    }

    /// Build from die faces in any order.
    pub fn from_dice(dice: &[u8]) -> Result<Self> {
        if dice.len() > MAX_DICE {
            return Err(DecathlonError::InvalidState(format!(
                "outcome has {} dice, at most {MAX_DICE} supported",
                dice.len()
            )));
        }
        let mut counts = [0u8; FACES];
        for &d in dice {
            if !(1..=FACES as u8).contains(&d) {
                return Err(DecathlonError::InvalidState(format!(
                    "die face {d} outside 1..={FACES}"
                )));
            }
            counts[(d - 1) as usize] += 1;
        }
        Ok(Self { counts })
    }

    pub fn counts(&self) -> [u8; FACES] {
        self.counts
    }

    /// Number of dice showing `face` (1..=6).
    #[inline]
    pub fn count(&self, face: u8) -> u8 {
        self.counts[(face - 1) as usize]
    }

    /// Number of dice in the outcome.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all faces.
    pub fn sum(&self) -> u32 {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| (i as u32 + 1) * c as u32)
            .sum()
    }

    /// Faces in ascending order.
    pub fn sorted_dice(&self) -> Vec<u8> {
        let mut dice = Vec::with_capacity(self.len());
        for (i, &c) in self.counts.iter().enumerate() {
            for _ in 0..c {
                dice.push(i as u8 + 1);
            }
        }
        dice
    }

    /// Faces in ascending order as a fixed-size array. `N` must equal [`Outcome::len`].
    pub fn to_array<const N: usize>(&self) -> [u8; N] {
        debug_assert_eq!(self.len(), N, "outcome size mismatch");
        let mut out = [0u8; N];
        for (slot, face) in out.iter_mut().zip(self.sorted_dice()) {
            *slot = face;
        }
        out
    }

    /// Sum of the `k` smallest dice (k is clamped to the outcome size).
    pub fn smallest_sum(&self, k: usize) -> u32 {
        take_sum(self.counts.iter().enumerate(), k)
    }

    /// Sum of the `k` largest dice (k is clamped to the outcome size).
    pub fn largest_sum(&self, k: usize) -> u32 {
        take_sum(self.counts.iter().enumerate().rev(), k)
    }

    /// Exact probability of rolling this multiset with `len()` fair dice.
    pub fn probability(&self) -> f64 {
        let n = self.len();
        let mut denominator = 1u32;
        for &c in &self.counts {
            denominator *= FACTORIAL[c as usize];
        }
        let permutations = (FACTORIAL[n] / denominator) as f64;
        permutations / (FACES as f64).powi(n as i32)
    }
}

fn take_sum<'a>(faces: impl Iterator<Item = (usize, &'a u8)>, k: usize) -> u32 {
    let mut needed = k;
    let mut sum = 0u32;
    for (i, &c) in faces {
        if needed == 0 {
            break;
        }
        let take = needed.min(c as usize);
        sum += (i as u32 + 1) * take as u32;
        needed -= take;
    }
    sum
}

/// Sort dice ascending in place.
pub fn sort_dice<const N: usize>(dice: &mut [u8; N]) {
    dice.sort_unstable();
}

/// Count occurrences of each face. `face_count[0]` is unused; `face_count[f]` = count of face f.
pub fn count_faces(dice: &[u8]) -> [u8; FACES + 1] {
    let mut face_count = [0u8; FACES + 1];
    for &d in dice {
        face_count[d as usize] += 1;
    }
    face_count
}

/// Enumerate all canonical outcomes of `n` dice in ascending lexicographic order
/// of their sorted faces, with multinomial probabilities.
pub fn enumerate_outcomes(n: usize) -> Vec<WeightedOutcome> {
    assert!(n <= MAX_DICE, "dice count {n} exceeds {MAX_DICE}");
    let mut out = Vec::with_capacity(num_outcomes(n));
    let mut counts = [0u8; FACES];
    extend_outcomes(&mut counts, 0, n, &mut out);
    out
}

fn extend_outcomes(
    counts: &mut [u8; FACES],
    min_face: usize,
    left: usize,
    out: &mut Vec<WeightedOutcome>,
) {
    if left == 0 {
        let outcome = Outcome { counts: *counts };
        out.push(WeightedOutcome {
            outcome,
            probability: outcome.probability(),
        });
        return;
    }
    for face in min_face..FACES {
        counts[face] += 1;
        extend_outcomes(counts, face, left - 1, out);
        counts[face] -= 1;
    }
}

static OUTCOME_TABLES: OnceLock<[Vec<WeightedOutcome>; MAX_DICE + 1]> = OnceLock::new();

/// Cached outcome table for `n` dice (0..=5).
///
/// `n = 0` yields the single empty outcome with probability 1.
pub fn outcomes(n: usize) -> &'static [WeightedOutcome] {
    assert!(n <= MAX_DICE, "dice count {n} exceeds {MAX_DICE}");
    let tables = OUTCOME_TABLES.get_or_init(|| std::array::from_fn(enumerate_outcomes));
    &tables[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_counts_match_combinations() {
        for n in 0..=MAX_DICE {
            assert_eq!(outcomes(n).len(), num_outcomes(n), "n={n}");
        }
        assert_eq!(outcomes(SPRINT_DICE).len(), 126);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        for n in 0..=MAX_DICE {
            let sum: f64 = outcomes(n).iter().map(|w| w.probability).sum();
            assert!((sum - 1.0).abs() < 1e-9, "n={n} sum={sum}");
        }
    }

    #[test]
    fn test_probability() {
        let p1 = Outcome::from_dice(&[1, 1, 1, 1]).unwrap().probability();
        assert!((p1 - 1.0 / 1296.0).abs() < 1e-15);

        let p2 = Outcome::from_dice(&[1, 2, 3, 4]).unwrap().probability();
        assert!((p2 - 24.0 / 1296.0).abs() < 1e-15);

        let p3 = Outcome::from_dice(&[2, 2, 5, 5, 5]).unwrap().probability();
        assert!((p3 - 10.0 / 7776.0).abs() < 1e-15);
    }

    #[test]
    fn test_enumeration_order() {
        let four = outcomes(4);
        assert_eq!(four[0].outcome.to_array::<4>(), [1, 1, 1, 1]);
        assert_eq!(four[125].outcome.to_array::<4>(), [6, 6, 6, 6]);
        for w in four.windows(2) {
            assert!(w[0].outcome.sorted_dice() < w[1].outcome.sorted_dice());
        }
    }

    #[test]
    fn test_smallest_and_largest_sum() {
        let o = Outcome::from_dice(&[5, 1, 3, 1, 6]).unwrap();
        assert_eq!(o.smallest_sum(1), 1);
        assert_eq!(o.smallest_sum(2), 2);
        assert_eq!(o.smallest_sum(3), 5);
        assert_eq!(o.largest_sum(1), 6);
        assert_eq!(o.largest_sum(2), 11);
        assert_eq!(o.largest_sum(5), 16);
        assert_eq!(o.smallest_sum(9), 16);
    }

    #[test]
    fn test_from_dice_rejects_bad_faces() {
        assert!(Outcome::from_dice(&[0, 1]).is_err());
        assert!(Outcome::from_dice(&[7]).is_err());
        assert!(Outcome::from_dice(&[1, 1, 1, 1, 1, 1]).is_err());
        assert!(Outcome::from_counts([3, 3, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_count_faces() {
        let fc = count_faces(&[1, 1, 2, 6]);
        assert_eq!(fc[1], 2);
        assert_eq!(fc[2], 1);
        assert_eq!(fc[6], 1);
        assert_eq!(fc[3], 0);
    }

    #[test]
    fn test_sort_dice() {
        let mut d = [6, 2, 5, 1];
        sort_dice(&mut d);
        assert_eq!(d, [1, 2, 5, 6]);
    }
}
