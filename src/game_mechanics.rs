//! Scoring rules shared by the event solvers.

use crate::constants::*;

/// Score of one sprint set: face values summed, except a six counts as [`SIX_PENALTY`].
#[inline]
pub fn score_set(dice: &[u8; SPRINT_DICE]) -> i32 {
    dice.iter()
        .map(|&d| if d == FACES as u8 { SIX_PENALTY } else { d as i32 })
        .sum()
}

/// True if `frozen_sum` is still a legal run-up total.
#[inline]
pub fn within_runup_ceiling(frozen_sum: u32) -> bool {
    frozen_sum <= RUNUP_CEILING as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_set() {
        assert_eq!(score_set(&[1, 1, 1, 1]), 4);
        assert_eq!(score_set(&[5, 5, 6, 6]), -2);
        assert_eq!(score_set(&[5, 5, 5, 5]), MAX_SET_SCORE);
        assert_eq!(score_set(&[6, 6, 6, 6]), MIN_SET_SCORE);
        assert_eq!(score_set(&[1, 2, 3, 6]), 0);
    }

    #[test]
    fn test_runup_ceiling() {
        assert!(within_runup_ceiling(0));
        assert!(within_runup_ceiling(8));
        assert!(!within_runup_ceiling(9));
    }
}
