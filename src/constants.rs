//! Event rules and table sizes for the Dice Decathlon solvers.
//!
//! - Sprint (100 metres): two sets of [`SPRINT_DICE`] dice, [`SPRINT_MAX_REROLLS`]
//!   rerolls shared across both sets, a six counts as [`SIX_PENALTY`].
//! - Long jump: [`JUMP_DICE`] dice, run-up frozen sum capped at [`RUNUP_CEILING`].

/// Number of faces on a die.
pub const FACES: usize = 6;

/// Dice rolled per sprint set.
pub const SPRINT_DICE: usize = 4;

/// Rerolls available for the whole sprint event.
pub const SPRINT_MAX_REROLLS: u8 = 5;

/// Score contributed by a die showing six in a sprint set.
pub const SIX_PENALTY: i32 = -6;

/// Lowest possible sprint set score: four sixes.
pub const MIN_SET_SCORE: i32 = SPRINT_DICE as i32 * SIX_PENALTY;

/// Highest possible sprint set score: four fives.
pub const MAX_SET_SCORE: i32 = SPRINT_DICE as i32 * 5;

/// Number of distinct sorted 4-dice multisets: C(9,4) = 126.
pub const NUM_SPRINT_OUTCOMES: usize = 126;

/// Dice in the long jump pool.
pub const JUMP_DICE: usize = 5;

/// Maximum frozen sum allowed during the run-up.
pub const RUNUP_CEILING: u8 = 8;

/// Largest dice count the outcome enumerator supports.
pub const MAX_DICE: usize = 5;

/// Absolute EV difference below which two actions are considered tied.
pub const TIE_EPSILON: f64 = 1e-12;

/// Policy file magic number: "DCTH" in little-endian.
pub const POLICY_FILE_MAGIC: u32 = 0x4854_4344;

/// Policy file format version.
pub const POLICY_FILE_VERSION: u32 = 1;

/// Size of the policy file header in bytes.
pub const POLICY_HEADER_SIZE: usize = 32;

/// Binomial coefficient C(n, k) for small arguments.
#[inline]
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc = 1usize;
    for i in 0..k {
        acc = acc * (n - i) / (i + 1);
    }
    acc
}

/// Number of distinct canonical outcomes of `n` six-sided dice: C(n+5, 5).
#[inline]
pub fn num_outcomes(n: usize) -> usize {
    binomial(n + FACES - 1, FACES - 1)
}
