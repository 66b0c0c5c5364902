//! # Decathlon: Optimal Dice Decathlon Solver
//!
//! Computes the optimal policy and the exact mean and standard deviation of the
//! final score for two events of the dice decathlon, using **memoized backward
//! induction** over finite, acyclic state spaces.
//!
//! ## Events
//!
//! | Event | Module | Decision | State space |
//! |-------|--------|----------|-------------|
//! | 100 metres (sprint) | [`sprint`] | freeze the set or reroll all four dice | 6 × 126 first-set + 6 × 126 × 45 second-set |
//! | Long jump | [`long_jump`] | stop, or freeze the k smallest (run-up) / k largest (jump) dice | 1556 run-up + 461 jump |
//!
//! ## Pipeline
//!
//! | Step | Module | Description |
//! |------|--------|-------------|
//! | 0 | [`dice_mechanics`] | Canonical outcomes of 0..=5 dice with multinomial probabilities, built once |
//! | 1 | [`sprint`], [`long_jump`] | Per-state evaluation and memoized recursion |
//! | 2 | [`state_computation`] | Whole-space drivers; sprint layers solved in parallel with rayon |
//! | 3 | [`density`] | Exact score PMFs under the optimal policy, best of k attempts |
//! | 4 | [`storage`] | Binary policy files, memory-mapped lookup |
//!
//! ## Moments
//!
//! Every state stores `(E[X], E[X²])` of the final score, see [`types::Moments`].
//! Chance nodes mix children with outcome probabilities; the SD follows as
//! `sqrt(max(0, E[X²] − E[X]²))`.
//!
//! ## Action choice
//!
//! Higher EV wins by at least [`constants::TIE_EPSILON`]; closer EVs are
//! broken by lower SD, then by the more conservative action. See [`policy`].

#![allow(clippy::needless_range_loop)]

pub mod constants;
pub mod density;
pub mod dice_mechanics;
pub mod env_config;
pub mod error;
pub mod game_mechanics;
pub mod long_jump;
pub mod policy;
pub mod sprint;
pub mod state_computation;
pub mod storage;
pub mod types;
