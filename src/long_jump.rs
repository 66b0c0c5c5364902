//! Long jump: state space and memoized moment-propagating solver.
//!
//! One attempt uses a pool of five dice in two phases.
//!
//! **Run-up.** Roll the remaining dice, then freeze the k smallest (k ≥ 1) as
//! long as the total frozen in the run-up stays within [`RUNUP_CEILING`], or
//! stop. Freeze choices that would break the ceiling are not offered. Stopping,
//! or freezing the last die, starts the jump with as many dice as were frozen
//! during the run-up.
//!
//! **Jump.** Roll the remaining jump dice and freeze the k largest (k ≥ 1).
//! Every die frozen in the jump adds its face to the attempt score.
//!
//! Decision points ([`JumpState`]) sit after a roll; chance nodes
//! ([`PreRoll`]) sit before one. Each action strictly lowers the number of
//! dice left in its phase or moves from run-up to jump, so the graph is acyclic.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::dice_mechanics::{outcomes, Outcome};
use crate::error::{DecathlonError, Result};
use crate::game_mechanics::within_runup_ceiling;
use crate::policy::select_best;
use crate::types::{Moments, SolverConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JumpPhase {
    RunUp { frozen_sum: u8 },
    Jump,
}

/// Validate a run-up position: `dice_left` still to roll, `frozen_sum` already frozen.
fn check_run_up(dice_left: usize, frozen_sum: u8) -> Result<()> {
    let frozen = JUMP_DICE - dice_left;
    let lo = frozen as u32;
    let hi = (frozen * FACES) as u32;
    let sum = frozen_sum as u32;
    if !within_runup_ceiling(sum) || sum < lo || sum > hi {
        return Err(DecathlonError::InvalidState(format!(
            "run-up frozen sum {frozen_sum} impossible with {frozen} frozen dice (ceiling {RUNUP_CEILING})"
        )));
    }
    Ok(())
}

/// Post-roll decision point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JumpState {
    phase: JumpPhase,
    roll: Outcome,
}

impl JumpState {
    pub fn new(phase: JumpPhase, roll: Outcome) -> Result<Self> {
        let n = roll.len();
        if !(1..=JUMP_DICE).contains(&n) {
            return Err(DecathlonError::InvalidState(format!(
                "long jump roll has {n} dice, expected 1..={JUMP_DICE}"
            )));
        }
        if let JumpPhase::RunUp { frozen_sum } = phase {
            check_run_up(n, frozen_sum)?;
        }
        Ok(Self { phase, roll })
    }

    pub fn run_up(frozen_sum: u8, roll: Outcome) -> Result<Self> {
        Self::new(JumpPhase::RunUp { frozen_sum }, roll)
    }

    pub fn jump(roll: Outcome) -> Result<Self> {
        Self::new(JumpPhase::Jump, roll)
    }

    pub fn phase(&self) -> JumpPhase {
        self.phase
    }

    pub fn roll(&self) -> Outcome {
        self.roll
    }

    /// Dice rolled in this state (all of them are still unfrozen).
    pub fn dice_remaining(&self) -> usize {
        self.roll.len()
    }
}

/// Chance node before a roll of `dice` dice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PreRoll {
    phase: JumpPhase,
    dice: u8,
}

impl PreRoll {
    /// Start of an attempt: five dice, nothing frozen.
    pub fn start() -> Self {
        Self {
            phase: JumpPhase::RunUp { frozen_sum: 0 },
            dice: JUMP_DICE as u8,
        }
    }

    /// Validate and normalise. A run-up with no dice left is a five-dice jump.
    pub fn new(phase: JumpPhase, dice: u8) -> Result<Self> {
        if dice as usize > JUMP_DICE {
            return Err(DecathlonError::InvalidState(format!(
                "long jump pre-roll has {dice} dice, at most {JUMP_DICE}"
            )));
        }
        if let JumpPhase::RunUp { frozen_sum } = phase {
            check_run_up(dice as usize, frozen_sum)?;
        }
        Ok(Self::normalized(phase, dice))
    }

    fn normalized(phase: JumpPhase, dice: u8) -> Self {
        match phase {
            JumpPhase::RunUp { .. } if dice == 0 => Self {
                phase: JumpPhase::Jump,
                dice: JUMP_DICE as u8,
            },
            _ => Self { phase, dice },
        }
    }

    pub fn phase(&self) -> JumpPhase {
        self.phase
    }

    pub fn dice(&self) -> u8 {
        self.dice
    }

    pub(crate) fn rolled(&self, outcome: &Outcome) -> JumpState {
        JumpState {
            phase: self.phase,
            roll: *outcome,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpAction {
    /// End the run-up and jump with the dice frozen so far.
    Stop,
    /// Freeze this many dice: smallest first in the run-up, largest first in the jump.
    Freeze(u8),
}

impl JumpAction {
    /// Dice frozen by this action; `Stop` freezes none.
    pub fn freeze_count(&self) -> u8 {
        match self {
            JumpAction::Stop => 0,
            JumpAction::Freeze(k) => *k,
        }
    }

    pub fn from_freeze_count(k: u8) -> Self {
        if k == 0 {
            JumpAction::Stop
        } else {
            JumpAction::Freeze(k)
        }
    }
}

impl fmt::Display for JumpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpAction::Stop => f.write_str("stop"),
            JumpAction::Freeze(k) => write!(f, "freeze {k}"),
        }
    }
}

/// Solved long jump decision point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JumpResult {
    pub best: Moments,
    pub action: JumpAction,
    /// `options[k]`: moments of freezing k dice (`options[0]` is stop).
    /// `None` marks actions that are not legal in this state.
    pub options: [Option<Moments>; JUMP_DICE + 1],
}

impl JumpResult {
    pub fn option(&self, action: JumpAction) -> Option<Moments> {
        self.options
            .get(action.freeze_count() as usize)
            .copied()
            .flatten()
    }
}

/// Chance node reached by taking `action` in `state`, with the points it banks.
///
/// Returns `None` for illegal actions: stopping during the jump, freezing more
/// dice than were rolled, or a run-up freeze that would pass the ceiling.
pub fn successor(state: &JumpState, action: JumpAction) -> Option<(PreRoll, u32)> {
    let n = state.roll.len();
    let k = action.freeze_count() as usize;
    if k > n {
        return None;
    }
    match (state.phase, action) {
        (_, JumpAction::Freeze(0)) | (JumpPhase::Jump, JumpAction::Stop) => None,
        (JumpPhase::RunUp { .. }, JumpAction::Stop) => Some((
            PreRoll::normalized(JumpPhase::Jump, (JUMP_DICE - n) as u8),
            0,
        )),
        (JumpPhase::RunUp { frozen_sum }, JumpAction::Freeze(_)) => {
            let total = frozen_sum as u32 + state.roll.smallest_sum(k);
            within_runup_ceiling(total).then(|| {
                let next = JumpPhase::RunUp {
                    frozen_sum: total as u8,
                };
                (PreRoll::normalized(next, (n - k) as u8), 0)
            })
        }
        (JumpPhase::Jump, JumpAction::Freeze(_)) => Some((
            PreRoll::normalized(JumpPhase::Jump, (n - k) as u8),
            state.roll.largest_sum(k),
        )),
    }
}

/// One step of the recursion: evaluate every legal action of `state` given the
/// value of the chance nodes it leads to.
pub fn evaluate_jump_state(
    state: &JumpState,
    tie_epsilon: f64,
    mut pre_roll_value: impl FnMut(PreRoll) -> Moments,
) -> JumpResult {
    let mut options = [None; JUMP_DICE + 1];
    for (k, slot) in options.iter_mut().enumerate().take(state.roll.len() + 1) {
        let action = JumpAction::from_freeze_count(k as u8);
        if let Some((pre, banked)) = successor(state, action) {
            *slot = Some(pre_roll_value(pre).shift(banked as f64));
        }
    }

    let mut legal = options
        .iter()
        .enumerate()
        .filter_map(|(k, m)| m.map(|m| (JumpAction::from_freeze_count(k as u8), m)));
    let Some(first) = legal.next() else {
        unreachable!("stop or freeze-one is always legal");
    };
    let (action, best) = select_best(first, legal, tie_epsilon);

    JumpResult {
        best,
        action,
        options,
    }
}

/// Every valid post-roll state: run-up states for each consistent frozen sum,
/// and jump states, for 1..=5 dice.
pub fn jump_state_space() -> Vec<JumpState> {
    let mut states = Vec::new();
    for n in 1..=JUMP_DICE {
        let frozen = JUMP_DICE - n;
        let hi = (frozen * FACES).min(RUNUP_CEILING as usize);
        for frozen_sum in frozen..=hi {
            for w in outcomes(n) {
                states.push(JumpState {
                    phase: JumpPhase::RunUp {
                        frozen_sum: frozen_sum as u8,
                    },
                    roll: w.outcome,
                });
            }
        }
    }
    for n in 1..=JUMP_DICE {
        for w in outcomes(n) {
            states.push(JumpState {
                phase: JumpPhase::Jump,
                roll: w.outcome,
            });
        }
    }
    states
}

/// Owns the memo tables for the long jump.
#[derive(Debug, Default)]
pub struct JumpSolver {
    config: SolverConfig,
    memo: HashMap<JumpState, JumpResult>,
    pre_roll: HashMap<PreRoll, Moments>,
}

impl JumpSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            memo: HashMap::new(),
            pre_roll: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve a decision point, reusing every previously solved state.
    pub fn solve(&mut self, state: JumpState) -> JumpResult {
        if let Some(res) = self.memo.get(&state) {
            return *res;
        }
        let tie_epsilon = self.config.tie_epsilon;
        let res = evaluate_jump_state(&state, tie_epsilon, |pre| self.solve_pre_roll(pre));
        self.memo.insert(state, res);
        res
    }

    /// Value of a chance node under optimal play.
    pub fn solve_pre_roll(&mut self, pre: PreRoll) -> Moments {
        if let Some(m) = self.pre_roll.get(&pre) {
            return *m;
        }
        let m = if pre.dice == 0 {
            Moments::ZERO
        } else {
            Moments::mixture(
                outcomes(pre.dice as usize)
                    .iter()
                    .map(|w| (w.probability, self.solve(pre.rolled(&w.outcome)).best)),
            )
        };
        self.pre_roll.insert(pre, m);
        m
    }

    /// Value of one full attempt from the first run-up roll.
    pub fn attempt_moments(&mut self) -> Moments {
        self.solve_pre_roll(PreRoll::start())
    }

    pub fn get(&self, state: &JumpState) -> Option<&JumpResult> {
        self.memo.get(state)
    }

    /// Iterate over every solved decision point.
    pub fn results(&self) -> impl Iterator<Item = (&JumpState, &JumpResult)> {
        self.memo.iter()
    }

    /// Iterate over every solved chance node.
    pub fn pre_roll_values(&self) -> impl Iterator<Item = (&PreRoll, &Moments)> {
        self.pre_roll.iter()
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roll(dice: &[u8]) -> Outcome {
        Outcome::from_dice(dice).unwrap()
    }

    #[test]
    fn test_state_space_size() {
        let runup = 252 + 6 * 126 + 7 * 56 + 6 * 21 + 5 * 6;
        let jump = 6 + 21 + 56 + 126 + 252;
        assert_eq!(jump_state_space().len(), runup + jump);
    }

    #[test]
    fn test_state_space_is_valid() {
        for s in jump_state_space() {
            assert!(JumpState::new(s.phase(), s.roll()).is_ok(), "{s:?}");
        }
    }

    #[test]
    fn test_invalid_states_rejected() {
        assert!(JumpState::run_up(9, roll(&[1])).is_err());
        assert!(JumpState::run_up(3, roll(&[1, 2, 3, 4, 5])).is_err());
        assert!(JumpState::run_up(0, roll(&[1, 2])).is_err());
        assert!(JumpState::jump(roll(&[])).is_err());
        assert!(PreRoll::new(JumpPhase::Jump, 6).is_err());
        assert!(JumpState::run_up(4, roll(&[1])).is_ok());
    }

    #[test]
    fn test_empty_run_up_becomes_full_jump() {
        let pre = PreRoll::new(JumpPhase::RunUp { frozen_sum: 7 }, 0).unwrap();
        assert_eq!(pre.phase(), JumpPhase::Jump);
        assert_eq!(pre.dice(), 5);
    }

    #[test]
    fn test_jump_all_sixes_freezes_everything() {
        let mut solver = JumpSolver::default();
        let res = solver.solve(JumpState::jump(roll(&[6, 6, 6, 6, 6])).unwrap());
        assert_eq!(res.action, JumpAction::Freeze(5));
        assert_eq!(res.best.ev, 30.0);
        assert_eq!(res.option(JumpAction::Stop), None);
    }

    #[test]
    fn test_stop_with_full_pool_scores_zero() {
        let mut solver = JumpSolver::default();
        let res = solver.solve(JumpState::run_up(0, roll(&[1, 2, 3, 4, 5])).unwrap());
        assert_eq!(res.option(JumpAction::Stop), Some(Moments::ZERO));
        assert_ne!(res.action, JumpAction::Stop);
    }

    #[test]
    fn test_stop_is_forced_when_every_freeze_breaks_ceiling() {
        let mut solver = JumpSolver::default();
        let res = solver.solve(JumpState::run_up(4, roll(&[5, 5, 6, 6])).unwrap());
        assert_eq!(res.action, JumpAction::Stop);
        assert!((res.best.ev - 3.5).abs() < 1e-12);
        for k in 1..=5 {
            assert_eq!(res.options[k], None, "k={k}");
        }
    }

    #[test]
    fn test_ceiling_excludes_large_freezes() {
        let mut solver = JumpSolver::default();
        let res = solver.solve(JumpState::run_up(0, roll(&[2, 2, 3, 4, 5])).unwrap());
        assert!(res.options[1].is_some());
        assert!(res.options[2].is_some());
        assert!(res.options[3].is_some());
        assert!(res.options[4].is_none());
        assert!(res.options[5].is_none());
    }

    #[test]
    fn test_freezing_whole_pool_in_run_up_jumps_with_five() {
        let mut solver = JumpSolver::default();
        let res = solver.solve(JumpState::run_up(0, roll(&[1, 1, 1, 1, 1])).unwrap());
        let five = solver.solve_pre_roll(PreRoll::new(JumpPhase::Jump, 5).unwrap());
        assert_eq!(res.options[5], Some(five));
        assert_eq!(res.action, JumpAction::Freeze(5));
    }

    #[test]
    fn test_attempt_moments() {
        let mut solver = JumpSolver::default();
        let m = solver.attempt_moments();
        assert!(m.ev > 5.0 && m.ev < 30.0, "EV={}", m.ev);
        assert!(m.sd() > 0.0);
        let again = solver.attempt_moments();
        assert_eq!(m, again);
    }

    #[test]
    fn test_successor() {
        let runup = JumpState::run_up(0, roll(&[1, 3, 6])).unwrap_err();
        assert!(matches!(runup, DecathlonError::InvalidState(_)));

        let s = JumpState::run_up(2, roll(&[1, 3, 6])).unwrap();
        let (pre, banked) = successor(&s, JumpAction::Freeze(2)).unwrap();
        assert_eq!(pre.phase(), JumpPhase::RunUp { frozen_sum: 6 });
        assert_eq!(pre.dice(), 1);
        assert_eq!(banked, 0);
        assert_eq!(successor(&s, JumpAction::Freeze(3)), None);
        let (stop, _) = successor(&s, JumpAction::Stop).unwrap();
        assert_eq!((stop.phase(), stop.dice()), (JumpPhase::Jump, 2));

        let j = JumpState::jump(roll(&[2, 5, 6])).unwrap();
        assert_eq!(successor(&j, JumpAction::Stop), None);
        let (pre, banked) = successor(&j, JumpAction::Freeze(2)).unwrap();
        assert_eq!((pre.phase(), pre.dice()), (JumpPhase::Jump, 1));
        assert_eq!(banked, 11);
        assert_eq!(successor(&j, JumpAction::Freeze(4)), None);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(JumpAction::Stop.to_string(), "stop");
        assert_eq!(JumpAction::Freeze(3).to_string(), "freeze 3");
        assert_eq!(JumpAction::from_freeze_count(0), JumpAction::Stop);
    }
}
