//! Sprint (100 metres): state space and memoized moment-propagating solver.
//!
//! A sprint is two scored sets of four dice sharing one budget of five rerolls.
//! In each state the player either freezes the current set or rerolls all four
//! dice at the cost of one reroll.
//!
//! - Freezing the first set banks its score and rolls the second set with the
//!   same budget.
//! - Freezing the second set ends the event with `first + second`.
//! - Rerolling redraws the set and keeps the stage.
//!
//! Every transition strictly lowers the budget or advances the stage, so the
//! state graph is acyclic and plain memoized recursion solves each state once.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::dice_mechanics::{outcomes, sort_dice, Outcome};
use crate::error::{DecathlonError, Result};
use crate::game_mechanics::score_set;
use crate::policy::select_best;
use crate::types::{Moments, SolverConfig};

/// Which set is being played. The second set carries the banked first-set score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SprintStage {
    FirstSet,
    SecondSet { first_set_score: i32 },
}

/// Sprint decision point: stage, rerolls left and the current (sorted) dice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SprintState {
    stage: SprintStage,
    rerolls: u8,
    dice: [u8; SPRINT_DICE],
}

impl SprintState {
    /// Validate and build a state. Dice may be given in any order.
    pub fn new(stage: SprintStage, rerolls: u8, mut dice: [u8; SPRINT_DICE]) -> Result<Self> {
        if rerolls > SPRINT_MAX_REROLLS {
            return Err(DecathlonError::InvalidState(format!(
                "sprint rerolls {rerolls} exceeds {SPRINT_MAX_REROLLS}"
            )));
        }
        if let Some(&d) = dice.iter().find(|&&d| !(1..=FACES as u8).contains(&d)) {
            return Err(DecathlonError::InvalidState(format!(
                "sprint die face {d} outside 1..={FACES}"
            )));
        }
        if let SprintStage::SecondSet { first_set_score } = stage {
            if !(MIN_SET_SCORE..=MAX_SET_SCORE).contains(&first_set_score) {
                return Err(DecathlonError::InvalidState(format!(
                    "first set score {first_set_score} outside {MIN_SET_SCORE}..={MAX_SET_SCORE}"
                )));
            }
        }
        sort_dice(&mut dice);
        Ok(Self {
            stage,
            rerolls,
            dice,
        })
    }

    pub fn first_set(rerolls: u8, dice: [u8; SPRINT_DICE]) -> Result<Self> {
        Self::new(SprintStage::FirstSet, rerolls, dice)
    }

    pub fn second_set(first_set_score: i32, rerolls: u8, dice: [u8; SPRINT_DICE]) -> Result<Self> {
        Self::new(SprintStage::SecondSet { first_set_score }, rerolls, dice)
    }

    /// Child state after a roll. Callers only pass fields derived from a valid state.
    pub(crate) fn rolled(stage: SprintStage, rerolls: u8, outcome: &Outcome) -> Self {
        Self {
            stage,
            rerolls,
            dice: outcome.to_array(),
        }
    }

    pub fn stage(&self) -> SprintStage {
        self.stage
    }

    pub fn rerolls(&self) -> u8 {
        self.rerolls
    }

    pub fn dice(&self) -> [u8; SPRINT_DICE] {
        self.dice
    }

    pub fn first_set_score(&self) -> Option<i32> {
        match self.stage {
            SprintStage::FirstSet => None,
            SprintStage::SecondSet { first_set_score } => Some(first_set_score),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SprintAction {
    Freeze,
    Reroll,
}

impl SprintAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SprintAction::Freeze => "freeze",
            SprintAction::Reroll => "reroll",
        }
    }
}

impl fmt::Display for SprintAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solved sprint state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SprintResult {
    /// Moments under the chosen action.
    pub best: Moments,
    pub freeze: Moments,
    /// `None` when no rerolls remain.
    pub reroll: Option<Moments>,
    pub action: SprintAction,
}

/// Probability-weighted mixture over all 126 four-dice outcomes.
fn roll_mixture(mut value: impl FnMut(&Outcome) -> Moments) -> Moments {
    Moments::mixture(
        outcomes(SPRINT_DICE)
            .iter()
            .map(|w| (w.probability, value(&w.outcome))),
    )
}

/// One step of the recursion: evaluate both actions of `state` given the
/// optimal moments of its children.
pub fn evaluate_sprint_state(
    state: &SprintState,
    tie_epsilon: f64,
    mut child_best: impl FnMut(SprintState) -> Moments,
) -> SprintResult {
    let set_score = score_set(&state.dice);

    let freeze = match state.stage {
        SprintStage::SecondSet { first_set_score } => {
            Moments::point((first_set_score + set_score) as f64)
        }
        SprintStage::FirstSet => {
            let next = SprintStage::SecondSet {
                first_set_score: set_score,
            };
            roll_mixture(|o| child_best(SprintState::rolled(next, state.rerolls, o)))
        }
    };

    let reroll = (state.rerolls > 0).then(|| {
        roll_mixture(|o| child_best(SprintState::rolled(state.stage, state.rerolls - 1, o)))
    });

    let (action, best) = select_best(
        (SprintAction::Freeze, freeze),
        reroll.map(|m| (SprintAction::Reroll, m)),
        tie_epsilon,
    );

    SprintResult {
        best,
        freeze,
        reroll,
        action,
    }
}

/// Every syntactically valid sprint state: all first-set states and all
/// second-set states for each first-set score in range.
pub fn sprint_state_space() -> Vec<SprintState> {
    let rolls = outcomes(SPRINT_DICE);
    let score_range = MIN_SET_SCORE..=MAX_SET_SCORE;
    let per_budget = rolls.len() * (1 + score_range.clone().count());
    let mut states = Vec::with_capacity((SPRINT_MAX_REROLLS as usize + 1) * per_budget);

    for rerolls in 0..=SPRINT_MAX_REROLLS {
        for w in rolls {
            states.push(SprintState::rolled(SprintStage::FirstSet, rerolls, &w.outcome));
        }
    }
    for rerolls in 0..=SPRINT_MAX_REROLLS {
        for w in rolls {
            for first_set_score in score_range.clone() {
                let stage = SprintStage::SecondSet { first_set_score };
                states.push(SprintState::rolled(stage, rerolls, &w.outcome));
            }
        }
    }
    states
}

/// Owns the memo table for the sprint event.
#[derive(Debug, Default)]
pub struct SprintSolver {
    config: SolverConfig,
    memo: HashMap<SprintState, SprintResult>,
}

impl SprintSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            memo: HashMap::with_capacity(sprint_state_space_len()),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve `state`, reusing every previously solved state.
    pub fn solve(&mut self, state: SprintState) -> SprintResult {
        if let Some(res) = self.memo.get(&state) {
            return *res;
        }
        let tie_epsilon = self.config.tie_epsilon;
        let res = evaluate_sprint_state(&state, tie_epsilon, |child| self.solve(child).best);
        self.memo.insert(state, res);
        res
    }

    /// Value of the event before the first roll: first set, full reroll budget.
    pub fn start_moments(&mut self) -> Moments {
        roll_mixture(|o| {
            self.solve(SprintState::rolled(
                SprintStage::FirstSet,
                SPRINT_MAX_REROLLS,
                o,
            ))
            .best
        })
    }

    pub fn get(&self, state: &SprintState) -> Option<&SprintResult> {
        self.memo.get(state)
    }

    /// Iterate over every solved state.
    pub fn results(&self) -> impl Iterator<Item = (&SprintState, &SprintResult)> {
        self.memo.iter()
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    pub(crate) fn memo(&self) -> &HashMap<SprintState, SprintResult> {
        &self.memo
    }

    pub(crate) fn insert_solved(
        &mut self,
        solved: impl IntoIterator<Item = (SprintState, SprintResult)>,
    ) {
        self.memo.extend(solved);
    }
}

/// Number of states produced by [`sprint_state_space`].
pub fn sprint_state_space_len() -> usize {
    let budgets = SPRINT_MAX_REROLLS as usize + 1;
    let scores = (MAX_SET_SCORE - MIN_SET_SCORE + 1) as usize;
    budgets * NUM_SPRINT_OUTCOMES * (1 + scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_space_size() {
        let states = sprint_state_space();
        assert_eq!(states.len(), sprint_state_space_len());
        assert_eq!(states.len(), 6 * 126 + 6 * 126 * 45);
    }

    #[test]
    fn test_new_sorts_dice() {
        let s = SprintState::first_set(2, [6, 1, 4, 1]).unwrap();
        assert_eq!(s.dice(), [1, 1, 4, 6]);
        assert_eq!(s.first_set_score(), None);
    }

    #[test]
    fn test_invalid_states_rejected() {
        assert!(SprintState::first_set(6, [1, 1, 1, 1]).is_err());
        assert!(SprintState::first_set(0, [0, 1, 1, 1]).is_err());
        assert!(SprintState::first_set(0, [1, 1, 1, 7]).is_err());
        assert!(SprintState::second_set(21, 0, [1, 1, 1, 1]).is_err());
        assert!(SprintState::second_set(-25, 0, [1, 1, 1, 1]).is_err());
        assert!(SprintState::second_set(-24, 0, [1, 1, 1, 1]).is_ok());
    }

    #[test]
    fn test_terminal_freeze_applies_six_penalty() {
        let mut solver = SprintSolver::default();
        let s = SprintState::second_set(3, 0, [6, 6, 5, 5]).unwrap();
        let res = solver.solve(s);
        assert_eq!(res.freeze.ev, 3.0 - 2.0);
        assert_eq!(res.freeze.sd(), 0.0);
        assert_eq!(res.reroll, None);
        assert_eq!(res.action, SprintAction::Freeze);
        assert_eq!(res.best, res.freeze);
    }

    #[test]
    fn test_solve_is_idempotent() {
        let mut solver = SprintSolver::default();
        let s = SprintState::first_set(3, [2, 3, 6, 6]).unwrap();
        let a = solver.solve(s);
        let n = solver.len();
        let b = solver.solve(s);
        assert_eq!(a, b);
        assert_eq!(a.best.ev.to_bits(), b.best.ev.to_bits());
        assert_eq!(a.best.ev2.to_bits(), b.best.ev2.to_bits());
        assert_eq!(n, solver.len());
    }

    #[test]
    fn test_rerolls_bad_second_set() {
        let mut solver = SprintSolver::default();
        let s = SprintState::second_set(0, 1, [6, 6, 6, 6]).unwrap();
        let res = solver.solve(s);
        assert_eq!(res.action, SprintAction::Reroll);
        assert!(res.reroll.unwrap().ev > res.freeze.ev);
    }

    #[test]
    fn test_freezes_perfect_second_set() {
        let mut solver = SprintSolver::default();
        let s = SprintState::second_set(0, 5, [5, 5, 5, 5]).unwrap();
        let res = solver.solve(s);
        assert_eq!(res.action, SprintAction::Freeze);
        assert_eq!(res.best.ev, 20.0);
    }

    #[test]
    fn test_identical_children_tie_goes_to_freeze() {
        let constant = Moments {
            ev: 2.5,
            ev2: 10.0,
        };
        let s = SprintState::first_set(1, [1, 2, 3, 4]).unwrap();
        let res = evaluate_sprint_state(&s, TIE_EPSILON, |_| constant);
        let reroll = res.reroll.unwrap();
        assert_eq!(res.freeze.ev, reroll.ev);
        assert_eq!(res.freeze.sd(), reroll.sd());
        assert_eq!(res.action, SprintAction::Freeze);
    }

    #[test]
    fn test_start_moments_in_range() {
        let mut solver = SprintSolver::default();
        let m = solver.start_moments();
        assert!(m.ev > 0.0 && m.ev < 2.0 * MAX_SET_SCORE as f64, "EV={}", m.ev);
        assert!(m.sd() > 0.0);
    }
}
