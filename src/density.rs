//! Exact final-score distributions under the optimal policy.
//!
//! The solvers only carry the first two moments. Here the chosen action of
//! every solved state is replayed to push probability mass forward and get the
//! full PMF, then summarised as CDF, quantiles and best-of-k attempts.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::*;
use crate::dice_mechanics::outcomes;
use crate::game_mechanics::score_set;
use crate::long_jump::{successor, JumpSolver, PreRoll};
use crate::sprint::{SprintAction, SprintSolver, SprintStage, SprintState};
use crate::types::Moments;

/// Masses below this are treated as zero when building a PMF.
const MASS_FLOOR: f64 = 1e-300;

/// Exact PMF plus summary statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    /// `(score, probability)` pairs sorted by score.
    pub pmf: Vec<(i32, f64)>,
    pub mean: f64,
    pub std_dev: f64,
}

impl ScoreDistribution {
    pub fn from_masses(masses: BTreeMap<i32, f64>) -> Self {
        let pmf: Vec<(i32, f64)> = masses.into_iter().filter(|&(_, p)| p > MASS_FLOOR).collect();
        let moments = Moments::mixture(pmf.iter().map(|&(x, p)| (p, Moments::point(x as f64))));
        Self {
            pmf,
            mean: moments.ev,
            std_dev: moments.sd(),
        }
    }

    pub fn total_probability(&self) -> f64 {
        self.pmf.iter().map(|&(_, p)| p).sum()
    }

    pub fn moments(&self) -> Moments {
        Moments::mixture(self.pmf.iter().map(|&(x, p)| (p, Moments::point(x as f64))))
    }

    /// Cumulative `(score, P(X <= score))` pairs.
    pub fn cdf(&self) -> Vec<(i32, f64)> {
        let mut acc = 0.0;
        let mut out: Vec<(i32, f64)> = self
            .pmf
            .iter()
            .map(|&(x, p)| {
                acc += p;
                (x, acc)
            })
            .collect();
        // Snap accumulated rounding at the top.
        if let Some(last) = out.last_mut() {
            if (last.1 - 1.0).abs() < 1e-9 {
                last.1 = 1.0;
            }
        }
        out
    }

    /// Smallest score whose CDF reaches `p`. `None` for an empty distribution.
    pub fn quantile(&self, p: f64) -> Option<i32> {
        let cdf = self.cdf();
        cdf.iter()
            .find(|&&(_, c)| c >= p)
            .or(cdf.last())
            .map(|&(x, _)| x)
    }

    /// Distribution of the best of `attempts` independent attempts.
    ///
    /// `P(max <= x) = F(x)^k`. Zero attempts are treated as one.
    pub fn best_of(&self, attempts: u32) -> Self {
        let k = attempts.max(1) as i32;
        let mut masses = BTreeMap::new();
        let mut prev = 0.0f64;
        for (x, c) in self.cdf() {
            let cur = c.powi(k);
            masses.insert(x, cur - prev);
            prev = cur;
        }
        Self::from_masses(masses)
    }
}

/// Bucket in forward processing order: first set before second set, then by
/// decreasing rerolls. Every transition moves mass to a later bucket.
fn sprint_bucket(state: &SprintState) -> usize {
    let budgets = SPRINT_MAX_REROLLS as usize + 1;
    let stage_rank = match state.stage() {
        SprintStage::FirstSet => 0,
        SprintStage::SecondSet { .. } => 1,
    };
    stage_rank * budgets + (SPRINT_MAX_REROLLS - state.rerolls()) as usize
}

/// Exact sprint score distribution from the first roll with a full budget.
pub fn sprint_distribution(solver: &mut SprintSolver) -> ScoreDistribution {
    let start = Instant::now();
    let budgets = SPRINT_MAX_REROLLS as usize + 1;
    let mut buckets: Vec<HashMap<SprintState, f64>> = vec![HashMap::new(); 2 * budgets];
    let rolls = outcomes(SPRINT_DICE);

    for w in rolls {
        let s = SprintState::rolled(SprintStage::FirstSet, SPRINT_MAX_REROLLS, &w.outcome);
        *buckets[sprint_bucket(&s)].entry(s).or_default() += w.probability;
    }

    let mut finals: BTreeMap<i32, f64> = BTreeMap::new();
    for i in 0..buckets.len() {
        let bucket = std::mem::take(&mut buckets[i]);
        let active = bucket.len();
        for (state, mass) in bucket {
            let res = solver.solve(state);
            let set_score = score_set(&state.dice());
            let (stage, rerolls) = match (res.action, state.stage()) {
                (SprintAction::Freeze, SprintStage::SecondSet { first_set_score }) => {
                    *finals.entry(first_set_score + set_score).or_default() += mass;
                    continue;
                }
                (SprintAction::Freeze, SprintStage::FirstSet) => (
                    SprintStage::SecondSet {
                        first_set_score: set_score,
                    },
                    state.rerolls(),
                ),
                (SprintAction::Reroll, stage) => (stage, state.rerolls() - 1),
            };
            for w in rolls {
                let child = SprintState::rolled(stage, rerolls, &w.outcome);
                *buckets[sprint_bucket(&child)].entry(child).or_default() += mass * w.probability;
            }
        }
        debug!(bucket = i, active, "sprint mass propagated");
    }

    let dist = ScoreDistribution::from_masses(finals);
    debug!(
        mean = dist.mean,
        std_dev = dist.std_dev,
        secs = start.elapsed().as_secs_f64(),
        "sprint distribution computed"
    );
    dist
}

/// Exact score distribution of one long jump attempt.
pub fn attempt_distribution(solver: &mut JumpSolver) -> ScoreDistribution {
    let mut memo = HashMap::new();
    let masses = pre_roll_pmf(solver, PreRoll::start(), &mut memo);
    ScoreDistribution::from_masses(masses)
}

fn pre_roll_pmf(
    solver: &mut JumpSolver,
    pre: PreRoll,
    memo: &mut HashMap<PreRoll, BTreeMap<i32, f64>>,
) -> BTreeMap<i32, f64> {
    if let Some(pmf) = memo.get(&pre) {
        return pmf.clone();
    }
    let mut pmf = BTreeMap::new();
    if pre.dice() == 0 {
        pmf.insert(0, 1.0);
    } else {
        for w in outcomes(pre.dice() as usize) {
            let state = pre.rolled(&w.outcome);
            let res = solver.solve(state);
            // The chosen action is always legal, so a successor exists.
            let Some((next, banked)) = successor(&state, res.action) else {
                continue;
            };
            for (x, p) in pre_roll_pmf(solver, next, memo) {
                *pmf.entry(x + banked as i32).or_default() += w.probability * p;
            }
        }
    }
    memo.insert(pre, pmf.clone());
    pmf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(pairs: &[(i32, f64)]) -> ScoreDistribution {
        ScoreDistribution::from_masses(pairs.iter().copied().collect())
    }

    #[test]
    fn test_cdf_and_quantile() {
        let d = points(&[(1, 0.25), (3, 0.5), (7, 0.25)]);
        assert_eq!(d.cdf(), vec![(1, 0.25), (3, 0.75), (7, 1.0)]);
        assert_eq!(d.quantile(0.1), Some(1));
        assert_eq!(d.quantile(0.5), Some(3));
        assert_eq!(d.quantile(0.99), Some(7));
        assert!((d.mean - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_best_of_two_coin() {
        let d = points(&[(0, 0.5), (1, 0.5)]);
        let best = d.best_of(2);
        assert_eq!(best.pmf, vec![(0, 0.25), (1, 0.75)]);
        assert_eq!(d.best_of(0), d.best_of(1));
    }

    #[test]
    fn test_sprint_distribution_matches_moments() {
        let mut solver = SprintSolver::default();
        let dist = sprint_distribution(&mut solver);
        let m = solver.start_moments();
        assert!((dist.total_probability() - 1.0).abs() < 1e-9);
        assert!((dist.mean - m.ev).abs() < 1e-9, "{} vs {}", dist.mean, m.ev);
        assert!((dist.std_dev - m.sd()).abs() < 1e-6);
        assert!(dist.pmf.iter().all(|&(x, _)| (2 * MIN_SET_SCORE..=2 * MAX_SET_SCORE).contains(&x)));
    }

    #[test]
    fn test_attempt_distribution_matches_moments() {
        let mut solver = JumpSolver::default();
        let dist = attempt_distribution(&mut solver);
        let m = solver.attempt_moments();
        assert!((dist.total_probability() - 1.0).abs() < 1e-9);
        assert!((dist.mean - m.ev).abs() < 1e-9);
        assert!((dist.std_dev - m.sd()).abs() < 1e-6);
        assert!(dist.pmf.iter().all(|&(x, _)| (0..=30).contains(&x)));
    }
}
