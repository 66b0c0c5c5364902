//! Deterministic action selection.
//!
//! Candidates are offered from most to least conservative (freeze before
//! reroll, stop before freezing, fewer dice before more). A later candidate
//! replaces the incumbent only if its EV is higher by at least the tie
//! epsilon, or if the EVs tie within epsilon and its SD is strictly lower.
//! Full ties keep the earlier candidate.

use crate::types::Moments;

/// True if `challenger` should replace `incumbent`.
#[inline]
pub fn is_better(challenger: &Moments, incumbent: &Moments, tie_epsilon: f64) -> bool {
    let diff = challenger.ev - incumbent.ev;
    if diff.abs() < tie_epsilon {
        challenger.sd() < incumbent.sd()
    } else {
        diff > 0.0
    }
}

/// Select the best `(action, moments)` pair. `first` is the most conservative
/// candidate and wins every full tie.
pub fn select_best<A: Copy>(
    first: (A, Moments),
    rest: impl IntoIterator<Item = (A, Moments)>,
    tie_epsilon: f64,
) -> (A, Moments) {
    let mut best = first;
    for candidate in rest {
        if is_better(&candidate.1, &best.1, tie_epsilon) {
            best = candidate;
        }
    }
    best
}
