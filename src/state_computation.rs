//! Drivers that solve a whole event's state space.
//!
//! The sprint driver tabulates states in topological layers instead of
//! recursing: second-set states by increasing rerolls, then first-set states
//! by increasing rerolls. Every child of a layer lies in an earlier layer, so
//! each layer is evaluated in parallel against a read-only memo and then
//! scattered back.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::constants::*;
use crate::long_jump::{jump_state_space, JumpSolver};
use crate::sprint::{
    evaluate_sprint_state, sprint_state_space, SprintResult, SprintSolver, SprintStage,
    SprintState,
};

/// Layer key: second-set layers sort before first-set layers, then by rerolls.
fn sprint_layer(state: &SprintState) -> (u8, u8) {
    let stage_rank = match state.stage() {
        SprintStage::SecondSet { .. } => 0,
        SprintStage::FirstSet => 1,
    };
    (stage_rank, state.rerolls())
}

/// Group the sprint state space into topologically ordered layers.
pub fn sprint_layers() -> Vec<Vec<SprintState>> {
    let budgets = SPRINT_MAX_REROLLS as usize + 1;
    let mut layers: Vec<Vec<SprintState>> = vec![Vec::new(); 2 * budgets];
    for state in sprint_state_space() {
        let (stage_rank, rerolls) = sprint_layer(&state);
        layers[stage_rank as usize * budgets + rerolls as usize].push(state);
    }
    layers
}

/// Solve every sprint state layer by layer with rayon.
///
/// Produces the same table as calling [`SprintSolver::solve`] on every state.
pub fn solve_sprint_layers(solver: &mut SprintSolver) {
    let total_start = Instant::now();
    let layers = sprint_layers();
    let total: usize = layers.iter().map(Vec::len).sum();
    info!(states = total, layers = layers.len(), "solving sprint state space");

    let tie_epsilon = solver.config().tie_epsilon;
    for (i, layer) in layers.iter().enumerate() {
        let layer_start = Instant::now();
        let memo = solver.memo();
        let solved: Vec<(SprintState, SprintResult)> = layer
            .par_iter()
            .filter(|s| !memo.contains_key(*s))
            .map(|s| {
                // Children live in earlier layers and are already in the memo.
                let res = evaluate_sprint_state(s, tie_epsilon, |child| memo[&child].best);
                (*s, res)
            })
            .collect();
        let count = solved.len();
        solver.insert_solved(solved);

        let secs = layer_start.elapsed().as_secs_f64();
        debug!(
            layer = i,
            states = count,
            secs,
            rate = count as f64 / secs.max(1e-9),
            "sprint layer solved"
        );
    }

    info!(
        states = solver.len(),
        secs = total_start.elapsed().as_secs_f64(),
        "sprint state space solved"
    );
}

/// Solve every long jump decision point through the memoized recursion.
pub fn solve_jump_all(solver: &mut JumpSolver) {
    let start = Instant::now();
    let states = jump_state_space();
    info!(states = states.len(), "solving long jump state space");
    for state in states {
        solver.solve(state);
    }
    let attempt = solver.attempt_moments();
    info!(
        states = solver.len(),
        attempt_ev = attempt.ev,
        attempt_sd = attempt.sd(),
        secs = start.elapsed().as_secs_f64(),
        "long jump state space solved"
    );
}
