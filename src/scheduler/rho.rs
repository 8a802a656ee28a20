//! Rock-hyrax inspired policy.
//!
//! Each decision first finds the "alpha" VM (lowest fitness score), then
//! flips two fair coins the way a colony splits into sentinels and foragers:
//!
//! | `r1`    | `r2`    | choice           |
//! |---------|---------|------------------|
//! | `< 0.5` | `< 0.5` | uniform random VM |
//! | `< 0.5` | `>= 0.5`| alpha VM         |
//! | `>= 0.5`| unused  | alpha VM         |
//!
//! Overall the alpha VM is taken three times out of four.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::{Task, Vm};
use crate::error::SchedulerError;
use super::estimation::{argmin, expected_finish_times, fitness_scores};
use super::policy::{Assignment, AssignmentPolicy, DecisionTrace, PolicyState, StateExtension};

const EXPLORE_THRESHOLD: f64 = 0.5;
const RANDOM_THRESHOLD: f64 = 0.5;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct RhoPolicy {
    weights: (f64, f64),
    tracing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RhoPhase {
    ExploreRandom,
    ExploreAlpha,
    ExploitAlpha,
}

impl RhoPhase {
    pub fn label(&self) -> &'static str {
        match self {
            RhoPhase::ExploreRandom => "Phase 1 (Exploration, random VM)",
            RhoPhase::ExploreAlpha => "Phase 1 (Exploration, alpha VM)",
            RhoPhase::ExploitAlpha => "Phase 2 (Exploitation, alpha VM)",
        }
    }
}

/// Full breakdown of one RHO decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhoTrace {
    pub task_id: usize,
    pub scores: Vec<f64>,
    pub alpha_vm: usize,
    pub chosen_vm: usize,
    pub r1: f64,
    /// Only drawn on the exploration branch.
    pub r2: Option<f64>,
    pub phase: RhoPhase,
    pub eft: f64,
}

impl RhoPolicy {
    /// `weights` is `(w1_time, w2_energy)`; both non-negative and summing to 1.
    pub fn new(weights: (f64, f64)) -> Result<Self, SchedulerError> {
        let (w1, w2) = weights;
        let valid = w1.is_finite()
            && w2.is_finite()
            && w1 >= 0.0
            && w2 >= 0.0
            && ((w1 + w2) - 1.0).abs() <= WEIGHT_SUM_TOLERANCE;

        if !valid {
            return Err(SchedulerError::InvalidWeights { w1, w2 });
        }

        Ok(Self {
            weights,
            tracing: false,
        })
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    pub fn weights(&self) -> (f64, f64) {
        self.weights
    }
}

impl AssignmentPolicy for RhoPolicy {
    fn name(&self) -> &'static str {
        "RHO"
    }

    fn initial_state(&self, vm_count: usize) -> PolicyState {
        PolicyState::new(vm_count, StateExtension::Rho)
    }

    fn assign_next(
        &self,
        mut state: PolicyState,
        vms: &[Vm],
        task: &Task,
        rng: &mut dyn RngCore,
    ) -> Result<Assignment, SchedulerError> {
        state.check_fleet(vms)?;
        if state.extension != StateExtension::Rho {
            return Err(SchedulerError::StateKindMismatch { policy: self.name() });
        }

        let scores = fitness_scores(vms, &state.vm_loads, task, self.weights);
        let alpha_vm = argmin(&scores).ok_or(SchedulerError::EmptyVmList)?;

        let r1: f64 = rng.gen();
        let (phase, r2) = if r1 < EXPLORE_THRESHOLD {
            let r2: f64 = rng.gen();
            if r2 < RANDOM_THRESHOLD {
                (RhoPhase::ExploreRandom, Some(r2))
            } else {
                (RhoPhase::ExploreAlpha, Some(r2))
            }
        } else {
            (RhoPhase::ExploitAlpha, None)
        };

        let chosen = match phase {
            RhoPhase::ExploreRandom => rng.gen_range(0..vms.len()),
            RhoPhase::ExploreAlpha | RhoPhase::ExploitAlpha => alpha_vm,
        };

        let eft = expected_finish_times(vms, &state.vm_loads, task)[chosen];
        state.commit(chosen, task, eft);

        debug!(
            "RHO: task {} -> VM {} (alpha {}, {:?}, eft {:.3}s)",
            task.id, chosen, alpha_vm, phase, eft
        );

        let trace = self.tracing.then(|| {
            DecisionTrace::Rho(RhoTrace {
                task_id: task.id,
                scores,
                alpha_vm,
                chosen_vm: chosen,
                r1,
                r2,
                phase,
                eft,
            })
        });

        Ok(Assignment {
            state,
            vm_id: chosen,
            trace,
        })
    }
}
