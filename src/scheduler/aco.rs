use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::{Task, Vm};
use crate::error::SchedulerError;
use super::estimation::expected_finish_times;
use super::policy::{Assignment, AssignmentPolicy, DecisionTrace, PolicyState, StateExtension};

/// Keeps `1 / eft` finite when a VM would finish instantly.
pub const EPSILON: f64 = 1e-6;

const INITIAL_PHEROMONE: f64 = 1.0;

/// Online ant-colony policy: one roulette draw per task, weighted by
/// `pheromone^alpha * (1 / eft)^beta`, followed by global evaporation and a
/// deposit on the chosen VM.
#[derive(Debug, Clone)]
pub struct AcoPolicy {
    alpha: f64,
    beta: f64,
    evaporation_rate: f64,
    tracing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcoTrace {
    pub task_id: usize,
    pub probabilities: Vec<f64>,
    pub draw: f64,
    pub chosen_vm: usize,
    pub eft: f64,
    pub deposit: f64,
}

impl AcoPolicy {
    pub fn new(alpha: f64, beta: f64, evaporation_rate: f64) -> Result<Self, SchedulerError> {
        if !alpha.is_finite() {
            return Err(SchedulerError::InvalidAcoParameter { name: "alpha", value: alpha });
        }
        if !beta.is_finite() {
            return Err(SchedulerError::InvalidAcoParameter { name: "beta", value: beta });
        }
        if !(0.0..=1.0).contains(&evaporation_rate) {
            return Err(SchedulerError::InvalidEvaporationRate(evaporation_rate));
        }

        Ok(Self {
            alpha,
            beta,
            evaporation_rate,
            tracing: false,
        })
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    /// Selection probability of every VM given the trail and the finish-time estimates.
    pub fn selection_probabilities(&self, pheromone: &[f64], efts: &[f64]) -> Vec<f64> {
        let attractions: Vec<f64> = pheromone
            .iter()
            .zip(efts)
            .map(|(&tau, &eft)| {
                let eta = 1.0 / (eft + EPSILON);
                tau.powf(self.alpha) * eta.powf(self.beta)
            })
            .collect();

        let total: f64 = attractions.iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            let uniform = 1.0 / attractions.len() as f64;
            return vec![uniform; attractions.len()];
        }

        attractions.iter().map(|a| a / total).collect()
    }

    /// Evaporates every trail, then deposits on the chosen VM.
    fn update_pheromone(&self, pheromone: &mut [f64], chosen: usize, eft: f64) -> f64 {
        let retain = 1.0 - self.evaporation_rate;
        for tau in pheromone.iter_mut() {
            *tau *= retain;
        }

        let deposit = 1.0 / (eft + EPSILON);
        pheromone[chosen] += deposit;
        deposit
    }
}

/// Picks the first index whose cumulative probability reaches `draw`.
///
/// Falls back to the last index when rounding leaves the total short of `draw`.
pub fn roulette_select(probabilities: &[f64], draw: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, p) in probabilities.iter().enumerate() {
        cumulative += p;
        if cumulative >= draw {
            return i;
        }
    }
    probabilities.len().saturating_sub(1)
}

impl AssignmentPolicy for AcoPolicy {
    fn name(&self) -> &'static str {
        "ACO"
    }

    fn initial_state(&self, vm_count: usize) -> PolicyState {
        PolicyState::new(
            vm_count,
            StateExtension::Aco {
                pheromone: vec![INITIAL_PHEROMONE; vm_count],
            },
        )
    }

    fn assign_next(
        &self,
        mut state: PolicyState,
        vms: &[Vm],
        task: &Task,
        rng: &mut dyn RngCore,
    ) -> Result<Assignment, SchedulerError> {
        state.check_fleet(vms)?;

        let efts = expected_finish_times(vms, &state.vm_loads, task);

        let StateExtension::Aco { pheromone } = &mut state.extension else {
            return Err(SchedulerError::StateKindMismatch { policy: self.name() });
        };
        if pheromone.len() != vms.len() {
            return Err(SchedulerError::StateMismatch {
                expected: vms.len(),
                actual: pheromone.len(),
            });
        }

        let probabilities = self.selection_probabilities(pheromone, &efts);
        let draw: f64 = rng.gen();
        let chosen = roulette_select(&probabilities, draw);
        let eft = efts[chosen];

        let deposit = self.update_pheromone(pheromone, chosen, eft);
        state.commit(chosen, task, eft);

        debug!(
            "ACO: task {} -> VM {} (p={:.3}, eft {:.3}s)",
            task.id, chosen, probabilities[chosen], eft
        );

        let trace = self.tracing.then(|| {
            DecisionTrace::Aco(AcoTrace {
                task_id: task.id,
                probabilities,
                draw,
                chosen_vm: chosen,
                eft,
                deposit,
            })
        });

        Ok(Assignment {
            state,
            vm_id: chosen,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::policy::run_policy;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn pheromone_of(state: &PolicyState) -> Vec<f64> {
        match &state.extension {
            StateExtension::Aco { pheromone } => pheromone.clone(),
            other => panic!("unexpected state extension {other:?}"),
        }
    }

    #[test]
    fn test_parameter_validation() {
        assert!(AcoPolicy::new(1.0, 2.0, 0.0).is_ok());
        assert!(AcoPolicy::new(1.0, 2.0, 1.0).is_ok());
        assert_eq!(
            AcoPolicy::new(1.0, 2.0, 1.2).unwrap_err(),
            SchedulerError::InvalidEvaporationRate(1.2)
        );
        assert!(AcoPolicy::new(1.0, 2.0, -0.1).is_err());
        assert!(AcoPolicy::new(f64::INFINITY, 2.0, 0.1).is_err());
    }

    #[test]
    fn test_two_vm_probabilities() {
        let policy = AcoPolicy::new(1.0, 2.0, 0.1).unwrap();
        let probs = policy.selection_probabilities(&[1.0, 1.0], &[10.0, 5.0]);

        // eta = [~0.1, ~0.2], squared -> [~0.01, ~0.04]
        assert!((probs[1] - 0.8).abs() < 1e-6);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let linear = AcoPolicy::new(1.0, 1.0, 0.1).unwrap();
        let probs = linear.selection_probabilities(&[1.0, 1.0], &[10.0, 5.0]);
        assert!((probs[1] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_pheromone_falls_back_to_uniform() {
        let policy = AcoPolicy::new(1.0, 2.0, 1.0).unwrap();
        let probs = policy.selection_probabilities(&[0.0, 0.0, 0.0, 0.0], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(probs, vec![0.25; 4]);
    }

    #[test]
    fn test_zero_eft_stays_finite() {
        let policy = AcoPolicy::new(1.0, 2.0, 0.1).unwrap();
        let probs = policy.selection_probabilities(&[1.0, 1.0], &[0.0, 5.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > 0.99);
    }

    #[test]
    fn test_roulette_select() {
        let probs = [0.2, 0.5, 0.3];
        assert_eq!(roulette_select(&probs, 0.0), 0);
        assert_eq!(roulette_select(&probs, 0.2), 0);
        assert_eq!(roulette_select(&probs, 0.21), 1);
        assert_eq!(roulette_select(&probs, 0.69), 1);
        assert_eq!(roulette_select(&probs, 0.95), 2);

        // Rounding shortfall lands on the last VM.
        assert_eq!(roulette_select(&[0.3, 0.3, 0.3], 0.95), 2);
    }

    #[test]
    fn test_pheromone_update_after_one_task() {
        let vms = Vm::fleet(&[100.0, 200.0]).unwrap();
        let task = Task::new(0, 1000.0).unwrap();
        let policy = AcoPolicy::new(1.0, 1.0, 0.1).unwrap().with_tracing(true);
        let mut rng = Pcg64::seed_from_u64(5);

        let assignment = policy
            .assign_next(policy.initial_state(2), &vms, &task, &mut rng)
            .unwrap();
        let pheromone = pheromone_of(&assignment.state);
        let chosen = assignment.vm_id;
        let other = 1 - chosen;
        let eft = [10.0, 5.0][chosen];

        assert!((pheromone[other] - 0.9).abs() < 1e-12);
        assert!((pheromone[chosen] - (0.9 + 1.0 / (eft + EPSILON))).abs() < 1e-9);
        assert_eq!(assignment.state.response_log, vec![eft]);

        let Some(DecisionTrace::Aco(trace)) = assignment.trace else {
            panic!("expected an ACO trace");
        };
        assert_eq!(trace.chosen_vm, roulette_select(&trace.probabilities, trace.draw));
    }

    #[test]
    fn test_pheromone_stays_non_negative() {
        let vms = Vm::fleet(&[150.0, 600.0, 900.0]).unwrap();
        let tasks: Vec<Task> = (0..200)
            .map(|i| Task::new(i, 2000.0 + (i % 9) as f64 * 700.0).unwrap())
            .collect();

        for rate in [0.0, 0.3, 1.0] {
            let policy = AcoPolicy::new(1.0, 2.0, rate).unwrap();
            let mut rng = Pcg64::seed_from_u64(17);
            let mut state = policy.initial_state(vms.len());

            for task in &tasks {
                let before: f64 = pheromone_of(&state).iter().sum();
                let assignment = policy.assign_next(state, &vms, task, &mut rng).unwrap();
                state = assignment.state;

                let after = pheromone_of(&state);
                assert!(after.iter().all(|&tau| tau >= 0.0));

                let eft = *state.response_log.last().unwrap();
                let deposit = 1.0 / (eft + EPSILON);
                let evaporated = before * rate;
                let expected = before - evaporated + deposit;
                assert!((after.iter().sum::<f64>() - expected).abs() < 1e-9 * expected.max(1.0));
            }
        }
    }

    #[test]
    fn test_favours_fast_vm_over_time() {
        let vms = Vm::fleet(&[100.0, 1000.0]).unwrap();
        let tasks: Vec<Task> = (0..500).map(|i| Task::new(i, 100.0).unwrap()).collect();
        let policy = AcoPolicy::new(1.0, 2.0, 0.1).unwrap();
        let mut rng = Pcg64::seed_from_u64(8);

        let run = run_policy(&policy, &vms, &tasks, &mut rng, 0).unwrap();
        let on_fast = run.chosen.iter().filter(|&&vm| vm == 1).count();
        assert!(on_fast > tasks.len() / 2);
    }
}
