use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::{Task, Vm};
use crate::error::SchedulerError;
use super::estimation::expected_finish_times;
use super::policy::{Assignment, AssignmentPolicy, DecisionTrace, PolicyState, StateExtension};

/// Cycles through the VMs in index order, ignoring load and speed.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinPolicy {
    tracing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRobinTrace {
    pub task_id: usize,
    pub cycle_counter: u64,
    pub chosen_vm: usize,
    pub eft: f64,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }
}

impl AssignmentPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "Round Robin"
    }

    fn initial_state(&self, vm_count: usize) -> PolicyState {
        PolicyState::new(vm_count, StateExtension::RoundRobin { cycle_counter: 0 })
    }

    fn assign_next(
        &self,
        mut state: PolicyState,
        vms: &[Vm],
        task: &Task,
        _rng: &mut dyn RngCore,
    ) -> Result<Assignment, SchedulerError> {
        state.check_fleet(vms)?;

        let cycle_counter = match state.extension {
            StateExtension::RoundRobin { cycle_counter } => cycle_counter,
            _ => return Err(SchedulerError::StateKindMismatch { policy: self.name() }),
        };

        let chosen = (cycle_counter % vms.len() as u64) as usize;
        let eft = expected_finish_times(vms, &state.vm_loads, task)[chosen];

        state.commit(chosen, task, eft);
        state.extension = StateExtension::RoundRobin {
            cycle_counter: cycle_counter + 1,
        };

        debug!("Round Robin: task {} -> VM {} (eft {:.3}s)", task.id, chosen, eft);

        let trace = self.tracing.then(|| {
            DecisionTrace::RoundRobin(RoundRobinTrace {
                task_id: task.id,
                cycle_counter,
                chosen_vm: chosen,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::policy::run_policy;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_cycles_in_index_order() {
        let vms = Vm::fleet(&[100.0, 5000.0, 300.0]).unwrap();
        let tasks = Task::batch(&[9000.0, 1.0, 400.0, 50.0, 70000.0, 2.0, 8.0]).unwrap();
        let mut rng = Pcg64::seed_from_u64(0);

        let run = run_policy(&RoundRobinPolicy::new(), &vms, &tasks, &mut rng, 0).unwrap();

        assert_eq!(run.chosen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(
            run.state.extension,
            StateExtension::RoundRobin { cycle_counter: 7 }
        );
    }

    #[test]
    fn test_ignores_speed() {
        let vms = Vm::fleet(&[100.0, 200.0]).unwrap();
        let task = Task::new(0, 1000.0).unwrap();
        let policy = RoundRobinPolicy::new();
        let mut rng = Pcg64::seed_from_u64(0);

        let assignment = policy
            .assign_next(policy.initial_state(2), &vms, &task, &mut rng)
            .unwrap();

        assert_eq!(assignment.vm_id, 0);
        assert_eq!(assignment.state.response_log, vec![10.0]);
        assert_eq!(assignment.state.vm_loads, vec![1000.0, 0.0]);
    }

    #[test]
    fn test_response_uses_pre_assignment_load() {
        let vms = Vm::fleet(&[100.0]).unwrap();
        let tasks = Task::batch(&[100.0, 200.0, 300.0]).unwrap();
        let mut rng = Pcg64::seed_from_u64(0);

        let run = run_policy(&RoundRobinPolicy::new(), &vms, &tasks, &mut rng, 0).unwrap();

        assert_eq!(run.state.response_log, vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_rejects_foreign_state() {
        let vms = Vm::fleet(&[100.0]).unwrap();
        let task = Task::new(0, 1.0).unwrap();
        let state = PolicyState::new(1, StateExtension::Rho);
        let mut rng = Pcg64::seed_from_u64(0);

        let err = RoundRobinPolicy::new()
            .assign_next(state, &vms, &task, &mut rng)
            .unwrap_err();
        assert_eq!(err, SchedulerError::StateKindMismatch { policy: "Round Robin" });
    }
}
