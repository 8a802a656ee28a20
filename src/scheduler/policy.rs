use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::cluster::{Task, Vm};
use crate::error::SchedulerError;
use super::aco::{AcoPolicy, AcoTrace};
use super::rho::{RhoPolicy, RhoTrace};
use super::round_robin::{RoundRobinPolicy, RoundRobinTrace};

/// Mutable bookkeeping owned by exactly one policy for one run.
///
/// `vm_loads` is indexed like the VM list and only ever grows;
/// `response_log` gets one finish-time estimate per processed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyState {
    pub vm_loads: Vec<f64>,
    pub response_log: Vec<f64>,
    pub extension: StateExtension,
}

/// Per-policy additions to the shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateExtension {
    RoundRobin { cycle_counter: u64 },
    Rho,
    Aco { pheromone: Vec<f64> },
}

impl PolicyState {
    pub fn new(vm_count: usize, extension: StateExtension) -> Self {
        Self {
            vm_loads: vec![0.0; vm_count],
            response_log: Vec::new(),
            extension,
        }
    }

    pub fn tasks_processed(&self) -> usize {
        self.response_log.len()
    }

    pub fn total_load(&self) -> f64 {
        self.vm_loads.iter().sum()
    }

    pub(crate) fn check_fleet(&self, vms: &[Vm]) -> Result<(), SchedulerError> {
        if vms.is_empty() {
            return Err(SchedulerError::EmptyVmList);
        }
        if self.vm_loads.len() != vms.len() {
            return Err(SchedulerError::StateMismatch {
                expected: vms.len(),
                actual: self.vm_loads.len(),
            });
        }
        Ok(())
    }

    /// Records the finish-time estimate and queues the task's work on `vm_id`.
    pub(crate) fn commit(&mut self, vm_id: usize, task: &Task, eft: f64) {
        self.response_log.push(eft);
        self.vm_loads[vm_id] += task.length;
    }
}

/// Read-only explanation of one decision. Produced only when tracing is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionTrace {
    RoundRobin(RoundRobinTrace),
    Rho(RhoTrace),
    Aco(AcoTrace),
}

impl DecisionTrace {
    pub fn chosen_vm(&self) -> usize {
        match self {
            DecisionTrace::RoundRobin(t) => t.chosen_vm,
            DecisionTrace::Rho(t) => t.chosen_vm,
            DecisionTrace::Aco(t) => t.chosen_vm,
        }
    }

    /// One-line human readable summary.
    pub fn describe(&self) -> String {
        match self {
            DecisionTrace::RoundRobin(t) => format!(
                "Task {}: Assigned to VM {} (Round Robin cycle {})",
                t.task_id, t.chosen_vm, t.cycle_counter
            ),
            DecisionTrace::Rho(t) => format!(
                "Task {}: Alpha VM={} (Fit: {:.3}). {} -> Assigned to VM {}",
                t.task_id,
                t.alpha_vm,
                t.scores[t.alpha_vm],
                t.phase.label(),
                t.chosen_vm
            ),
            DecisionTrace::Aco(t) => format!(
                "Task {}: Chose VM {} (Prob: {:.3})",
                t.task_id,
                t.chosen_vm,
                t.probabilities[t.chosen_vm]
            ),
        }
    }
}

/// Outcome of a single assignment step.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub state: PolicyState,
    pub vm_id: usize,
    pub trace: Option<DecisionTrace>,
}

/// Task-to-VM assignment contract shared by all policies.
///
/// The state is moved in and handed back inside the [`Assignment`], so each
/// policy run owns its bookkeeping outright. Randomness comes only from `rng`.
pub trait AssignmentPolicy {
    fn name(&self) -> &'static str;

    fn initial_state(&self, vm_count: usize) -> PolicyState;

    fn assign_next(
        &self,
        state: PolicyState,
        vms: &[Vm],
        task: &Task,
        rng: &mut dyn RngCore,
    ) -> Result<Assignment, SchedulerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PolicyKind {
    RoundRobin,
    Rho,
    Aco,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [PolicyKind::RoundRobin, PolicyKind::Rho, PolicyKind::Aco];

    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::RoundRobin => "Round Robin",
            PolicyKind::Rho => "RHO",
            PolicyKind::Aco => "ACO",
        }
    }

    /// Offset mixed into the run seed so each policy draws from its own stream.
    pub(crate) fn stream(&self) -> u64 {
        match self {
            PolicyKind::RoundRobin => 0,
            PolicyKind::Rho => 1,
            PolicyKind::Aco => 2,
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub enum Policy {
    RoundRobin(RoundRobinPolicy),
    Rho(RhoPolicy),
    Aco(AcoPolicy),
}

impl Policy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::RoundRobin(_) => PolicyKind::RoundRobin,
            Policy::Rho(_) => PolicyKind::Rho,
            Policy::Aco(_) => PolicyKind::Aco,
        }
    }

    pub fn with_tracing(self, enabled: bool) -> Self {
        match self {
            Policy::RoundRobin(p) => Policy::RoundRobin(p.with_tracing(enabled)),
            Policy::Rho(p) => Policy::Rho(p.with_tracing(enabled)),
            Policy::Aco(p) => Policy::Aco(p.with_tracing(enabled)),
        }
    }
}

impl AssignmentPolicy for Policy {
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn initial_state(&self, vm_count: usize) -> PolicyState {
        match self {
            Policy::RoundRobin(p) => p.initial_state(vm_count),
            Policy::Rho(p) => p.initial_state(vm_count),
            Policy::Aco(p) => p.initial_state(vm_count),
        }
    }

    fn assign_next(
        &self,
        state: PolicyState,
        vms: &[Vm],
        task: &Task,
        rng: &mut dyn RngCore,
    ) -> Result<Assignment, SchedulerError> {
        match self {
            Policy::RoundRobin(p) => p.assign_next(state, vms, task, rng),
            Policy::Rho(p) => p.assign_next(state, vms, task, rng),
            Policy::Aco(p) => p.assign_next(state, vms, task, rng),
        }
    }
}

/// Result of feeding a whole task sequence through one policy.
#[derive(Debug, Clone)]
pub struct PolicyRun {
    pub state: PolicyState,
    pub chosen: Vec<usize>,
    pub traces: Vec<DecisionTrace>,
}

/// Runs `tasks` in order through `policy` starting from a fresh state.
///
/// At most `trace_limit` decision traces are kept.
pub fn run_policy<P: AssignmentPolicy + ?Sized>(
    policy: &P,
    vms: &[Vm],
    tasks: &[Task],
    rng: &mut dyn RngCore,
    trace_limit: usize,
) -> Result<PolicyRun, SchedulerError> {
    let mut state = policy.initial_state(vms.len());
    let mut chosen = Vec::with_capacity(tasks.len());
    let mut traces = Vec::new();

    for task in tasks {
        let assignment = policy.assign_next(state, vms, task, rng)?;
        state = assignment.state;
        chosen.push(assignment.vm_id);

        if let Some(trace) = assignment.trace {
            if traces.len() < trace_limit {
                traces.push(trace);
            }
        }
    }

    Ok(PolicyRun {
        state,
        chosen,
        traces,
    })
}
