//! Performance metrics of a policy run.
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Latest VM finish time (s) |
//! | Avg response time | Mean of the per-task finish-time estimates (s) |
//! | Throughput | Tasks processed / makespan (tasks/s) |
//! | Total energy | Busy draw at `p_max` until each VM finishes, idle draw at `p_idle` until the makespan (kJ) |

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::cluster::Vm;
use crate::scheduler::PolicyState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMetrics {
    pub makespan_s: f64,
    pub avg_response_time_s: f64,
    pub throughput_tasks_per_s: f64,
    pub total_energy_kj: f64,
    pub tasks_processed: usize,
    pub vm_finish_times: Vec<f64>,
}

impl PolicyMetrics {
    /// Snapshot of `state` against the fleet it was built for.
    ///
    /// Pure; safe to call after every task. `state` must track exactly one
    /// load per VM in `vms`.
    pub fn calculate(state: &PolicyState, vms: &[Vm]) -> Self {
        debug_assert_eq!(
            state.vm_loads.len(),
            vms.len(),
            "policy state tracks a different fleet"
        );

        let vm_finish_times: Vec<f64> = vms
            .iter()
            .zip(&state.vm_loads)
            .map(|(vm, &load)| vm.busy_time(load))
            .collect();

        let makespan = vm_finish_times.iter().copied().fold(0.0, f64::max);

        let avg_response_time = if state.response_log.is_empty() {
            0.0
        } else {
            state.response_log.iter().mean()
        };

        let tasks_processed = state.tasks_processed();
        let throughput = if makespan > 0.0 {
            tasks_processed as f64 / makespan
        } else {
            0.0
        };

        let energy_ws: f64 = vms
            .iter()
            .zip(&vm_finish_times)
            .map(|(vm, &busy)| {
                let idle = (makespan - busy).max(0.0);
                vm.p_max * busy + vm.p_idle * idle
            })
            .sum();

        Self {
            makespan_s: makespan,
            avg_response_time_s: avg_response_time,
            throughput_tasks_per_s: throughput,
            total_energy_kj: energy_ws / 1000.0,
            tasks_processed,
            vm_finish_times,
        }
    }
}
