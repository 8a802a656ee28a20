use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::SchedulerError;
use super::entities::{Task, Vm};

/// VMs and the master task list shared by every policy in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub vms: Vec<Vm>,
    pub tasks: Vec<Task>,
}

/// Draws VM capacities and task lengths uniformly from inclusive integer ranges.
pub struct WorkloadGenerator {
    rng: Pcg64,
}

impl WorkloadGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn generate_vms(&mut self, count: usize, (min, max): (u64, u64)) -> Result<Vec<Vm>, SchedulerError> {
        (0..count)
            .map(|id| Vm::new(id, self.rng.gen_range(min..=max) as f64))
            .collect()
    }

    pub fn generate_tasks(&mut self, count: usize, (min, max): (u64, u64)) -> Result<Vec<Task>, SchedulerError> {
        (0..count)
            .map(|id| Task::new(id, self.rng.gen_range(min..=max) as f64))
            .collect()
    }

    /// VMs first, then enough tasks for the largest step.
    pub fn generate(&mut self, config: &SimulationConfig) -> Result<Workload, SchedulerError> {
        let vms = self.generate_vms(config.num_vms, config.vm_mips_range)?;
        let tasks = self.generate_tasks(config.max_tasks(), config.task_length_range)?;

        info!("Generated {} VMs and {} tasks", vms.len(), tasks.len());
        for vm in &vms {
            debug!(
                "VM {}: {} MIPS, P_max={:.0}W, P_idle={:.0}W",
                vm.id, vm.mips, vm.p_max, vm.p_idle
            );
        }

        Ok(Workload { vms, tasks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_stay_in_range() {
        let mut generator = WorkloadGenerator::new(1);
        let vms = generator.generate_vms(50, (100, 1000)).unwrap();
        let tasks = generator.generate_tasks(500, (1000, 20000)).unwrap();

        assert!(vms.iter().all(|vm| (100.0..=1000.0).contains(&vm.mips)));
        assert!(tasks.iter().all(|t| (1000.0..=20000.0).contains(&t.length)));
        assert!(vms.iter().all(|vm| vm.mips.fract() == 0.0));
        assert_eq!(tasks.last().unwrap().id, 499);
    }

    #[test]
    fn test_same_seed_same_workload() {
        let config = SimulationConfig::default();
        let a = WorkloadGenerator::new(9).generate(&config).unwrap();
        let b = WorkloadGenerator::new(9).generate(&config).unwrap();
        let c = WorkloadGenerator::new(10).generate(&config).unwrap();

        assert_eq!(a.vms, b.vms);
        assert_eq!(a.tasks, b.tasks);
        assert_ne!(a.tasks, c.tasks);
        assert_eq!(a.tasks.len(), config.max_tasks());
        assert_eq!(a.vms.len(), config.num_vms);
    }

    #[test]
    fn test_zero_mips_range_is_rejected() {
        let mut generator = WorkloadGenerator::new(0);
        assert!(generator.generate_vms(3, (0, 0)).is_err());
    }
}
