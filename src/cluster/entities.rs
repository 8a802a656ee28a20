use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Watts drawn per MIPS of capacity at full utilization.
const POWER_PER_MIPS: f64 = 0.2;
/// Baseline peak draw shared by every VM.
const POWER_BASE_WATTS: f64 = 150.0;
/// Idle draw as a fraction of peak draw.
const IDLE_POWER_RATIO: f64 = 0.7;

/// A virtual machine with a fixed processing capacity and a linear power model.
///
/// VMs never change after creation. The work queued on them lives in the
/// policy state, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub id: usize,
    pub mips: f64,
    pub p_max: f64,
    pub p_idle: f64,
}

impl Vm {
    pub fn new(id: usize, mips: f64) -> Result<Self, SchedulerError> {
        if !mips.is_finite() || mips <= 0.0 {
            return Err(SchedulerError::InvalidMips { vm_id: id, mips });
        }

        let p_max = mips * POWER_PER_MIPS + POWER_BASE_WATTS;
        let p_idle = p_max * IDLE_POWER_RATIO;

        Ok(Self {
            id,
            mips,
            p_max,
            p_idle,
        })
    }

    /// Builds one VM per capacity, numbered by position.
    pub fn fleet(mips: &[f64]) -> Result<Vec<Self>, SchedulerError> {
        mips.iter()
            .enumerate()
            .map(|(id, &m)| Self::new(id, m))
            .collect()
    }

    /// Seconds needed to drain `load_mi` million instructions.
    pub fn busy_time(&self, load_mi: f64) -> f64 {
        load_mi / self.mips
    }
}

/// A unit of work measured in million instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: usize,
    pub length: f64,
}

impl Task {
    pub fn new(id: usize, length: f64) -> Result<Self, SchedulerError> {
        if !length.is_finite() || length < 0.0 {
            return Err(SchedulerError::InvalidTaskLength { task_id: id, length });
        }

        Ok(Self { id, length })
    }

    pub fn batch(lengths: &[f64]) -> Result<Vec<Self>, SchedulerError> {
        lengths
            .iter()
            .enumerate()
            .map(|(id, &length)| Self::new(id, length))
            .collect()
    }
}
