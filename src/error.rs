use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("VM list is empty")]
    EmptyVmList,

    #[error("VM {vm_id} has invalid capacity: {mips} MIPS")]
    InvalidMips {
        vm_id: usize,
        mips: f64,
    },

    #[error("Task {task_id} has invalid length: {length} MI")]
    InvalidTaskLength {
        task_id: usize,
        length: f64,
    },

    #[error("Invalid RHO weights ({w1}, {w2}): must be non-negative and sum to 1")]
    InvalidWeights {
        w1: f64,
        w2: f64,
    },

    #[error("Evaporation rate {0} is outside [0, 1]")]
    InvalidEvaporationRate(f64),

    #[error("Invalid ACO parameter {name}: {value}")]
    InvalidAcoParameter {
        name: &'static str,
        value: f64,
    },

    #[error("Policy state tracks {actual} VMs but {expected} were supplied")]
    StateMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("Policy state was not created by the {policy} policy")]
    StateKindMismatch {
        policy: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid range for {name}: [{min}, {max}]")]
    InvalidRange {
        name: &'static str,
        min: u64,
        max: u64,
    },

    #[error("Invalid task steps: {0}")]
    InvalidTaskSteps(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Result store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
