pub mod replay;
pub mod runner;

pub use replay::{LiveReplay, LiveSnapshot};
pub use runner::{build_policies, policy_rng, Experiment, ExperimentReport, PolicyOutcome, StepResult};
