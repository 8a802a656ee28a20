pub mod entities;
pub mod generator;

pub use entities::{Task, Vm};
pub use generator::{Workload, WorkloadGenerator};
