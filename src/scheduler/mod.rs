pub mod aco;
pub mod estimation;
pub mod policy;
pub mod rho;
pub mod round_robin;

pub use aco::AcoPolicy;
pub use policy::{
    run_policy, Assignment, AssignmentPolicy, DecisionTrace, Policy, PolicyKind, PolicyRun,
    PolicyState, StateExtension,
};
pub use rho::RhoPolicy;
pub use round_robin::RoundRobinPolicy;
