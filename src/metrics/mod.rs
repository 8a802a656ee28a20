pub mod aggregator;
pub mod comparison;

pub use aggregator::PolicyMetrics;
pub use comparison::{Comparison, MetricKind};
