pub mod records;
pub mod sink;

pub use records::{ParamsRecord, ResultRecord, RunId, SimulationParams, StoredRecord};
pub use sink::{JsonLinesSink, MemorySink, ResultSink};
