pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod simulation;
pub mod store;
