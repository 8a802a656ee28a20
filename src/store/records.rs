use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AcoConfig, RhoConfig, SimulationConfig};
use crate::metrics::PolicyMetrics;
use crate::scheduler::PolicyKind;

pub const PARAMS_KEY: &str = "params";

/// Identifier of one simulation run, e.g. `sim-run-2026-10-18-142501-3fa9c2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        let stamp = chrono::Local::now().format("%Y-%m-%d-%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("sim-run-{}-{}", stamp, &suffix[..6]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort key for one (policy, task count) pair, e.g. `ACO-400`.
pub fn result_key(kind: PolicyKind, task_count: usize) -> String {
    format!("{}-{}", kind.name(), task_count)
}

/// Metrics of one policy at one task count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "RunID")]
    pub run_id: RunId,
    #[serde(rename = "AlgorithmTaskCount")]
    pub key: String,
    #[serde(rename = "Algorithm")]
    pub algorithm: String,
    #[serde(rename = "TaskCount")]
    pub task_count: usize,
    #[serde(rename = "Makespan_s")]
    pub makespan_s: f64,
    #[serde(rename = "AvgResponseTime_s")]
    pub avg_response_time_s: f64,
    #[serde(rename = "Throughput_task_s")]
    pub throughput_task_s: f64,
    #[serde(rename = "TotalEnergy_kJ")]
    pub total_energy_kj: f64,
    #[serde(rename = "FinalVmLoads")]
    pub final_vm_loads: Vec<f64>,
}

impl ResultRecord {
    pub fn new(
        run_id: &RunId,
        kind: PolicyKind,
        task_count: usize,
        metrics: &PolicyMetrics,
        vm_loads: &[f64],
    ) -> Self {
        Self {
            run_id: run_id.clone(),
            key: result_key(kind, task_count),
            algorithm: kind.name().to_string(),
            task_count,
            makespan_s: metrics.makespan_s,
            avg_response_time_s: metrics.avg_response_time_s,
            throughput_task_s: metrics.throughput_tasks_per_s,
            total_energy_kj: metrics.total_energy_kj,
            final_vm_loads: vm_loads.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub simulation: SimulationConfig,
    pub rho: RhoConfig,
    pub aco: AcoConfig,
}

/// Parameters the run was started with, stored under the `params` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsRecord {
    #[serde(rename = "RunID")]
    pub run_id: RunId,
    #[serde(rename = "AlgorithmTaskCount")]
    pub key: String,
    #[serde(rename = "Algorithm")]
    pub algorithm: String,
    #[serde(rename = "Params")]
    pub params: SimulationParams,
}

impl ParamsRecord {
    pub fn new(run_id: &RunId, params: SimulationParams) -> Self {
        Self {
            run_id: run_id.clone(),
            key: PARAMS_KEY.to_string(),
            algorithm: "SimulationParameters".to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Params(ParamsRecord),
    Result(ResultRecord),
}

impl StoredRecord {
    pub fn run_id(&self) -> &RunId {
        match self {
            StoredRecord::Params(r) => &r.run_id,
            StoredRecord::Result(r) => &r.run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_shape() {
        let id = RunId::generate();
        let s = id.as_str();
        assert!(s.starts_with("sim-run-"));
        // sim-run- + YYYY-MM-DD-HHMMSS + - + 6 hex
        assert_eq!(s.len(), 8 + 17 + 1 + 6);
        assert!(s[s.len() - 6..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_result_record_keys() {
        let metrics = PolicyMetrics {
            makespan_s: 12.0,
            avg_response_time_s: 6.0,
            throughput_tasks_per_s: 2.0,
            total_energy_kj: 1.5,
            tasks_processed: 24,
            vm_finish_times: vec![12.0, 8.0],
        };
        let run_id = RunId::from("sim-run-test");
        let record = ResultRecord::new(&run_id, PolicyKind::Aco, 400, &metrics, &[1200.0, 800.0]);

        assert_eq!(record.key, "ACO-400");
        assert_eq!(result_key(PolicyKind::RoundRobin, 200), "Round Robin-200");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["RunID"], "sim-run-test");
        assert_eq!(json["AlgorithmTaskCount"], "ACO-400");
        assert_eq!(json["TotalEnergy_kJ"], 1.5);
    }

    #[test]
    fn test_untagged_records_are_told_apart() {
        let run_id = RunId::from("r1");
        let params = ParamsRecord::new(
            &run_id,
            SimulationParams {
                simulation: SimulationConfig::default(),
                rho: RhoConfig::default(),
                aco: AcoConfig::default(),
            },
        );

        let line = serde_json::to_string(&StoredRecord::Params(params)).unwrap();
        let parsed: StoredRecord = serde_json::from_str(&line).unwrap();
        assert!(matches!(parsed, StoredRecord::Params(ref p) if p.key == PARAMS_KEY));
        assert_eq!(parsed.run_id(), &run_id);
    }
}
