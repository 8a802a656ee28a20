use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StoreError;
use super::records::{ParamsRecord, ResultRecord, RunId, StoredRecord};

/// Destination for run results.
pub trait ResultSink {
    /// Drops everything stored so far.
    fn clear(&mut self) -> Result<(), StoreError>;

    fn put_params(&mut self, record: &ParamsRecord) -> Result<(), StoreError>;

    fn put_results(&mut self, records: &[ResultRecord]) -> Result<(), StoreError>;
}

/// Appends one JSON document per line.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record stored for `run_id`, in write order.
    pub fn read_run(&self, run_id: &RunId) -> Result<Vec<StoredRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredRecord = serde_json::from_str(&line)?;
            if record.run_id() == run_id {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn append(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        debug!("Appended {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

impl ResultSink for JsonLinesSink {
    fn clear(&mut self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("Cleared previous results in {}", self.path.display());
        }
        Ok(())
    }

    fn put_params(&mut self, record: &ParamsRecord) -> Result<(), StoreError> {
        self.append(&[StoredRecord::Params(record.clone())])
    }

    fn put_results(&mut self, records: &[ResultRecord]) -> Result<(), StoreError> {
        let wrapped: Vec<StoredRecord> = records.iter().cloned().map(StoredRecord::Result).collect();
        self.append(&wrapped)
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub params: Vec<ParamsRecord>,
    pub results: Vec<ResultRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for MemorySink {
    fn clear(&mut self) -> Result<(), StoreError> {
        self.params.clear();
        self.results.clear();
        Ok(())
    }

    fn put_params(&mut self, record: &ParamsRecord) -> Result<(), StoreError> {
        self.params.push(record.clone());
        Ok(())
    }

    fn put_results(&mut self, records: &[ResultRecord]) -> Result<(), StoreError> {
        self.results.extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcoConfig, RhoConfig, SimulationConfig};
    use crate::metrics::PolicyMetrics;
    use crate::scheduler::PolicyKind;
    use crate::store::records::SimulationParams;

    fn params(run_id: &RunId) -> ParamsRecord {
        ParamsRecord::new(
            run_id,
            SimulationParams {
                simulation: SimulationConfig::default(),
                rho: RhoConfig::default(),
                aco: AcoConfig::default(),
            },
        )
    }

    fn result(run_id: &RunId, kind: PolicyKind, count: usize) -> ResultRecord {
        let metrics = PolicyMetrics {
            makespan_s: count as f64,
            avg_response_time_s: 1.0,
            throughput_tasks_per_s: 1.0,
            total_energy_kj: 1.0,
            tasks_processed: count,
            vm_finish_times: vec![count as f64],
        };
        ResultRecord::new(run_id, kind, count, &metrics, &[count as f64 * 100.0])
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vmsched-{}-{}.jsonl", name, std::process::id()))
    }

    #[test]
    fn test_json_lines_round_trip_per_run() {
        let path = temp_path("roundtrip");
        let mut sink = JsonLinesSink::new(&path);
        sink.clear().unwrap();

        let run_a = RunId::from("run-a");
        let run_b = RunId::from("run-b");
        sink.put_params(&params(&run_a)).unwrap();
        sink.put_results(&[result(&run_a, PolicyKind::Rho, 200), result(&run_a, PolicyKind::Aco, 200)])
            .unwrap();
        sink.put_results(&[result(&run_b, PolicyKind::Rho, 400)]).unwrap();

        let records = sink.read_run(&run_a).unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], StoredRecord::Params(_)));
        match &records[2] {
            StoredRecord::Result(r) => assert_eq!(r.key, "ACO-200"),
            other => panic!("unexpected record {other:?}"),
        }

        sink.clear().unwrap();
        assert!(sink.read_run(&run_a).unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        let run_id = RunId::from("mem");
        sink.put_params(&params(&run_id)).unwrap();
        sink.put_results(&[result(&run_id, PolicyKind::RoundRobin, 10)]).unwrap();
        assert_eq!(sink.results.len(), 1);

        sink.clear().unwrap();
        assert!(sink.params.is_empty());
        assert!(sink.results.is_empty());
    }
}
