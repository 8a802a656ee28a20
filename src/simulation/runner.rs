use anyhow::Result;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::cluster::{Task, Vm, WorkloadGenerator};
use crate::config::Config;
use crate::error::{ConfigError, SchedulerError};
use crate::metrics::{Comparison, PolicyMetrics};
use crate::scheduler::{
    run_policy, AcoPolicy, DecisionTrace, Policy, PolicyKind, PolicyRun, PolicyState, RhoPolicy,
    RoundRobinPolicy,
};
use crate::store::{ParamsRecord, ResultRecord, RunId, SimulationParams};

/// Random stream for one policy in one run.
///
/// Every policy gets its own generator so concurrent and sequential
/// execution make the same decisions.
pub fn policy_rng(seed: u64, kind: PolicyKind) -> Pcg64 {
    Pcg64::seed_from_u64(seed.wrapping_add(1 + kind.stream()))
}

/// Builds the three policies from configuration.
pub fn build_policies(config: &Config) -> Result<Vec<Policy>, SchedulerError> {
    Ok(vec![
        Policy::RoundRobin(RoundRobinPolicy::new()),
        Policy::Rho(RhoPolicy::new(config.rho.effective_weights())?),
        Policy::Aco(AcoPolicy::new(
            config.aco.alpha,
            config.aco.beta,
            config.aco.evaporation_rate,
        )?),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub task_count: usize,
    pub metrics: BTreeMap<PolicyKind, PolicyMetrics>,
    /// Queued MI per VM at the end of the step, per policy.
    pub vm_loads: BTreeMap<PolicyKind, Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub state: PolicyState,
    pub metrics: PolicyMetrics,
    pub traces: Vec<DecisionTrace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub run_id: RunId,
    pub params: SimulationParams,
    pub vms: Vec<Vm>,
    pub steps: Vec<StepResult>,
    pub final_outcomes: BTreeMap<PolicyKind, PolicyOutcome>,
}

impl ExperimentReport {
    pub fn comparison(&self) -> Comparison {
        Comparison::new(
            self.final_outcomes
                .iter()
                .map(|(kind, outcome)| (*kind, outcome.metrics.clone()))
                .collect(),
        )
    }

    pub fn params_record(&self) -> ParamsRecord {
        ParamsRecord::new(&self.run_id, self.params.clone())
    }

    /// One record per (policy, task step).
    pub fn result_records(&self) -> Vec<ResultRecord> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.metrics.iter().map(move |(kind, metrics)| {
                    let loads = step.vm_loads.get(kind).map(Vec::as_slice).unwrap_or_default();
                    ResultRecord::new(&self.run_id, *kind, step.task_count, metrics, loads)
                })
            })
            .collect()
    }

    /// Kept decision traces, grouped per policy.
    pub fn render_traces(&self) -> String {
        let mut out = String::new();
        for (kind, outcome) in &self.final_outcomes {
            out.push_str(&format!("--- {} Assignment Log ---\n", kind));
            if outcome.traces.is_empty() {
                out.push_str("No log entries.\n");
            }
            for trace in &outcome.traces {
                out.push_str(&trace.describe());
                out.push('\n');
            }
        }
        out
    }
}

/// Runs every policy over growing prefixes of one shared task list.
pub struct Experiment {
    config: Config,
    policies: Vec<Policy>,
}

impl Experiment {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let policies = build_policies(&config)?;
        Ok(Self { config, policies })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self) -> Result<ExperimentReport> {
        let sim = &self.config.simulation;
        let run_id = RunId::generate();
        let started = Instant::now();

        info!("Starting experiment {}", run_id);
        info!("Testing with task counts: {:?}", sim.task_steps);
        info!(
            "VMs: {}, RHO weights (T/E): {:?}, ACO (a/b/e): ({}, {}, {})",
            sim.num_vms,
            self.config.rho.effective_weights(),
            self.config.aco.alpha,
            self.config.aco.beta,
            self.config.aco.evaporation_rate
        );

        let workload = WorkloadGenerator::new(sim.seed).generate(sim)?;
        let vms = Arc::new(workload.vms);
        let tasks = Arc::new(workload.tasks);

        let mut steps = Vec::with_capacity(sim.task_steps.len());
        for &count in &sim.task_steps {
            info!("Simulating {} tasks", count);
            let runs = self.run_step(&vms, &tasks, count, false).await?;

            let metrics: BTreeMap<PolicyKind, PolicyMetrics> = runs
                .iter()
                .map(|(kind, run)| (*kind, PolicyMetrics::calculate(&run.state, &vms)))
                .collect();
            record_gauges(count, &metrics);

            let vm_loads = runs
                .into_iter()
                .map(|(kind, run)| (kind, run.state.vm_loads))
                .collect();

            steps.push(StepResult {
                task_count: count,
                metrics,
                vm_loads,
            });
        }

        // The largest step again, this time keeping decision traces.
        let final_runs = self.run_step(&vms, &tasks, sim.max_tasks(), true).await?;
        let final_outcomes = final_runs
            .into_iter()
            .map(|(kind, run)| {
                let metrics = PolicyMetrics::calculate(&run.state, &vms);
                (
                    kind,
                    PolicyOutcome {
                        state: run.state,
                        metrics,
                        traces: run.traces,
                    },
                )
            })
            .collect();

        info!(
            "Experiment {} complete ({:.2} seconds)",
            run_id,
            started.elapsed().as_secs_f64()
        );

        Ok(ExperimentReport {
            run_id,
            params: SimulationParams {
                simulation: sim.clone(),
                rho: self.config.rho.clone(),
                aco: self.config.aco.clone(),
            },
            vms: vms.as_ref().clone(),
            steps,
            final_outcomes,
        })
    }

    /// Runs each policy from a fresh state over `tasks[..count]`, one blocking
    /// task per policy.
    async fn run_step(
        &self,
        vms: &Arc<Vec<Vm>>,
        tasks: &Arc<Vec<Task>>,
        count: usize,
        traced: bool,
    ) -> Result<Vec<(PolicyKind, PolicyRun)>> {
        let seed = self.config.simulation.seed;
        let trace_limit = if traced { self.config.output.trace_limit } else { 0 };

        let handles: Vec<_> = self
            .policies
            .iter()
            .map(|policy| {
                let policy = policy.clone().with_tracing(traced);
                let vms = vms.clone();
                let tasks = tasks.clone();
                tokio::task::spawn_blocking(move || {
                    let kind = policy.kind();
                    let mut rng = policy_rng(seed, kind);
                    let end = count.min(tasks.len());
                    run_policy(&policy, &vms, &tasks[..end], &mut rng, trace_limit)
                        .map(|run| (kind, run))
                })
            })
            .collect();

        let mut runs = Vec::with_capacity(handles.len());
        for handle in handles {
            let (kind, run) = handle.await??;
            debug!(
                "{} finished {} tasks, total load {:.0} MI",
                kind,
                run.state.tasks_processed(),
                run.state.total_load()
            );
            runs.push((kind, run));
        }

        Ok(runs)
    }
}

fn record_gauges(task_count: usize, metrics: &BTreeMap<PolicyKind, PolicyMetrics>) {
    for (kind, m) in metrics {
        let policy = kind.name();
        ::metrics::gauge!("vmsched_makespan_seconds", "policy" => policy).set(m.makespan_s);
        ::metrics::gauge!("vmsched_avg_response_seconds", "policy" => policy)
            .set(m.avg_response_time_s);
        ::metrics::gauge!("vmsched_throughput_tasks_per_second", "policy" => policy)
            .set(m.throughput_tasks_per_s);
        ::metrics::gauge!("vmsched_energy_kilojoules", "policy" => policy).set(m.total_energy_kj);
        ::metrics::counter!("vmsched_tasks_assigned_total", "policy" => policy)
            .increment(task_count as u64);
    }
}
