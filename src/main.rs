use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vmsched_sim::cluster::WorkloadGenerator;
use vmsched_sim::config::Config;
use vmsched_sim::simulation::{build_policies, Experiment, ExperimentReport, LiveReplay, LiveSnapshot};
use vmsched_sim::store::{JsonLinesSink, ResultSink};

#[derive(Parser)]
#[command(name = "vmsched-sim")]
#[command(about = "Compares Round Robin, RHO and ACO task-to-VM assignment on a simulated cluster")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Overrides `simulation.seed`.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    num_vms: Option<usize>,

    /// Comma separated task counts, e.g. `200,400,600`.
    #[arg(long, value_delimiter = ',')]
    task_steps: Option<Vec<usize>>,

    /// JSON-lines file receiving the run's records.
    #[arg(long)]
    results: Option<String>,

    /// Remove earlier records from the results file before writing.
    #[arg(long)]
    clear_results: bool,

    /// Replay the largest step task by task instead of running the experiment.
    #[arg(long)]
    live: bool,

    #[arg(long, default_value = "100")]
    live_interval_ms: u64,

    #[arg(long)]
    show_traces: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if let Some(num_vms) = self.num_vms {
            config.simulation.num_vms = num_vms;
        }
        if let Some(steps) = &self.task_steps {
            config.simulation.task_steps = steps.clone();
        }
        if let Some(path) = &self.results {
            config.output.results_path = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    cli.apply(&mut config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;

    if cli.live {
        return run_live(config, Duration::from_millis(cli.live_interval_ms)).await;
    }

    let experiment = Experiment::new(config)?;
    let report = experiment.run().await?;
    print_report(&report, cli.show_traces);

    if let Some(path) = &experiment.config().output.results_path {
        let mut sink = JsonLinesSink::new(path);
        if cli.clear_results {
            sink.clear()?;
        }
        store_report(&mut sink, &report)
            .with_context(|| format!("failed to write results to {}", path))?;
        info!("Results for {} written to {}", report.run_id, path);
    }

    Ok(())
}

fn print_report(report: &ExperimentReport, show_traces: bool) {
    let comparison = report.comparison();

    println!("\n=== Final comparison ({} tasks) ===", report.params.simulation.max_tasks());
    println!("{}", comparison.render_table());

    println!("=== Performance score (0-100) ===");
    for (kind, score) in comparison.performance_scores() {
        println!("{:<12} {:>6.2}", kind.name(), score);
    }

    println!("\n=== Final VM loads (MI) ===");
    for (kind, outcome) in &report.final_outcomes {
        let loads: Vec<String> = outcome.state.vm_loads.iter().map(|l| format!("{:.0}", l)).collect();
        println!("{:<12} [{}]", kind.name(), loads.join(", "));
    }

    if show_traces {
        println!();
        print!("{}", report.render_traces());
    }
}

fn store_report<S: ResultSink>(sink: &mut S, report: &ExperimentReport) -> Result<()> {
    sink.put_params(&report.params_record())?;
    sink.put_results(&report.result_records())?;
    Ok(())
}

async fn run_live(config: Config, tick: Duration) -> Result<()> {
    let sim = &config.simulation;
    let workload = WorkloadGenerator::new(sim.seed).generate(sim)?;
    let policies = build_policies(&config)?;

    info!(
        "Live replay of {} tasks on {} VMs, one task every {:?}",
        workload.tasks.len(),
        workload.vms.len(),
        tick
    );

    let replay = LiveReplay::new(policies, workload.vms, workload.tasks, sim.seed, tick);
    let (mut rx, handle) = replay.spawn(16);

    loop {
        tokio::select! {
            snapshot = rx.recv() => match snapshot {
                Some(snapshot) => print_snapshot(&snapshot),
                None => break,
            },
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received, stopping replay...");
                break;
            }
        }
    }

    drop(rx);
    let states = handle.await??;
    for (kind, state) in states {
        info!("{} placed {} tasks", kind, state.tasks_processed());
    }

    Ok(())
}

fn print_snapshot(snapshot: &LiveSnapshot) {
    let line: Vec<String> = snapshot
        .metrics
        .iter()
        .map(|(kind, m)| {
            format!(
                "{} -> VM {:<3} makespan {:>9.2}s resp {:>9.2}s energy {:>8.2}kJ",
                kind.name(),
                snapshot.chosen.get(kind).copied().unwrap_or_default(),
                m.makespan_s,
                m.avg_response_time_s,
                m.total_energy_kj
            )
        })
        .collect();
    println!("Task {:>5} | {}", snapshot.task_id, line.join(" | "));
}
