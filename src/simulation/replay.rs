use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::cluster::{Task, Vm};
use crate::error::SchedulerError;
use crate::metrics::PolicyMetrics;
use crate::scheduler::{AssignmentPolicy, Policy, PolicyKind, PolicyState};
use super::runner::policy_rng;

const MIN_TICK: Duration = Duration::from_millis(1);

/// Metrics of every policy right after one task was placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub task_index: usize,
    pub task_id: usize,
    pub chosen: BTreeMap<PolicyKind, usize>,
    pub metrics: BTreeMap<PolicyKind, PolicyMetrics>,
}

struct Lane {
    policy: Policy,
    state: PolicyState,
    rng: Pcg64,
}

/// Feeds tasks to every policy at a fixed pace and publishes online metrics.
///
/// Pacing only affects when snapshots are emitted; decisions match an
/// unpaced run with the same seed.
pub struct LiveReplay {
    lanes: Vec<Lane>,
    vms: Vec<Vm>,
    tasks: Vec<Task>,
    tick: Duration,
}

impl LiveReplay {
    pub fn new(policies: Vec<Policy>, vms: Vec<Vm>, tasks: Vec<Task>, seed: u64, tick: Duration) -> Self {
        let lanes = policies
            .into_iter()
            .map(|policy| {
                let state = policy.initial_state(vms.len());
                let rng = policy_rng(seed, policy.kind());
                Lane { policy, state, rng }
            })
            .collect();

        Self {
            lanes,
            vms,
            tasks,
            tick: tick.max(MIN_TICK),
        }
    }

    /// Starts the replay on the runtime. Dropping the receiver stops it early.
    pub fn spawn(
        self,
        buffer: usize,
    ) -> (
        mpsc::Receiver<LiveSnapshot>,
        JoinHandle<Result<BTreeMap<PolicyKind, PolicyState>, SchedulerError>>,
    ) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    async fn run(
        self,
        tx: mpsc::Sender<LiveSnapshot>,
    ) -> Result<BTreeMap<PolicyKind, PolicyState>, SchedulerError> {
        let LiveReplay {
            mut lanes,
            vms,
            tasks,
            tick,
        } = self;
        info!("Starting live replay of {} tasks", tasks.len());

        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for (task_index, task) in tasks.iter().enumerate() {
            ticker.tick().await;

            let mut chosen = BTreeMap::new();
            let mut metrics = BTreeMap::new();
            let mut advanced = Vec::with_capacity(lanes.len());
            for mut lane in lanes {
                let assignment = lane.policy.assign_next(lane.state, &vms, task, &mut lane.rng)?;
                lane.state = assignment.state;

                let kind = lane.policy.kind();
                chosen.insert(kind, assignment.vm_id);
                metrics.insert(kind, PolicyMetrics::calculate(&lane.state, &vms));
                advanced.push(lane);
            }
            lanes = advanced;

            let snapshot = LiveSnapshot {
                task_index,
                task_id: task.id,
                chosen,
                metrics,
            };
            if tx.send(snapshot).await.is_err() {
                debug!("Live replay receiver dropped after {} tasks", task_index + 1);
                break;
            }
        }

        Ok(lanes
            .into_iter()
            .map(|lane| (lane.policy.kind(), lane.state))
            .collect())
    }
}
