use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scheduler::PolicyKind;
use super::aggregator::PolicyMetrics;

const RESPONSE_WEIGHT: f64 = 0.5;
const THROUGHPUT_WEIGHT: f64 = 0.3;
const ENERGY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    Makespan,
    AvgResponseTime,
    Throughput,
    TotalEnergy,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Makespan,
        MetricKind::AvgResponseTime,
        MetricKind::Throughput,
        MetricKind::TotalEnergy,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Makespan => "Makespan_s",
            MetricKind::AvgResponseTime => "AvgResponseTime_s",
            MetricKind::Throughput => "Throughput_task_s",
            MetricKind::TotalEnergy => "TotalEnergy_kJ",
        }
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, MetricKind::Throughput)
    }

    pub fn value(&self, metrics: &PolicyMetrics) -> f64 {
        match self {
            MetricKind::Makespan => metrics.makespan_s,
            MetricKind::AvgResponseTime => metrics.avg_response_time_s,
            MetricKind::Throughput => metrics.throughput_tasks_per_s,
            MetricKind::TotalEnergy => metrics.total_energy_kj,
        }
    }
}

/// Percentage improvement of `value` over `baseline`; positive means better.
pub fn improvement(metric: MetricKind, value: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    if metric.higher_is_better() {
        (value - baseline) / baseline * 100.0
    } else {
        (baseline - value) / baseline * 100.0
    }
}

/// Final metrics of every policy, compared against Round Robin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub metrics: BTreeMap<PolicyKind, PolicyMetrics>,
}

impl Comparison {
    pub fn new(metrics: BTreeMap<PolicyKind, PolicyMetrics>) -> Self {
        Self { metrics }
    }

    pub fn baseline(&self) -> Option<&PolicyMetrics> {
        self.metrics.get(&PolicyKind::RoundRobin)
    }

    /// Improvement of `policy` over the baseline for `metric`, if both are present.
    pub fn improvement_over_baseline(&self, policy: PolicyKind, metric: MetricKind) -> Option<f64> {
        let baseline = self.baseline()?;
        let candidate = self.metrics.get(&policy)?;
        Some(improvement(metric, metric.value(candidate), metric.value(baseline)))
    }

    /// Overall 0-100 score per policy.
    ///
    /// Response time, throughput and energy are min-max normalized across the
    /// policies (a tie gives everyone full credit) and weighted 0.5 / 0.3 / 0.2.
    pub fn performance_scores(&self) -> BTreeMap<PolicyKind, f64> {
        let response = self.normalized(MetricKind::AvgResponseTime);
        let throughput = self.normalized(MetricKind::Throughput);
        let energy = self.normalized(MetricKind::TotalEnergy);

        self.metrics
            .keys()
            .map(|kind| {
                let score = RESPONSE_WEIGHT * response[kind]
                    + THROUGHPUT_WEIGHT * throughput[kind]
                    + ENERGY_WEIGHT * energy[kind];
                (*kind, 100.0 * score)
            })
            .collect()
    }

    fn normalized(&self, metric: MetricKind) -> BTreeMap<PolicyKind, f64> {
        let values: Vec<f64> = self.metrics.values().map(|m| metric.value(m)).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        self.metrics
            .iter()
            .map(|(kind, m)| {
                let v = metric.value(m);
                let credit = if !(range > 0.0) {
                    1.0
                } else if metric.higher_is_better() {
                    (v - min) / range
                } else {
                    (max - v) / range
                };
                (*kind, credit)
            })
            .collect()
    }

    /// Text table with one row per metric and the improvement of every other
    /// policy over Round Robin.
    pub fn render_table(&self) -> String {
        let others: Vec<PolicyKind> = self
            .metrics
            .keys()
            .copied()
            .filter(|k| *k != PolicyKind::RoundRobin)
            .collect();

        let mut header = vec![format!("{:<22}", "Metric")];
        header.extend(self.metrics.keys().map(|kind| format!("{:<15}", kind.name())));
        header.extend(
            others
                .iter()
                .map(|kind| format!("{:>22}", format!("Improvement ({} vs RR)", kind.name()))),
        );
        let header = header.join(" | ");

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');
        out.push_str(&"-".repeat(header.len()));
        out.push('\n');

        for metric in MetricKind::ALL {
            let mut row = vec![format!("{:<22}", metric.label())];
            row.extend(self.metrics.values().map(|m| format!("{:<15.2}", metric.value(m))));
            row.extend(others.iter().map(|kind| {
                match self.improvement_over_baseline(*kind, metric) {
                    Some(pct) => format!("{:>21.2}%", pct),
                    None => format!("{:>22}", "n/a"),
                }
            }));
            out.push_str(&row.join(" | "));
            out.push('\n');
        }

        out
    }
}
