use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::ConfigError;
use crate::scheduler::{AcoPolicy, RhoPolicy};

/// Tolerance used when deciding whether the RHO weight pair already sums to 1.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub rho: RhoConfig,
    pub aco: AcoConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_vms: usize,
    pub vm_mips_range: (u64, u64),
    pub task_length_range: (u64, u64),
    pub task_steps: Vec<usize>,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_vms: 10,
            vm_mips_range: (100, 1000),
            task_length_range: (1000, 20000),
            task_steps: vec![200, 400, 600, 800, 1000],
            seed: 42,
        }
    }
}

impl SimulationConfig {
    pub fn max_tasks(&self) -> usize {
        self.task_steps.last().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RhoConfig {
    /// Weight of the expected-finish-time term.
    pub w1: f64,
    /// Weight of the peak-power term.
    pub w2: f64,
    /// Rescale the pair to sum to 1 before handing it to the policy.
    pub normalize_weights: bool,
}

impl Default for RhoConfig {
    fn default() -> Self {
        Self {
            w1: 0.7,
            w2: 0.3,
            normalize_weights: true,
        }
    }
}

impl RhoConfig {
    /// Weight pair as the policy should receive it.
    ///
    /// The policy never rescales weights itself, so the driver does it here
    /// when `normalize_weights` is set and the pair is off by more than the
    /// tolerance.
    pub fn effective_weights(&self) -> (f64, f64) {
        let total = self.w1 + self.w2;
        if self.normalize_weights
            && total.is_finite()
            && total > 0.0
            && (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE
        {
            let normalized = (self.w1 / total, self.w2 / total);
            warn!(
                "RHO weights ({}, {}) do not sum to 1, normalized to ({:.3}, {:.3})",
                self.w1, self.w2, normalized.0, normalized.1
            );
            normalized
        } else {
            (self.w1, self.w2)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AcoConfig {
    pub alpha: f64,
    pub beta: f64,
    pub evaporation_rate: f64,
}

impl Default for AcoConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 2.0,
            evaporation_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_path: Option<String>,
    pub trace_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: None,
            trace_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults, then the TOML file when it exists, then `VMSCHED_*` environment
    /// variables (`VMSCHED_ACO__BETA=3.0` sets `aco.beta`).
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Config::default())?);

        if Path::new(path).exists() {
            builder = builder.add_source(::config::File::new(path, ::config::FileFormat::Toml));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("VMSCHED")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;

        if sim.num_vms == 0 {
            return Err(ConfigError::Invalid("num_vms must be at least 1".to_string()));
        }

        check_range("vm_mips_range", sim.vm_mips_range)?;
        check_range("task_length_range", sim.task_length_range)?;

        if sim.task_steps.is_empty() {
            return Err(ConfigError::InvalidTaskSteps("no task steps given".to_string()));
        }
        if sim.task_steps[0] == 0 {
            return Err(ConfigError::InvalidTaskSteps("task steps must be positive".to_string()));
        }
        if sim.task_steps.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::InvalidTaskSteps(format!(
                "steps must be strictly increasing: {:?}",
                sim.task_steps
            )));
        }

        RhoPolicy::new(self.rho.effective_weights())?;
        AcoPolicy::new(self.aco.alpha, self.aco.beta, self.aco.evaporation_rate)?;

        Ok(())
    }
}

fn check_range(name: &'static str, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if min == 0 || min > max {
        return Err(ConfigError::InvalidRange { name, min, max });
    }
    Ok(())
}
