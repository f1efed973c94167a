//! Parameter sweep utilities: many independent simulations over one tape.

use rayon::prelude::*;
use std::collections::HashMap;

use tradedesk_core::PriceTick;

use crate::config::{CommissionConfig, SimulationConfig};
use crate::runner::{run_simulation, RunError, SimulationResult};

/// Parameter grid.
///
/// Every combination of the listed values is applied on top of a base config.
/// An empty list keeps the base config's value for that parameter.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    pub initial_cash: Vec<f64>,
    pub commissions: Vec<CommissionConfig>,
    pub max_participation: Vec<Option<f64>>,
}

impl ParamGrid {
    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        self.initial_cash.len().max(1)
            * self.commissions.len().max(1)
            * self.max_participation.len().max(1)
    }

    /// Generates all configurations in the grid.
    pub fn generate_configs(&self, base: &SimulationConfig) -> Vec<SimulationConfig> {
        let cash = or_base(&self.initial_cash, base.initial_cash);
        let commissions = or_base(&self.commissions, base.commission.clone());
        let participation = or_base(&self.max_participation, base.max_participation);

        let mut configs = Vec::with_capacity(self.size());
        for &initial_cash in &cash {
            for commission in &commissions {
                for &max_participation in &participation {
                    let mut config = base.clone();
                    config.initial_cash = initial_cash;
                    config.commission = commission.clone();
                    config.max_participation = max_participation;
                    configs.push(config);
                }
            }
        }
        configs
    }
}

fn or_base<T: Clone>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

/// Parameter sweep executor.
///
/// Each configuration gets its own blotter and portfolio, so runs share
/// nothing but the read-only tape.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every config in the grid over `ticks`. The first failing run aborts the sweep.
    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base: &SimulationConfig,
        ticks: &[PriceTick],
    ) -> Result<SweepResults, RunError> {
        self.run_all(&grid.generate_configs(base), ticks)
    }

    pub fn run_all(
        &self,
        configs: &[SimulationConfig],
        ticks: &[PriceTick],
    ) -> Result<SweepResults, RunError> {
        let results: Vec<SimulationResult> = if self.parallel {
            configs
                .par_iter()
                .map(|config| run_simulation(config, ticks))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            configs
                .iter()
                .map(|config| run_simulation(config, ticks))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults::new(results))
    }
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug)]
pub struct SweepResults {
    results: Vec<SimulationResult>,
    by_run_id: HashMap<String, usize>,
}

impl SweepResults {
    fn new(results: Vec<SimulationResult>) -> Self {
        let by_run_id = results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.run_id.clone(), i))
            .collect();

        Self { results, by_run_id }
    }

    pub fn all(&self) -> &[SimulationResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Gets a result by RunId.
    pub fn get(&self, run_id: &str) -> Option<&SimulationResult> {
        self.by_run_id.get(run_id).map(|&i| &self.results[i])
    }

    /// Returns results sorted by final equity (descending).
    pub fn sorted_by_equity(&self) -> Vec<&SimulationResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| b.final_equity.total_cmp(&a.final_equity));
        sorted
    }
}
