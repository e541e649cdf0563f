use crate::SweepError;
use parley_core::{GameSetup, PolicyConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub base_seed: u64,
    pub trials_per_combo: usize,
    pub game: GameSetup,
    /// Knobs the grid does not vary are taken from here.
    pub base_policy: PolicyConfig,
    /// Per-trial wall clock limit. The host checks it between turns only, so
    /// an agent stuck inside a single `propose` call is never interrupted.
    pub trial_timeout_ms: Option<u64>,
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            base_seed: 0xC0FFEE,
            trials_per_combo: 20,
            game: GameSetup::default(),
            base_policy: PolicyConfig::default(),
            trial_timeout_ms: Some(5_000),
            threads: 0,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.trials_per_combo == 0 {
            return Err(SweepError::Config("trials per combination must be > 0".to_string()));
        }
        if self.trial_timeout_ms == Some(0) {
            return Err(SweepError::Config("trial timeout must be > 0".to_string()));
        }
        self.game.validate()?;
        Ok(())
    }
}

/// Value lists per tunable knob. An empty list keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub altruism: Vec<f64>,
    pub tau: Vec<f64>,
    pub epsilon_fresh: Vec<f64>,
    pub epsilon_mono: Vec<f64>,
    pub min_samples: Vec<u32>,
    pub ewma_alpha: Vec<f64>,
    pub weight_importance: Vec<f64>,
    pub weight_coherence: Vec<f64>,
    pub weight_freshness: Vec<f64>,
    pub weight_nonmonotony: Vec<f64>,
}

impl ParameterGrid {
    pub fn validate(&self) -> Result<(), SweepError> {
        check_all("altruism", &self.altruism, |v| (0.0..=1.0).contains(&v))?;
        check_all("tau", &self.tau, f64::is_finite)?;
        check_all("eps-fresh", &self.epsilon_fresh, f64::is_finite)?;
        check_all("eps-mono", &self.epsilon_mono, f64::is_finite)?;
        check_all("alpha", &self.ewma_alpha, |v| v > 0.0 && v <= 1.0)?;
        check_all("w-importance", &self.weight_importance, f64::is_finite)?;
        check_all("w-coherence", &self.weight_coherence, f64::is_finite)?;
        check_all("w-freshness", &self.weight_freshness, f64::is_finite)?;
        check_all("w-nonmonotony", &self.weight_nonmonotony, f64::is_finite)?;
        Ok(())
    }

    /// Cross product over the knobs, first knob outermost.
    pub fn combinations(&self, base: &PolicyConfig) -> Vec<PolicyConfig> {
        let mut configs = vec![*base];
        configs = expand(configs, &self.altruism, |c, v| c.altruism_use_prob = v);
        configs = expand(configs, &self.tau, |c, v| c.tau_margin = v);
        configs = expand(configs, &self.epsilon_fresh, |c, v| c.epsilon_fresh = v);
        configs = expand(configs, &self.epsilon_mono, |c, v| c.epsilon_mono = v);
        configs = expand(configs, &self.min_samples, |c, v| c.min_samples = v);
        configs = expand(configs, &self.ewma_alpha, |c, v| c.ewma_alpha = v);
        configs = expand(configs, &self.weight_importance, |c, v| c.weights.importance = v);
        configs = expand(configs, &self.weight_coherence, |c, v| c.weights.coherence = v);
        configs = expand(configs, &self.weight_freshness, |c, v| c.weights.freshness = v);
        configs = expand(configs, &self.weight_nonmonotony, |c, v| {
            c.weights.nonmonotony = v
        });
        configs
    }

    pub fn combination_count(&self) -> usize {
        [
            self.altruism.len(),
            self.tau.len(),
            self.epsilon_fresh.len(),
            self.epsilon_mono.len(),
            self.min_samples.len(),
            self.ewma_alpha.len(),
            self.weight_importance.len(),
            self.weight_coherence.len(),
            self.weight_freshness.len(),
            self.weight_nonmonotony.len(),
        ]
        .iter()
        .map(|n| (*n).max(1))
        .product()
    }
}

fn expand<T: Copy>(
    configs: Vec<PolicyConfig>,
    values: &[T],
    set: impl Fn(&mut PolicyConfig, T),
) -> Vec<PolicyConfig> {
    if values.is_empty() {
        return configs;
    }
    let mut out = Vec::with_capacity(configs.len() * values.len());
    for config in configs {
        for value in values {
            let mut next = config;
            set(&mut next, *value);
            out.push(next);
        }
    }
    out
}

fn check_all(knob: &str, values: &[f64], ok: impl Fn(f64) -> bool) -> Result<(), SweepError> {
    match values.iter().find(|v| !ok(**v)) {
        Some(bad) => Err(SweepError::Config(format!("{knob} value out of range: {bad}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_keeps_base() {
        let base = PolicyConfig {
            tau_margin: 0.2,
            ..PolicyConfig::default()
        };
        let combos = ParameterGrid::default().combinations(&base);
        assert_eq!(combos, vec![base]);
    }

    #[test]
    fn nested_order_first_knob_outermost() {
        let grid = ParameterGrid {
            altruism: vec![0.0, 0.5],
            tau: vec![0.1, 0.2, 0.3],
            ..ParameterGrid::default()
        };
        let combos = grid.combinations(&PolicyConfig::default());
        assert_eq!(combos.len(), 6);
        assert_eq!(grid.combination_count(), 6);
        let pairs = combos
            .iter()
            .map(|c| (c.altruism_use_prob, c.tau_margin))
            .collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![(0.0, 0.1), (0.0, 0.2), (0.0, 0.3), (0.5, 0.1), (0.5, 0.2), (0.5, 0.3)]
        );
    }

    #[test]
    fn weight_knobs_nest_inside_policy_knobs() {
        let grid = ParameterGrid {
            tau: vec![0.1, 0.2],
            weight_coherence: vec![0.5, 2.0],
            weight_nonmonotony: vec![0.0, 1.0, 3.0],
            ..ParameterGrid::default()
        };
        let base = PolicyConfig::default();
        let combos = grid.combinations(&base);
        assert_eq!(combos.len(), 12);
        assert_eq!(grid.combination_count(), 12);
        let triples = combos
            .iter()
            .map(|c| (c.tau_margin, c.weights.coherence, c.weights.nonmonotony))
            .collect::<Vec<_>>();
        assert_eq!(&triples[..4], &[
            (0.1, 0.5, 0.0),
            (0.1, 0.5, 1.0),
            (0.1, 0.5, 3.0),
            (0.1, 2.0, 0.0),
        ]);
        assert_eq!(triples[6], (0.2, 0.5, 0.0));
        assert!(combos.iter().all(|c| c.weights.importance == base.weights.importance
            && c.weights.freshness == base.weights.freshness));
        assert!(combos.iter().all(|c| c.weights.individual == base.weights.individual));
    }

    #[test]
    fn out_of_range_values_are_config_errors() {
        let grid = ParameterGrid {
            altruism: vec![1.5],
            ..ParameterGrid::default()
        };
        assert!(grid.validate().map_err(|e| e.is_config()).unwrap_err());
        let grid = ParameterGrid {
            ewma_alpha: vec![0.0],
            ..ParameterGrid::default()
        };
        assert!(grid.validate().is_err());
        let grid = ParameterGrid {
            weight_freshness: vec![f64::NAN],
            ..ParameterGrid::default()
        };
        assert!(grid.validate().is_err());
    }

    #[test]
    fn zero_trials_rejected() {
        let config = SweepConfig {
            trials_per_combo: 0,
            ..SweepConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
