use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub importance: f64,
    pub coherence: f64,
    pub freshness: f64,
    /// Applied to the (non-positive) nonmonotony component, so a positive
    /// weight subtracts the penalty.
    pub nonmonotony: f64,
    pub individual: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            importance: 1.0,
            coherence: 1.0,
            freshness: 1.0,
            nonmonotony: 1.0,
            individual: 1.0,
        }
    }
}

impl ScoreWeights {
    /// Weights of the host's shared ledger: no private utility.
    pub fn shared_only() -> Self {
        Self {
            individual: 0.0,
            ..Self::default()
        }
    }
}

/// Hyperparameters of the adaptive decision policy. Fixed for a whole trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub altruism_use_prob: f64,
    pub tau_margin: f64,
    pub epsilon_fresh: f64,
    pub epsilon_mono: f64,
    pub min_samples: u32,
    pub ewma_alpha: f64,
    pub weights: ScoreWeights,
    pub max_consecutive_pauses: u32,
    pub current_speaker_edge: f64,
    pub last_turn_threshold: f64,
    pub repeat_keeps_individual: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            altruism_use_prob: 0.0,
            tau_margin: 0.05,
            epsilon_fresh: 0.05,
            epsilon_mono: 0.05,
            min_samples: 3,
            ewma_alpha: 0.10,
            weights: ScoreWeights::default(),
            max_consecutive_pauses: 2,
            current_speaker_edge: 0.5,
            last_turn_threshold: 0.0,
            repeat_keeps_individual: false,
        }
    }
}

impl PolicyConfig {
    pub fn short_label(&self) -> String {
        format!(
            "altruism={:.2} tau={:.2} fresh={:.2} mono={:.2} min_samples={} alpha={:.2} weights={:.2}/{:.2}/{:.2}/{:.2}",
            self.altruism_use_prob,
            self.tau_margin,
            self.epsilon_fresh,
            self.epsilon_mono,
            self.min_samples,
            self.ewma_alpha,
            self.weights.importance,
            self.weights.coherence,
            self.weights.freshness,
            self.weights.nonmonotony
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: PolicyConfig =
            serde_json::from_str(r#"{"altruism_use_prob":0.5,"tau_margin":0.1}"#).expect("parse");
        assert_eq!(cfg.altruism_use_prob, 0.5);
        assert_eq!(cfg.tau_margin, 0.1);
        assert_eq!(cfg.min_samples, 3);
        assert_eq!(cfg.weights, ScoreWeights::default());
        assert_eq!(cfg.max_consecutive_pauses, 2);
    }

    #[test]
    fn partial_weights_keep_unit_defaults() {
        let cfg: PolicyConfig =
            serde_json::from_str(r#"{"weights":{"coherence":2.0}}"#).expect("parse");
        assert_eq!(cfg.weights.coherence, 2.0);
        assert_eq!(cfg.weights.importance, 1.0);
        assert_eq!(cfg.weights.nonmonotony, 1.0);
    }
}
