use crate::{PlayerId, PolicyConfig};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    pub mean: f64,
    pub samples: u32,
}

impl RunningMean {
    /// First sample seeds the mean; later samples move it by `alpha`.
    pub fn observe(&mut self, value: f64, alpha: f64) {
        if self.samples == 0 {
            self.mean = value;
        } else {
            self.mean += alpha * (value - self.mean);
        }
        self.samples = self.samples.saturating_add(1);
    }
}

/// EWMA estimates of each opponent's marginal contribution, plus a global
/// fallback used until an opponent has enough samples.
#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    alpha: f64,
    min_samples: u32,
    global: RunningMean,
    by_player: HashMap<PlayerId, RunningMean>,
}

impl PerformanceTracker {
    pub fn new(alpha: f64, min_samples: u32) -> Self {
        Self {
            alpha,
            min_samples,
            global: RunningMean::default(),
            by_player: HashMap::new(),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.ewma_alpha, config.min_samples)
    }

    pub fn update(&mut self, opponent: PlayerId, delta: f64) {
        self.global.observe(delta, self.alpha);
        self.by_player
            .entry(opponent)
            .or_default()
            .observe(delta, self.alpha);
    }

    pub fn trusted_mean(&self, opponent: PlayerId) -> f64 {
        match self.by_player.get(&opponent) {
            Some(entry) if entry.samples >= self.min_samples => entry.mean,
            _ => self.global.mean,
        }
    }

    pub fn global_mean(&self) -> f64 {
        self.global.mean
    }

    pub fn global_samples(&self) -> u32 {
        self.global.samples
    }

    pub fn samples(&self, opponent: PlayerId) -> u32 {
        self.by_player
            .get(&opponent)
            .map(|entry| entry.samples)
            .unwrap_or(0)
    }

    pub fn known_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.by_player.keys().copied()
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_global_mean() {
        let mut tracker = PerformanceTracker::new(0.1, 3);
        assert_eq!(tracker.global_mean(), 0.0);
        tracker.update(PlayerId(1), 2.0);
        assert_eq!(tracker.global_mean(), 2.0);
        tracker.update(PlayerId(2), 1.0);
        assert!((tracker.global_mean() - 1.9).abs() < 1e-12);
        assert_eq!(tracker.global_samples(), 2);
    }

    #[test]
    fn trusted_mean_switches_at_min_samples() {
        let mut tracker = PerformanceTracker::new(0.5, 3);
        // noise from another opponent drives the global mean
        tracker.update(PlayerId(9), -4.0);
        tracker.update(PlayerId(1), 2.0);
        tracker.update(PlayerId(1), 2.0);
        assert_eq!(tracker.samples(PlayerId(1)), 2);
        assert_eq!(tracker.trusted_mean(PlayerId(1)), tracker.global_mean());

        tracker.update(PlayerId(1), 2.0);
        assert_eq!(tracker.samples(PlayerId(1)), 3);
        assert_eq!(tracker.trusted_mean(PlayerId(1)), 2.0);
        assert_ne!(tracker.trusted_mean(PlayerId(1)), tracker.global_mean());
    }

    #[test]
    fn unknown_opponent_uses_global() {
        let mut tracker = PerformanceTracker::new(0.1, 1);
        tracker.update(PlayerId(1), 0.7);
        assert_eq!(tracker.trusted_mean(PlayerId(42)), 0.7);
        assert_eq!(tracker.samples(PlayerId(42)), 0);
    }
}
