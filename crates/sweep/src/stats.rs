use crate::SimulationResult;
use parley_core::{AgentKind, PolicyConfig, ScoreBreakdown};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 below two values.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl StatSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count < 2 {
            0.0
        } else {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        };
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        Some(Self {
            count,
            mean,
            median,
            std,
            min: sorted[0],
            max: sorted[count - 1],
        })
    }
}

/// Aggregate over every completed trial of one (policy, roster) combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSummary {
    pub combo: usize,
    pub policy: PolicyConfig,
    pub roster: String,
    pub trials: usize,
    pub failures: usize,
    pub total_score: Option<StatSummary>,
    pub tracked_total: Option<StatSummary>,
    pub tracked_individual: Option<StatSummary>,
    pub tracked_rank: Option<StatSummary>,
    pub tracked_gap: Option<StatSummary>,
    pub best_total: Option<StatSummary>,
    /// Per-player totals pooled by archetype id, one value per seat per trial.
    pub kind_total: BTreeMap<String, StatSummary>,
    pub kind_individual: BTreeMap<String, StatSummary>,
    /// Shared score components keyed by name.
    pub components: BTreeMap<String, StatSummary>,
    pub mean_length: Option<f64>,
    pub early_termination_rate: Option<f64>,
    pub mean_pauses: Option<f64>,
    pub mean_unique_items: Option<f64>,
}

impl ConfigSummary {
    pub fn mean_total(&self) -> Option<f64> {
        self.total_score.map(|s| s.mean)
    }
}

/// Fold `results` into one summary. Results are ordered by trial index
/// first, so the outcome does not depend on completion order.
pub fn summarize(
    combo: usize,
    policy: PolicyConfig,
    roster: &str,
    results: &[SimulationResult],
    failures: usize,
) -> ConfigSummary {
    let mut ordered = results.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|r| r.trial);

    let mut components = BTreeMap::new();
    for (idx, (name, _)) in ScoreBreakdown::default().components().iter().enumerate() {
        // the shared ledger never carries an individual term
        if *name == "individual" {
            continue;
        }
        let values = column(&ordered, |r| r.shared.components()[idx].1);
        if let Some(stats) = StatSummary::from_values(&values) {
            components.insert((*name).to_string(), stats);
        }
    }

    ConfigSummary {
        combo,
        policy,
        roster: roster.to_string(),
        trials: ordered.len(),
        failures,
        total_score: StatSummary::from_values(&column(&ordered, |r| r.total_score)),
        tracked_total: StatSummary::from_values(&optional(&ordered, |r| r.tracked_total)),
        tracked_individual: StatSummary::from_values(&optional(&ordered, |r| {
            r.tracked_individual
        })),
        tracked_rank: StatSummary::from_values(&optional(&ordered, |r| r.tracked_rank)),
        tracked_gap: StatSummary::from_values(&optional(&ordered, |r| r.tracked_gap)),
        best_total: StatSummary::from_values(&column(&ordered, |r| r.best_total)),
        kind_total: by_kind(&ordered, |r| &r.player_scores),
        kind_individual: by_kind(&ordered, |r| &r.player_individual),
        components,
        mean_length: mean(&column(&ordered, |r| r.conversation_length as f64)),
        early_termination_rate: mean(&column(&ordered, |r| {
            if r.early_termination {
                1.0
            } else {
                0.0
            }
        })),
        mean_pauses: mean(&column(&ordered, |r| r.pause_count as f64)),
        mean_unique_items: mean(&column(&ordered, |r| r.unique_items as f64)),
    }
}

/// Highest mean total first; combinations without results sink to the end.
/// The sort is stable.
pub fn rank_summaries(summaries: &mut [ConfigSummary]) {
    summaries.sort_by(|a, b| match (a.mean_total(), b.mean_total()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn column(results: &[&SimulationResult], pick: impl Fn(&SimulationResult) -> f64) -> Vec<f64> {
    results.iter().map(|r| pick(*r)).collect()
}

fn optional(
    results: &[&SimulationResult],
    pick: impl Fn(&SimulationResult) -> Option<f64>,
) -> Vec<f64> {
    results.iter().filter_map(|r| pick(*r)).collect()
}

/// Pool per-player values by the archetype part of the label
/// (`greedy#2` → `greedy`).
fn by_kind(
    results: &[&SimulationResult],
    pick: impl Fn(&SimulationResult) -> &BTreeMap<String, f64>,
) -> BTreeMap<String, StatSummary> {
    let mut pooled: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for result in results {
        for (label, value) in pick(result) {
            pooled.entry(kind_of(label)).or_default().push(*value);
        }
    }
    pooled
        .into_iter()
        .filter_map(|(kind, values)| StatSummary::from_values(&values).map(|s| (kind, s)))
        .collect()
}

pub fn kind_of(label: &str) -> String {
    let prefix = label.split('#').next().unwrap_or(label);
    match AgentKind::from_alias(prefix) {
        Some(kind) => kind.id().to_string(),
        None => prefix.trim().to_string(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    StatSummary::from_values(values).map(|s| s.mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(trial: u64, total: f64, tracked: Option<f64>) -> SimulationResult {
        SimulationResult {
            trial,
            total_score: total,
            tracked_total: tracked,
            conversation_length: 10,
            pause_count: 2,
            early_termination: trial % 2 == 0,
            ..SimulationResult::default()
        }
    }

    #[test]
    fn stat_summary_of_values() {
        let stats = StatSummary::from_values(&[1.0, 2.0, 3.0, 6.0]).expect("stats");
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 6.0);
        assert!((stats.std - (14.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(StatSummary::from_values(&[4.0]).map(|s| s.std), Some(0.0));
        assert_eq!(StatSummary::from_values(&[]), None);
    }

    #[test]
    fn empty_combination_has_no_stats() {
        let summary = summarize(0, PolicyConfig::default(), "pause:1", &[], 3);
        assert_eq!(summary.trials, 0);
        assert_eq!(summary.failures, 3);
        assert_eq!(summary.total_score, None);
        assert_eq!(summary.mean_length, None);
        assert!(summary.components.is_empty());
    }

    #[test]
    fn summary_ignores_missing_tracked_values() {
        let results = vec![result(0, 2.0, Some(1.0)), result(1, 4.0, None)];
        let summary = summarize(0, PolicyConfig::default(), "x", &results, 0);
        assert_eq!(summary.total_score.map(|s| s.mean), Some(3.0));
        assert_eq!(summary.tracked_total.map(|s| s.count), Some(1));
        assert_eq!(summary.early_termination_rate, Some(0.5));
        assert_eq!(summary.mean_pauses, Some(2.0));
    }

    #[test]
    fn player_scores_pool_by_archetype() {
        let mut first = result(0, 3.0, None);
        first.best_total = 5.0;
        first.player_scores = BTreeMap::from([
            ("adaptive".to_string(), 5.0),
            ("greedy".to_string(), 4.0),
            ("greedy#2".to_string(), 2.0),
        ]);
        first.player_individual = BTreeMap::from([
            ("adaptive".to_string(), 1.0),
            ("greedy".to_string(), 0.5),
            ("greedy#2".to_string(), 0.25),
        ]);
        let mut second = result(1, 1.0, None);
        second.best_total = 3.0;
        second.player_scores = BTreeMap::from([
            ("adaptive".to_string(), 1.0),
            ("greedy".to_string(), 3.0),
            ("greedy#2".to_string(), 3.0),
        ]);

        let roster = "adaptive:1,greedy:2";
        let summary = summarize(0, PolicyConfig::default(), roster, &[first, second], 0);
        let greedy = summary.kind_total["greedy"];
        assert_eq!((greedy.count, greedy.mean), (4, 3.0));
        assert_eq!(summary.kind_total["adaptive"].mean, 3.0);
        assert_eq!(summary.kind_total.len(), 2);
        assert_eq!(summary.kind_individual["greedy"].count, 2);
        assert_eq!(summary.kind_individual["greedy"].mean, 0.375);
        assert_eq!(summary.best_total.map(|s| s.mean), Some(4.0));
    }

    #[test]
    fn labels_map_to_archetype_ids() {
        assert_eq!(kind_of("greedy#3"), "greedy");
        assert_eq!(kind_of("random_pause"), "random_pause");
        assert_eq!(kind_of("p10"), "adaptive");
        assert_eq!(kind_of("mystery#2"), "mystery");
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let mut summaries = vec![
            summarize(0, PolicyConfig::default(), "a", &[result(0, 1.0, None)], 0),
            summarize(1, PolicyConfig::default(), "b", &[], 1),
            summarize(2, PolicyConfig::default(), "c", &[result(1, 5.0, None)], 0),
            summarize(3, PolicyConfig::default(), "d", &[result(2, 1.0, None)], 0),
        ];
        rank_summaries(&mut summaries);
        let order = summaries.iter().map(|s| s.roster.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["c", "a", "d", "b"]);
    }
}
