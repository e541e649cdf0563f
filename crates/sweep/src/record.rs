use crate::{rank_summaries, summarize, ConfigSummary, SimulationResult, SweepError, TrialFailure};
use parley_core::{GameSetup, PolicyConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepMetadata {
    pub base_seed: u64,
    pub trials_per_combo: usize,
    pub game: GameSetup,
    pub rosters: Vec<String>,
    pub combinations: usize,
    pub planned_trials: usize,
    pub completed_trials: usize,
    pub failed_trials: usize,
    pub skipped_trials: usize,
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

/// Everything a sweep produced, ranked summaries included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepFile {
    pub schema_version: u32,
    pub metadata: SweepMetadata,
    pub results: Vec<SimulationResult>,
    pub failures: Vec<TrialFailure>,
    pub summaries: Vec<ConfigSummary>,
}

/// `Bare` comes first: with `#[serde(default)]` on `SweepFile`, serde would
/// also accept an empty list as a wrapped file.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSweep {
    Bare(Vec<SimulationResult>),
    Wrapped(SweepFile),
}

impl SweepFile {
    /// Rebuild summaries from bare results, grouping by combination, roster
    /// and policy in first-seen order. Older records carry no `combo`, so the
    /// policy is what keeps their configurations apart.
    pub fn from_results(results: Vec<SimulationResult>) -> Self {
        let mut groups: Vec<(usize, String, PolicyConfig)> = Vec::new();
        for result in &results {
            let key = (result.combo, result.roster.clone(), result.policy);
            if !groups.contains(&key) {
                groups.push(key);
            }
        }
        let mut summaries = groups
            .into_iter()
            .map(|(combo, roster, policy)| {
                let members = results
                    .iter()
                    .filter(|r| r.combo == combo && r.roster == roster && r.policy == policy)
                    .cloned()
                    .collect::<Vec<_>>();
                summarize(combo, policy, &roster, &members, 0)
            })
            .collect::<Vec<_>>();
        rank_summaries(&mut summaries);
        let mut rosters: Vec<String> = Vec::new();
        for result in &results {
            if !rosters.contains(&result.roster) {
                rosters.push(result.roster.clone());
            }
        }
        Self {
            schema_version: 1,
            metadata: SweepMetadata {
                rosters,
                combinations: summaries.len(),
                planned_trials: results.len(),
                completed_trials: results.len(),
                ..SweepMetadata::default()
            },
            results,
            failures: Vec::new(),
            summaries,
        }
    }

    pub fn to_text_report(&self) -> String {
        let meta = &self.metadata;
        let mut lines = vec![
            format!(
                "sweep: schema={} seed={} trials/combo={} combinations={}",
                self.schema_version, meta.base_seed, meta.trials_per_combo, meta.combinations
            ),
            format!(
                "trials: planned={} completed={} failed={} skipped={}{}",
                meta.planned_trials,
                meta.completed_trials,
                meta.failed_trials,
                meta.skipped_trials,
                if meta.cancelled { " (cancelled)" } else { "" }
            ),
            format!(
                "game: subjects={} memory={} length={} elapsed={:.2}s",
                meta.game.subjects, meta.game.memory_size, meta.game.conversation_length, meta.elapsed_secs
            ),
            String::new(),
            "ranking:".to_string(),
        ];
        if self.summaries.is_empty() {
            lines.push("  (none)".to_string());
        }
        for (rank, summary) in self.summaries.iter().enumerate() {
            lines.push(format!(
                "  #{:<3} {} | {}",
                rank + 1,
                summary.roster,
                summary.policy.short_label()
            ));
            lines.push(format!(
                "       trials={} failures={}",
                summary.trials, summary.failures
            ));
            match summary.total_score {
                Some(total) => lines.push(format!(
                    "       total: mean={:.4} std={:.4} range=[{:.4}, {:.4}]",
                    total.mean, total.std, total.min, total.max
                )),
                None => lines.push("       total: (no completed trials)".to_string()),
            }
            if let Some(tracked) = summary.tracked_total {
                lines.push(format!(
                    "       tracked: mean={:.4} std={:.4} rank={} gap={}",
                    tracked.mean,
                    tracked.std,
                    fmt_mean(summary.tracked_rank.map(|s| s.mean)),
                    fmt_mean(summary.tracked_gap.map(|s| s.mean))
                ));
            }
            if let Some(best) = summary.best_total {
                lines.push(format!(
                    "       best player: mean={:.4} std={:.4}",
                    best.mean, best.std
                ));
            }
            for (kind, total) in &summary.kind_total {
                let individual = summary.kind_individual.get(kind).map(|s| s.mean);
                lines.push(format!(
                    "       {kind:<13} n={} total={:.4} std={:.4} individual={}",
                    total.count,
                    total.mean,
                    total.std,
                    fmt_mean(individual)
                ));
            }
            if summary.trials > 0 {
                lines.push(format!(
                    "       length={} early_stop={} pauses={} unique_items={}",
                    fmt_mean(summary.mean_length),
                    fmt_mean(summary.early_termination_rate),
                    fmt_mean(summary.mean_pauses),
                    fmt_mean(summary.mean_unique_items)
                ));
                let parts = summary
                    .components
                    .iter()
                    .map(|(name, stats)| format!("{name}={:.3}", stats.mean))
                    .collect::<Vec<_>>();
                lines.push(format!("       components: {}", parts.join(" ")));
            }
        }
        if !self.failures.is_empty() {
            lines.push(String::new());
            lines.push("failures:".to_string());
            for failure in &self.failures {
                lines.push(format!(
                    "  trial {} seed {} [{}]: {}",
                    failure.trial, failure.seed, failure.roster, failure.error
                ));
            }
        }
        lines.join("\n")
    }
}

fn fmt_mean(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.3}"),
        None => "-".to_string(),
    }
}

/// Accepts the wrapped file and the older bare list of results. Missing
/// summaries are rebuilt from the results.
pub fn parse_sweep(text: &str) -> Result<SweepFile, SweepError> {
    match serde_json::from_str::<StoredSweep>(text)? {
        StoredSweep::Bare(results) => Ok(SweepFile::from_results(results)),
        StoredSweep::Wrapped(file) => {
            if file.summaries.is_empty() && !file.results.is_empty() {
                let rebuilt = SweepFile::from_results(file.results);
                return Ok(SweepFile {
                    schema_version: file.schema_version,
                    metadata: file.metadata,
                    failures: file.failures,
                    ..rebuilt
                });
            }
            Ok(file)
        }
    }
}

pub fn load_sweep(path: &Path) -> Result<SweepFile, SweepError> {
    let text = fs::read_to_string(path)?;
    parse_sweep(&text)
}

pub fn write_json(path: &Path, sweep: &SweepFile) -> Result<(), SweepError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(sweep)?;
    fs::write(path, body)?;
    Ok(())
}

pub fn write_text(path: &Path, sweep: &SweepFile) -> Result<(), SweepError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, sweep.to_text_report())?;
    Ok(())
}
