use crate::{GameHost, RosterSpec, SweepConfig, SweepError, TrialSpec};
use parley_core::{AgentKind, PolicyConfig, ScoreBreakdown, Slot, TrialRecord};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Archetype whose scores are tracked separately in every result.
pub const TRACKED_KIND: AgentKind = AgentKind::Adaptive;

/// One scheduled trial. `index` is global across the whole sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrial {
    pub index: u64,
    pub combo: usize,
    pub seed: u64,
    pub policy: PolicyConfig,
    pub roster: RosterSpec,
}

impl PlannedTrial {
    /// The deadline starts counting when the spec is built.
    pub fn spec(&self, config: &SweepConfig) -> TrialSpec {
        TrialSpec {
            setup: config.game,
            roster: self.roster.seats(),
            policy: self.policy,
            seed: self.seed,
            deadline: config
                .trial_timeout_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationResult {
    pub trial: u64,
    pub combo: usize,
    pub seed: u64,
    pub policy: PolicyConfig,
    pub roster: String,
    pub total_score: f64,
    pub shared: ScoreBreakdown,
    pub player_scores: BTreeMap<String, f64>,
    pub player_individual: BTreeMap<String, f64>,
    pub player_ranks: BTreeMap<String, u32>,
    pub player_contributions: BTreeMap<String, u32>,
    pub conversation_length: usize,
    pub early_termination: bool,
    pub pause_count: usize,
    pub unique_items: usize,
    pub execution_secs: f64,
    pub tracked_instances: usize,
    pub tracked_total: Option<f64>,
    pub tracked_individual: Option<f64>,
    pub tracked_rank: Option<f64>,
    pub best_total: f64,
    pub tracked_gap: Option<f64>,
}

impl SimulationResult {
    pub fn from_record(planned: &PlannedTrial, record: &TrialRecord, elapsed: Duration) -> Self {
        let totals = record
            .participants
            .iter()
            .map(|p| p.total)
            .collect::<Vec<_>>();
        let ranks = competition_ranks(&totals);
        let best_total = totals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let best_total = if best_total.is_finite() { best_total } else { 0.0 };

        let mut result = Self {
            trial: planned.index,
            combo: planned.combo,
            seed: planned.seed,
            policy: planned.policy,
            roster: planned.roster.label(),
            total_score: record.shared_total,
            shared: record.shared,
            conversation_length: record.history.len(),
            early_termination: record.early_termination,
            pause_count: record.history.iter().filter(|s| s.is_pause()).count(),
            unique_items: record
                .history
                .iter()
                .filter_map(Slot::item)
                .map(|item| item.id)
                .collect::<HashSet<_>>()
                .len(),
            execution_secs: elapsed.as_secs_f64(),
            best_total,
            ..Self::default()
        };

        let mut tracked = Vec::new();
        for (participant, rank) in record.participants.iter().zip(&ranks) {
            let label = participant.label.clone();
            result.player_scores.insert(label.clone(), participant.total);
            result
                .player_individual
                .insert(label.clone(), participant.individual);
            result.player_ranks.insert(label.clone(), *rank);
            result
                .player_contributions
                .insert(label, participant.contributions);
            if participant.kind == TRACKED_KIND {
                tracked.push((participant.total, participant.individual, *rank));
            }
        }
        if !tracked.is_empty() {
            let n = tracked.len() as f64;
            let total = tracked.iter().map(|t| t.0).sum::<f64>() / n;
            result.tracked_instances = tracked.len();
            result.tracked_total = Some(total);
            result.tracked_individual = Some(tracked.iter().map(|t| t.1).sum::<f64>() / n);
            result.tracked_rank = Some(tracked.iter().map(|t| f64::from(t.2)).sum::<f64>() / n);
            result.tracked_gap = Some(best_total - total);
        }
        result
    }
}

/// A trial that did not produce a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialFailure {
    pub trial: u64,
    pub combo: usize,
    pub seed: u64,
    pub roster: String,
    pub error: String,
}

impl TrialFailure {
    pub fn new(planned: &PlannedTrial, error: &SweepError) -> Self {
        Self {
            trial: planned.index,
            combo: planned.combo,
            seed: planned.seed,
            roster: planned.roster.label(),
            error: error.to_string(),
        }
    }
}

/// Run one planned trial. Host errors, deadline overruns and panics all come
/// back as `SweepError::Trial`.
pub fn run_trial<H: GameHost + ?Sized>(
    host: &H,
    planned: &PlannedTrial,
    config: &SweepConfig,
) -> Result<SimulationResult, SweepError> {
    let spec = planned.spec(config);
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| host.run_trial(&spec)));
    let elapsed = started.elapsed();
    match outcome {
        Ok(Ok(record)) => Ok(SimulationResult::from_record(planned, &record, elapsed)),
        Ok(Err(err)) => Err(SweepError::Trial(err.to_string())),
        Err(payload) => Err(SweepError::Trial(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Rank 1 is the highest total; equal totals share a rank.
pub fn competition_ranks(totals: &[f64]) -> Vec<u32> {
    totals
        .iter()
        .map(|total| 1 + totals.iter().filter(|other| *other > total).count() as u32)
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
