use crate::{
    rank_summaries, run_trial, summarize, CancellationToken, GameHost, ParameterGrid,
    PlannedTrial, RosterSpec, SimulationResult, SweepConfig, SweepError, SweepFile,
    SweepMetadata, TrialFailure, SCHEMA_VERSION,
};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

enum TrialOutcome {
    Completed(SimulationResult),
    Failed(TrialFailure),
    Skipped,
}

/// Validate everything and lay out the trials: policy combinations outermost,
/// then rosters, then repetitions. Trial `k` gets seed `base_seed + k`.
pub fn plan_trials(
    config: &SweepConfig,
    grid: &ParameterGrid,
    rosters: &[RosterSpec],
) -> Result<Vec<PlannedTrial>, SweepError> {
    config.validate()?;
    grid.validate()?;
    if rosters.is_empty() {
        return Err(SweepError::Config("at least one roster is required".to_string()));
    }
    let policies = grid.combinations(&config.base_policy);
    let mut planned = Vec::with_capacity(policies.len() * rosters.len() * config.trials_per_combo);
    let mut index = 0u64;
    for (policy_idx, policy) in policies.iter().enumerate() {
        for (roster_idx, roster) in rosters.iter().enumerate() {
            let combo = policy_idx * rosters.len() + roster_idx;
            for _ in 0..config.trials_per_combo {
                planned.push(PlannedTrial {
                    index,
                    combo,
                    seed: config.base_seed.wrapping_add(index),
                    policy: *policy,
                    roster: roster.clone(),
                });
                index += 1;
            }
        }
    }
    Ok(planned)
}

/// Run a full sweep. Configuration problems fail before any trial starts;
/// failing trials are logged and left out of the statistics.
pub fn run_sweep<H: GameHost>(
    host: &H,
    config: &SweepConfig,
    grid: &ParameterGrid,
    rosters: &[RosterSpec],
    cancel: &CancellationToken,
) -> Result<SweepFile, SweepError> {
    let planned = plan_trials(config, grid, rosters)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|err| SweepError::Config(format!("thread pool: {err}")))?;
    info!(
        trials = planned.len(),
        combinations = grid.combination_count() * rosters.len(),
        threads = pool.current_num_threads(),
        "sweep starting"
    );

    let started = Instant::now();
    let outcomes: Vec<TrialOutcome> = pool.install(|| {
        planned
            .par_iter()
            .map(|trial| execute(host, trial, config, cancel))
            .collect()
    });
    let elapsed_secs = started.elapsed().as_secs_f64();

    let mut sweep = assemble(config, grid, rosters, &planned, outcomes);
    sweep.metadata.elapsed_secs = elapsed_secs;
    sweep.metadata.cancelled = cancel.is_cancelled();
    info!(
        completed = sweep.metadata.completed_trials,
        failed = sweep.metadata.failed_trials,
        skipped = sweep.metadata.skipped_trials,
        elapsed_secs,
        "sweep finished"
    );
    Ok(sweep)
}

/// Rerun the `index`-th trial of a sweep on the calling thread.
pub fn replay_trial<H: GameHost>(
    host: &H,
    config: &SweepConfig,
    grid: &ParameterGrid,
    rosters: &[RosterSpec],
    index: u64,
) -> Result<SimulationResult, SweepError> {
    let planned = plan_trials(config, grid, rosters)?;
    let trial = planned
        .iter()
        .find(|t| t.index == index)
        .ok_or_else(|| {
            SweepError::Config(format!(
                "trial {index} out of range (sweep has {})",
                planned.len()
            ))
        })?;
    run_trial(host, trial, config)
}

fn execute<H: GameHost>(
    host: &H,
    trial: &PlannedTrial,
    config: &SweepConfig,
    cancel: &CancellationToken,
) -> TrialOutcome {
    if cancel.is_cancelled() {
        return TrialOutcome::Skipped;
    }
    match run_trial(host, trial, config) {
        Ok(result) => {
            debug!(
                trial = trial.index,
                seed = trial.seed,
                total = result.total_score,
                "trial done"
            );
            TrialOutcome::Completed(result)
        }
        Err(err) => {
            warn!(
                trial = trial.index,
                seed = trial.seed,
                roster = %trial.roster,
                error = %err,
                "trial failed"
            );
            TrialOutcome::Failed(TrialFailure::new(trial, &err))
        }
    }
}

fn assemble(
    config: &SweepConfig,
    grid: &ParameterGrid,
    rosters: &[RosterSpec],
    planned: &[PlannedTrial],
    outcomes: Vec<TrialOutcome>,
) -> SweepFile {
    let mut results = Vec::new();
    let mut failures = Vec::new();
    let mut skipped = 0;
    for outcome in outcomes {
        match outcome {
            TrialOutcome::Completed(result) => results.push(result),
            TrialOutcome::Failed(failure) => failures.push(failure),
            TrialOutcome::Skipped => skipped += 1,
        }
    }
    results.sort_by_key(|r: &SimulationResult| r.trial);
    failures.sort_by_key(|f: &TrialFailure| f.trial);

    let combos = planned.iter().map(|t| t.combo).max().map_or(0, |m| m + 1);
    let mut summaries = (0..combos)
        .filter_map(|combo| {
            let first = planned.iter().find(|t| t.combo == combo)?;
            let members = results
                .iter()
                .filter(|r| r.combo == combo)
                .cloned()
                .collect::<Vec<_>>();
            let failed = failures.iter().filter(|f| f.combo == combo).count();
            Some(summarize(
                combo,
                first.policy,
                &first.roster.label(),
                &members,
                failed,
            ))
        })
        .collect::<Vec<_>>();
    rank_summaries(&mut summaries);

    SweepFile {
        schema_version: SCHEMA_VERSION,
        metadata: SweepMetadata {
            base_seed: config.base_seed,
            trials_per_combo: config.trials_per_combo,
            game: config.game,
            rosters: rosters.iter().map(RosterSpec::label).collect(),
            combinations: grid.combination_count() * rosters.len(),
            planned_trials: planned.len(),
            completed_trials: results.len(),
            failed_trials: failures.len(),
            skipped_trials: skipped,
            cancelled: false,
            elapsed_secs: 0.0,
        },
        results,
        failures,
        summaries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosters() -> Vec<RosterSpec> {
        vec![
            RosterSpec::parse("adaptive:1,random:2").expect("roster"),
            RosterSpec::parse("adaptive:2,greedy:1").expect("roster"),
        ]
    }

    #[test]
    fn plan_assigns_consecutive_indices_and_seeds() {
        let config = SweepConfig {
            base_seed: 100,
            trials_per_combo: 3,
            ..SweepConfig::default()
        };
        let grid = ParameterGrid {
            altruism: vec![0.0, 1.0],
            ..ParameterGrid::default()
        };
        let planned = plan_trials(&config, &grid, &rosters()).expect("plan");
        assert_eq!(planned.len(), 12);
        for (k, trial) in planned.iter().enumerate() {
            assert_eq!(trial.index, k as u64);
            assert_eq!(trial.seed, 100 + k as u64);
            assert_eq!(trial.combo, k / 3);
        }
        assert_eq!(planned[6].policy.altruism_use_prob, 1.0);
        assert_eq!(planned[3].roster.label(), "adaptive:2,greedy:1");
    }

    #[test]
    fn missing_roster_is_config_error() {
        let err = plan_trials(&SweepConfig::default(), &ParameterGrid::default(), &[])
            .expect_err("no rosters");
        assert!(err.is_config());
    }
}
