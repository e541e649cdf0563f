use parley_core::PolicyConfig;
use parley_sweep::{
    load_sweep, parse_sweep, run_sweep, write_json, write_text, CancellationToken, ParameterGrid,
    ReferenceHost, RosterSpec, SweepConfig, SweepFile, SCHEMA_VERSION,
};

fn small_sweep() -> SweepFile {
    let config = SweepConfig {
        base_seed: 9,
        trials_per_combo: 4,
        threads: 2,
        ..SweepConfig::default()
    };
    let grid = ParameterGrid {
        epsilon_fresh: vec![0.0, 0.1],
        ..ParameterGrid::default()
    };
    let rosters = vec![RosterSpec::parse("adaptive:1,importance:1,random_pause:1").expect("roster")];
    run_sweep(&ReferenceHost, &config, &grid, &rosters, &CancellationToken::new()).expect("sweep")
}

#[test]
fn saved_sweep_loads_back_identically() {
    let sweep = small_sweep();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("sweep.json");
    write_json(&path, &sweep).expect("write");
    let loaded = load_sweep(&path).expect("load");
    assert_eq!(loaded.schema_version, SCHEMA_VERSION);
    assert_eq!(loaded.summaries, sweep.summaries);
    assert_eq!(loaded.results, sweep.results);
    assert_eq!(loaded.metadata, sweep.metadata);
}

#[test]
fn bare_result_list_loads_as_version_one() {
    let sweep = small_sweep();
    let bare = serde_json::to_string(&sweep.results).expect("json");
    let loaded = parse_sweep(&bare).expect("parse");
    assert_eq!(loaded.schema_version, 1);
    assert_eq!(loaded.results.len(), 8);
    assert_eq!(loaded.summaries.len(), sweep.summaries.len());
    for summary in &loaded.summaries {
        let original = sweep
            .summaries
            .iter()
            .find(|s| s.combo == summary.combo)
            .expect("same combination");
        assert_eq!(summary.total_score, original.total_score);
        assert_eq!(summary.tracked_total, original.tracked_total);
        assert_eq!(summary.policy, original.policy);
    }
}

#[test]
fn old_records_missing_fields_get_neutral_defaults() {
    let legacy = r#"[
        {"trial": 0, "seed": 5, "roster": "adaptive:1,pause:1", "total_score": 1.5,
         "policy": {"altruism_use_prob": 0.5}, "conversation_length": 10},
        {"trial": 1, "seed": 6, "roster": "adaptive:1,pause:1", "total_score": 2.5,
         "policy": {"altruism_use_prob": 0.5}, "conversation_length": 8,
         "early_termination": true}
    ]"#;
    let loaded = parse_sweep(legacy).expect("legacy");
    let first = &loaded.results[0];
    assert_eq!(first.pause_count, 0);
    assert!(first.player_scores.is_empty());
    assert_eq!(first.tracked_total, None);
    assert_eq!(first.policy.tau_margin, PolicyConfig::default().tau_margin);
    assert_eq!(first.policy.altruism_use_prob, 0.5);

    let summary = &loaded.summaries[0];
    assert_eq!(summary.trials, 2);
    assert_eq!(summary.total_score.map(|s| s.mean), Some(2.0));
    assert_eq!(summary.mean_length, Some(9.0));
    assert_eq!(summary.early_termination_rate, Some(0.5));
    assert_eq!(summary.tracked_total, None);
}

#[test]
fn legacy_records_with_different_policies_stay_apart() {
    let legacy = r#"[
        {"trial": 0, "roster": "adaptive:1,pause:1", "total_score": 4.0,
         "policy": {"altruism_use_prob": 0.0}},
        {"trial": 1, "roster": "adaptive:1,pause:1", "total_score": 6.0,
         "policy": {"altruism_use_prob": 1.0}},
        {"trial": 2, "roster": "adaptive:1,pause:1", "total_score": 2.0,
         "policy": {"altruism_use_prob": 0.0}}
    ]"#;
    let loaded = parse_sweep(legacy).expect("legacy");
    assert_eq!(loaded.summaries.len(), 2);
    assert_eq!(loaded.metadata.combinations, 2);

    let best = &loaded.summaries[0];
    assert_eq!(best.policy.altruism_use_prob, 1.0);
    assert_eq!(best.trials, 1);
    assert_eq!(best.mean_total(), Some(6.0));

    let rest = &loaded.summaries[1];
    assert_eq!(rest.policy.altruism_use_prob, 0.0);
    assert_eq!(rest.trials, 2);
    assert_eq!(rest.mean_total(), Some(3.0));
}

#[test]
fn empty_bare_list_loads_as_version_one() {
    let loaded = parse_sweep("[]").expect("empty");
    assert_eq!(loaded.schema_version, 1);
    assert!(loaded.results.is_empty());
    assert!(loaded.summaries.is_empty());
}

#[test]
fn wrapped_file_without_summaries_is_rebuilt() {
    let text = r#"{"schema_version": 2, "metadata": {"base_seed": 3},
        "results": [{"trial": 0, "combo": 1, "roster": "greedy:2", "total_score": 4.0}]}"#;
    let loaded = parse_sweep(text).expect("wrapped");
    assert_eq!(loaded.schema_version, 2);
    assert_eq!(loaded.metadata.base_seed, 3);
    assert_eq!(loaded.summaries.len(), 1);
    assert_eq!(loaded.summaries[0].combo, 1);
    assert_eq!(loaded.summaries[0].mean_total(), Some(4.0));
}

#[test]
fn unparseable_file_is_an_error() {
    assert!(parse_sweep("{not json").is_err());
    assert!(parse_sweep("42").is_err());
}

#[test]
fn text_report_lists_every_combination() {
    let sweep = small_sweep();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sweep.txt");
    write_text(&path, &sweep).expect("write");
    let report = std::fs::read_to_string(&path).expect("read");
    assert!(report.contains("ranking:"));
    assert!(report.contains("#1"));
    assert!(report.contains("#2"));
    assert!(report.contains("adaptive:1,importance:1,random_pause:1"));
    assert!(report.contains("fresh=0.10"));
    assert!(report.contains("best player:"));
    assert!(report.contains("importance"));
    assert!(report.contains("random_pause"));
}
