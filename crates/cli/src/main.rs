mod options;

use anyhow::{Context, Result};
use options::{help_text, parse_command, Command, PlayOptions, SweepOptions};
use parley_core::{format_slot, Engine};
use parley_sweep::{
    load_sweep, run_sweep, write_json, CancellationToken, ReferenceHost, SweepError,
};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PARLEY_LOG";

fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 2 for anything the user can fix by changing flags, 1 for the rest.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<SweepError>() {
        Some(SweepError::Config(_)) => 2,
        _ => 1,
    }
}

fn run(args: &[String]) -> Result<()> {
    match parse_command(args)? {
        Command::Help => {
            println!("{}", help_text());
            Ok(())
        }
        Command::Sweep(options) => run_sweep_command(options),
        Command::Play(options) => run_play_command(options),
        Command::Report(path) => {
            let sweep =
                load_sweep(&path).with_context(|| format!("load sweep from {}", path.display()))?;
            println!("{}", sweep.to_text_report());
            Ok(())
        }
    }
}

fn run_sweep_command(options: SweepOptions) -> Result<()> {
    let cancel = CancellationToken::new();
    if let Some(secs) = options.budget_secs {
        let token = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs_f64(secs));
            if !token.is_cancelled() {
                warn!(budget_secs = secs, "time budget spent, finishing running trials");
                token.cancel();
            }
        });
    }
    let sweep = run_sweep(
        &ReferenceHost,
        &options.config,
        &options.grid,
        &options.rosters,
        &cancel,
    )?;
    write_json(&options.out, &sweep)
        .with_context(|| format!("write results to {}", options.out.display()))?;
    info!(path = %options.out.display(), "results saved");
    println!("{}", sweep.to_text_report());
    Ok(())
}

fn run_play_command(options: PlayOptions) -> Result<()> {
    options.config.validate()?;
    options.grid.validate()?;
    let policy = options
        .grid
        .combinations(&options.config.base_policy)
        .into_iter()
        .next()
        .unwrap_or(options.config.base_policy);
    let seats = options.roster.seats();
    let engine = Engine::new(options.config.game, &seats, &policy, options.seed)
        .map_err(SweepError::from)?;
    let record = engine.run(None).map_err(SweepError::from)?;

    println!("roster: {}  seed: {}", options.roster, options.seed);
    println!("policy: {}", policy.short_label());
    println!();
    for (turn, slot) in record.history.iter().enumerate() {
        println!("{turn:>3}  {}", format_slot(slot));
    }
    println!();
    let shared = record.shared;
    println!(
        "shared: total={:.3} importance={:.3} coherence={:.3} freshness={:.3} nonmonotony={:.3}{}",
        record.shared_total,
        shared.importance,
        shared.coherence,
        shared.freshness,
        shared.nonmonotony,
        if record.early_termination {
            "  (ended early)"
        } else {
            ""
        }
    );
    for participant in &record.participants {
        println!(
            "  {} {:<14} individual={:.3} total={:.3} contributions={}",
            participant.id,
            participant.label,
            participant.individual,
            participant.total,
            participant.contributions
        );
    }
    Ok(())
}
