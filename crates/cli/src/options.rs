use parley_core::GameSetup;
use parley_sweep::{ParameterGrid, RosterSpec, SweepConfig, SweepError};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_OUT: &str = "sweep_results.json";
pub const DEFAULT_ROSTER: &str = "adaptive:1,random:1,greedy:1";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Sweep(SweepOptions),
    Play(PlayOptions),
    Report(PathBuf),
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepOptions {
    pub config: SweepConfig,
    pub grid: ParameterGrid,
    pub rosters: Vec<RosterSpec>,
    pub out: PathBuf,
    pub budget_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayOptions {
    pub config: SweepConfig,
    pub grid: ParameterGrid,
    pub roster: RosterSpec,
    pub seed: u64,
}

pub fn parse_command(args: &[String]) -> Result<Command, SweepError> {
    let Some(first) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];
    match first.as_str() {
        "sweep" => parse_sweep(rest).map(Command::Sweep),
        "play" => parse_play(rest).map(Command::Play),
        "report" => match rest {
            [path] => Ok(Command::Report(PathBuf::from(path))),
            _ => Err(usage("report takes exactly one path")),
        },
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(usage(&format!("unknown command: {other}"))),
    }
}

/// Flags shared by `sweep` and `play`.
#[derive(Debug, Default)]
struct Common {
    config: SweepConfig,
    grid: ParameterGrid,
    rosters: Vec<RosterSpec>,
    out: Option<PathBuf>,
    budget_secs: Option<f64>,
}

fn parse_common(args: &[String]) -> Result<Common, SweepError> {
    let mut common = Common::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        let value = || {
            args.get(idx + 1)
                .map(String::as_str)
                .ok_or_else(|| usage(&format!("{flag} needs a value")))
        };
        match flag {
            "--altruism" => common.grid.altruism.extend(parse_list::<f64>(flag, value()?)?),
            "--tau" => common.grid.tau.extend(parse_list::<f64>(flag, value()?)?),
            "--eps-fresh" => common
                .grid
                .epsilon_fresh
                .extend(parse_list::<f64>(flag, value()?)?),
            "--eps-mono" => common
                .grid
                .epsilon_mono
                .extend(parse_list::<f64>(flag, value()?)?),
            "--min-samples" => common
                .grid
                .min_samples
                .extend(parse_list::<u32>(flag, value()?)?),
            "--alpha" => common
                .grid
                .ewma_alpha
                .extend(parse_list::<f64>(flag, value()?)?),
            "--w-importance" => common
                .grid
                .weight_importance
                .extend(parse_list::<f64>(flag, value()?)?),
            "--w-coherence" => common
                .grid
                .weight_coherence
                .extend(parse_list::<f64>(flag, value()?)?),
            "--w-freshness" => common
                .grid
                .weight_freshness
                .extend(parse_list::<f64>(flag, value()?)?),
            "--w-nonmonotony" => common
                .grid
                .weight_nonmonotony
                .extend(parse_list::<f64>(flag, value()?)?),
            "--roster" => common.rosters.push(RosterSpec::parse(value()?)?),
            "--trials" => common.config.trials_per_combo = parse_one(flag, value()?)?,
            "--seed" => common.config.base_seed = parse_one(flag, value()?)?,
            "--length" => common.config.game.conversation_length = parse_one(flag, value()?)?,
            "--subjects" => common.config.game.subjects = parse_one(flag, value()?)?,
            "--memory" => common.config.game.memory_size = parse_one(flag, value()?)?,
            "--max-pauses" => {
                common.config.game.max_consecutive_pauses = parse_one(flag, value()?)?
            }
            "--threads" => common.config.threads = parse_one(flag, value()?)?,
            "--trial-timeout-ms" => {
                common.config.trial_timeout_ms = Some(parse_one(flag, value()?)?)
            }
            "--budget-secs" => {
                let secs: f64 = parse_one(flag, value()?)?;
                if !(secs > 0.0) {
                    return Err(usage("--budget-secs must be positive"));
                }
                common.budget_secs = Some(secs);
            }
            "--out" => common.out = Some(PathBuf::from(value()?)),
            other => return Err(usage(&format!("unknown flag: {other}"))),
        }
        idx += 2;
    }
    Ok(common)
}

fn parse_sweep(args: &[String]) -> Result<SweepOptions, SweepError> {
    let mut common = parse_common(args)?;
    if common.rosters.is_empty() {
        common.rosters.push(RosterSpec::parse(DEFAULT_ROSTER)?);
    }
    Ok(SweepOptions {
        config: common.config,
        grid: common.grid,
        rosters: common.rosters,
        out: common.out.unwrap_or_else(|| PathBuf::from(DEFAULT_OUT)),
        budget_secs: common.budget_secs,
    })
}

fn parse_play(args: &[String]) -> Result<PlayOptions, SweepError> {
    let mut common = parse_common(args)?;
    if common.rosters.len() > 1 {
        return Err(usage("play takes a single --roster"));
    }
    let roster = match common.rosters.pop() {
        Some(roster) => roster,
        None => RosterSpec::parse(DEFAULT_ROSTER)?,
    };
    Ok(PlayOptions {
        seed: common.config.base_seed,
        config: common.config,
        grid: common.grid,
        roster,
    })
}

fn parse_list<T: FromStr>(flag: &str, text: &str) -> Result<Vec<T>, SweepError> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_one(flag, part))
        .collect()
}

fn parse_one<T: FromStr>(flag: &str, text: &str) -> Result<T, SweepError> {
    text.trim()
        .parse::<T>()
        .map_err(|_| usage(&format!("invalid value for {flag}: {text}")))
}

fn usage(message: &str) -> SweepError {
    SweepError::Config(message.to_string())
}

pub fn help_text() -> String {
    let defaults = GameSetup::default();
    [
        "usage: parley <command> [flags]".to_string(),
        String::new(),
        "commands:".to_string(),
        "  sweep    run a parameter sweep and save the results".to_string(),
        "  play     play one conversation and print it".to_string(),
        "  report   print the ranked summaries of a saved sweep".to_string(),
        String::new(),
        "flags (lists are comma separated, repeat to append):".to_string(),
        "  --altruism --tau --eps-fresh --eps-mono --min-samples --alpha <list>".to_string(),
        "  --w-importance --w-coherence --w-freshness --w-nonmonotony <list>".to_string(),
        format!("  --roster <kind:count,...>       default {DEFAULT_ROSTER}"),
        "  --trials <n> --seed <n> --threads <n>".to_string(),
        format!(
            "  --length <n> --subjects <n> --memory <n> --max-pauses <n>   defaults {} {} {} {}",
            defaults.conversation_length,
            defaults.subjects,
            defaults.memory_size,
            defaults.max_consecutive_pauses
        ),
        "  --trial-timeout-ms <ms> --budget-secs <secs>".to_string(),
        format!("  --out <path>                    default {DEFAULT_OUT}"),
        String::new(),
        "archetypes: adaptive (p10) greedy (p0) importance (p5) random (pr) pause (pp) random_pause (prp)"
            .to_string(),
        "logging: PARLEY_LOG=debug|info|warn".to_string(),
    ]
    .join("\n")
}
