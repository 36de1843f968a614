mod config;
mod diagnostics;
mod emit;
mod planner;
mod predict;
mod priority;
mod scheduler;

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{parse_duration, Config};
use crate::emit::{write_report, OutputFormat};
use crate::planner::{PlanRequest, Planner};
use crate::predict::{Sgp4Propagator, TleLoader};
use crate::priority::{PriorityEntry, PriorityPolicy};

#[derive(Parser)]
#[command(name = "sat-o-plan")]
#[command(about = "Satellite pass planning for a single ground station")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict passes, score them and select a conflict-free schedule
    Plan {
        #[command(flatten)]
        window: WindowArgs,
        /// Priority file, overrides schedule.priorities_file
        #[arg(long)]
        priorities: Option<PathBuf>,
        /// Try to place conflicted passes into idle gaps
        #[arg(long)]
        fill_gaps: bool,
        /// Also list rejected candidates
        #[arg(long)]
        show_rejected: bool,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// List candidate passes without scheduling
    Predict {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Validate a priority file
    Priorities { file: PathBuf },
}

#[derive(Args)]
struct WindowArgs {
    /// Station configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
    /// Window start (RFC 3339), defaults to now
    #[arg(long)]
    start: Option<DateTime<Utc>>,
    /// Window length such as 12h, overrides schedule.duration
    #[arg(long, value_parser = parse_duration)]
    duration: Option<Duration>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            window,
            priorities,
            fill_gaps,
            show_rejected,
            format,
        } => plan(&window, priorities, fill_gaps, show_rejected, format),
        Commands::Predict { window } => predict(&window),
        Commands::Priorities { file } => validate_priorities(&file),
    }
}

fn fail(context: &str, e: impl Display) -> ExitCode {
    eprintln!("{}: {}", context, e);
    ExitCode::FAILURE
}

struct Inputs {
    config: Config,
    request: PlanRequest,
    loader: TleLoader,
}

fn load_inputs(args: &WindowArgs) -> Result<Inputs, ExitCode> {
    let config = Config::from_file(&args.config).map_err(|e| fail("Error reading config", e))?;

    let start = args.start.unwrap_or_else(Utc::now);
    let mut request = config
        .plan_request(start)
        .map_err(|e| fail("Invalid config", e))?;
    if let Some(duration) = args.duration {
        request.window.end = start + duration;
    }

    let mut loader = TleLoader::new(config.predict.tle_folder.clone(), config.predict.max_age);
    loader
        .refresh_if_stale(Utc::now())
        .map_err(|e| fail("Error loading TLEs", e))?;
    if let Some(path) = &config.predict.transmitters_file {
        loader
            .load_transmitters(path, config.predict.min_success_rate)
            .map_err(|e| fail("Error loading transmitters", e))?;
    }

    Ok(Inputs {
        config,
        request,
        loader,
    })
}

fn plan(
    args: &WindowArgs,
    priorities: Option<PathBuf>,
    fill_gaps: bool,
    show_rejected: bool,
    format: OutputFormat,
) -> ExitCode {
    let Inputs {
        config,
        mut request,
        loader,
    } = match load_inputs(args) {
        Ok(inputs) => inputs,
        Err(code) => return code,
    };
    request.select.fill_gaps |= fill_gaps;

    let (policy, warnings) = match priorities.or(config.schedule.priorities_file) {
        Some(path) => match PriorityPolicy::from_file(&path) {
            Ok(loaded) => loaded,
            Err(e) => return fail("Error reading priorities", e),
        },
        None => (PriorityPolicy::default(), Vec::new()),
    };
    if policy.is_empty() {
        log::info!("No priority entries, ranking passes by culmination elevation");
    }

    let report = match Planner::new(request, policy)
        .with_policy_warnings(warnings)
        .with_load_failures(loader.failures().to_vec())
        .run(Sgp4Propagator::default(), &loader.satellites())
    {
        Ok(report) => report,
        Err(e) => return fail("Planning failed", e),
    };

    let emitter = format.emitter(show_rejected);
    if let Err(e) = write_report(emitter.as_ref(), &report, &mut io::stdout().lock()) {
        return fail("Error writing schedule", e);
    }
    ExitCode::SUCCESS
}

fn predict(args: &WindowArgs) -> ExitCode {
    let Inputs {
        request, loader, ..
    } = match load_inputs(args) {
        Ok(inputs) => inputs,
        Err(code) => return code,
    };

    let planner = Planner::new(request, PriorityPolicy::default());
    let generated = match planner.candidates(Sgp4Propagator::default(), &loader.satellites()) {
        Ok(generated) => generated,
        Err(e) => return fail("Prediction failed", e),
    };

    let mut passes = generated.passes;
    passes.sort_by_key(|p| (p.start, p.norad_id));

    let mut stdout = io::stdout().lock();
    if let Err(e) = emit::write_passes(&mut stdout, &passes).and_then(|()| stdout.flush()) {
        return fail("Error writing passes", e);
    }
    for failure in loader.failures().iter().chain(&generated.failures) {
        eprintln!("warning: {}", failure);
    }
    ExitCode::SUCCESS
}

fn validate_priorities(path: &Path) -> ExitCode {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail("Error reading file", e),
    };

    let (policy, warnings) = PriorityPolicy::parse(&content);
    println!(
        "Priority file has {} entries, {} warnings",
        policy.len(),
        warnings.len()
    );
    for PriorityEntry {
        norad_id,
        weight,
        transmitter,
        rank,
    } in policy.entries()
    {
        println!("  {}: {:05} {} @ {}", rank + 1, norad_id, transmitter, weight);
    }
    if warnings.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
