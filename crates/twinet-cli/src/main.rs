use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use twinet_artifact::default_drivers;
use twinet_cli::network;
use twinet_kernel::{RunState, SchedulerError, TaskScheduler, TwinetConfig};

const DEFAULT_INPUT_DIR: &str = "data";

fn cli() -> Command {
    Command::new("twinet")
        .version(twinet_kernel::VERSION)
        .about("Artifact-backed network analytics pipelines")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run the network pipeline once per dataset")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .default_value("twinet.toml")
                        .value_parser(value_parser!(PathBuf))
                        .help("Configuration file"),
                )
                .arg(
                    Arg::new("dataset")
                        .long("dataset")
                        .short('d')
                        .action(ArgAction::Append)
                        .help("Dataset identifier; overrides the configured list"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print run reports as JSON"),
                ),
        )
        .subcommand(Command::new("formats").about("List registered format tags"))
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("run", args)) => {
            let config = args
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("twinet.toml"));
            let datasets: Vec<String> = args
                .get_many::<String>("dataset")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            run(&config, datasets, args.get_flag("json"))
        }
        Some(("formats", _)) => {
            for (tag, kind) in default_drivers().describe() {
                println!("{tag:<8} {kind}");
            }
            Ok(true)
        }
        _ => Ok(true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every dataset completed
fn run(config_path: &Path, datasets: Vec<String>, json: bool) -> anyhow::Result<bool> {
    let mut config = TwinetConfig::from_file(config_path)?;
    if !datasets.is_empty() {
        config = config.with_datasets(datasets);
    }
    config.validate()?;
    twinet_kernel::logging::init(&config.logging)?;

    let input_dir = input_dir(&config)?;
    let store = Arc::new(config.store.build_store());
    let scheduler = TaskScheduler::from_config(&config.scheduler);
    tracing::info!(
        root = %store.root().display(),
        input_dir = %input_dir.display(),
        datasets = config.datasets.len(),
        "starting"
    );

    let mut all_completed = true;
    for dataset in &config.datasets {
        let (pipeline, _) = network::build_pipeline(&store, dataset, &input_dir)
            .with_context(|| format!("declaring artifacts for dataset '{dataset}'"))?;

        let report = match pipeline.run(&scheduler) {
            Ok(report) => report,
            Err(e @ SchedulerError::PipelineAborted { .. }) => {
                eprintln!("{dataset}: {e}");
                all_completed = false;
                match scheduler.last_report() {
                    Some(report) => report,
                    None => continue,
                }
            }
            Err(e) => return Err(e.into()),
        };

        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!(
                "{dataset}: {} ({} tasks, {} attempts, {} ms)",
                report.state,
                report.tasks.len(),
                report.total_attempts(),
                report.elapsed_ms
            );
        }
        all_completed &= report.state == RunState::Completed;
    }

    let stats = store.cache_stats();
    tracing::info!(hits = stats.hits, misses = stats.misses, "cache usage");
    Ok(all_completed)
}

/// Configured input directory, relative paths taken from the working directory
fn input_dir(config: &TwinetConfig) -> anyhow::Result<PathBuf> {
    let dir = PathBuf::from(config.pipeline_str("input_dir").unwrap_or(DEFAULT_INPUT_DIR));
    if dir.is_absolute() {
        return Ok(dir);
    }
    let cwd = std::env::current_dir().context("resolving working directory")?;
    Ok(cwd.join(dir))
}
