//! Trustwatch Core - Evaluation and Trust-Scoring CLI
//!
//! The entry point for tw-core, handling:
//! - Single-shot evaluations of one model along one quality axis
//! - Trust score aggregation across the four axes
//! - The continuous monitor loop (scheduler + worker pool + alerting)
//!
//! Command payloads go to stdout as JSON; all logging goes to stderr.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tw_common::{EvaluationType, ModelKey};
use tw_config::MonitorConfig;
use tw_core::alerts::LogNotifier;
use tw_core::audit::{AuditSink, JsonlAuditSink, NullAuditSink};
use tw_core::logging::{init_logging, LogConfig, LogFormat};
use tw_core::monitor::Monitor;
use tw_core::registry::StaticRegistry;
use tw_core::scheduler::EvalJob;
use tw_core::schema::TimeWindow;
use tw_core::store::{load_predictions, MonitorStore};
use tw_core::trust;

/// Trustwatch Core - Model evaluation and trust scoring
#[derive(Parser)]
#[command(name = "tw-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Monitor configuration file (TOML); defaults apply when omitted
    #[arg(long, global = true, env = "TW_CONFIG")]
    config: Option<PathBuf>,

    /// Prediction export to evaluate (JSONL, one record per line)
    #[arg(long, global = true, env = "TW_PREDICTIONS")]
    predictions: Option<PathBuf>,

    /// Model registry file (JSON array of model entries)
    #[arg(long, global = true, env = "TW_REGISTRY")]
    registry: Option<PathBuf>,

    /// Emit logs as JSON lines instead of console format
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation for a model and print the record
    Evaluate(EvaluateArgs),

    /// Run all four evaluations for a model and print its trust score
    Aggregate(ModelArgs),

    /// Run the continuous monitor loop over all registered models
    Run(RunArgs),

    /// Print the cadence plan for every registered model
    Schedule,

    /// Validate the configuration file and exit
    Check,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Evaluation type: fairness, drift, robustness, or explainability
    #[arg(long, value_name = "TYPE")]
    evaluation_type: EvaluationType,
}

#[derive(Args, Debug)]
struct ModelArgs {
    #[arg(long)]
    project: String,

    #[arg(long)]
    model: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Seconds between scheduler polls
    #[arg(long, default_value_t = 60)]
    interval_secs: u64,

    /// Stop after this many cycles (runs forever when omitted)
    #[arg(long)]
    cycles: Option<u64>,

    /// Append audit entries to this JSONL file
    #[arg(long)]
    audit: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.global.log_json {
        Some(LogFormat::Json)
    } else {
        None
    };
    init_logging(&LogConfig::from_env(format));

    match execute(cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.global.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    match cli.command {
        Commands::Check => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "schema_version": config.schema_version,
                    "valid": true,
                }))?
            );
            Ok(())
        }
        Commands::Evaluate(args) => {
            let monitor = build_monitor(&cli.global, config, None)?;
            let key = ModelKey::new(args.model.project, args.model.model)
                .eval_key(args.evaluation_type);
            let now = Utc::now();
            monitor.store().upsert_schedule(
                tw_core::schema::EvaluationSchedule::new(
                    key.clone(),
                    monitor_cadence_secs(&monitor, args.evaluation_type),
                    now,
                ),
            );
            let record = monitor.execute_job(EvalJob {
                key,
                window: TimeWindow::ending_at(
                    now,
                    monitor_window_secs(&monitor),
                ),
                requested_at: now,
            })?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Aggregate(args) => {
            let monitor = build_monitor(&cli.global, config, None)?;
            let model = ModelKey::new(args.project, args.model);
            let now = Utc::now();
            let window = TimeWindow::ending_at(now, monitor_window_secs(&monitor));
            for ty in EvaluationType::ALL {
                let key = model.eval_key(ty);
                monitor.store().upsert_schedule(
                    tw_core::schema::EvaluationSchedule::new(
                        key.clone(),
                        monitor_cadence_secs(&monitor, ty),
                        now,
                    ),
                );
                // A failed axis is recorded and excluded from the aggregate.
                let _ = monitor.execute_job(EvalJob {
                    key,
                    window,
                    requested_at: now,
                });
            }
            let score = trust::aggregate(monitor.store(), monitor.trust_config(), &model, now)?;
            println!("{}", serde_json::to_string_pretty(&score)?);
            Ok(())
        }
        Commands::Schedule => {
            let monitor = build_monitor(&cli.global, config, None)?;
            let schedules = monitor.schedules(Utc::now());
            println!("{}", serde_json::to_string_pretty(&schedules)?);
            Ok(())
        }
        Commands::Run(args) => {
            let audit: Arc<dyn AuditSink> = match &args.audit {
                Some(path) => Arc::new(JsonlAuditSink::open(path)?),
                None => Arc::new(NullAuditSink),
            };
            let monitor = build_monitor(&cli.global, config, Some(audit))?;
            monitor.run(
                std::time::Duration::from_secs(args.interval_secs),
                args.cycles,
            );
            Ok(())
        }
    }
}

fn build_monitor(
    global: &GlobalOpts,
    config: MonitorConfig,
    audit: Option<Arc<dyn AuditSink>>,
) -> Result<Arc<Monitor>, Box<dyn std::error::Error>> {
    let predictions_path = global
        .predictions
        .as_ref()
        .ok_or("missing --predictions (or TW_PREDICTIONS)")?;
    let registry_path = global
        .registry
        .as_ref()
        .ok_or("missing --registry (or TW_REGISTRY)")?;

    let predictions = Arc::new(load_predictions(predictions_path)?);
    let registry = StaticRegistry::load(registry_path)?;
    let models = registry.model_keys();

    Ok(Arc::new(Monitor::new(
        Arc::new(MonitorStore::new()),
        predictions,
        Arc::new(registry),
        config,
        models,
        Arc::new(LogNotifier),
        audit.unwrap_or_else(|| Arc::new(NullAuditSink)),
    )))
}

fn monitor_window_secs(monitor: &Monitor) -> u64 {
    monitor.evaluation_config().window_secs
}

fn monitor_cadence_secs(monitor: &Monitor, ty: EvaluationType) -> u64 {
    monitor.schedule_config().cadence(ty).as_secs()
}
