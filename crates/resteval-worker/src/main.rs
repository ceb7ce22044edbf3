//! resteval worker CLI
//!
//! The `resteval` command submits, executes, cancels and inspects evaluation
//! runs stored as JSON records under a store directory.
//!
//! ## Commands
//!
//! - `submit`: Create a queued run (optionally execute it right away)
//! - `execute`: Drive a queued run to a terminal status
//! - `cancel`: Request cancellation of a run
//! - `show` / `list`: Inspect stored runs
//! - `algorithms`: Print the dispatch table

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::{info, Level};

use resteval_core::{
    algorithms_for, baseline, ensure_real_pairs, request_cancel, AlgorithmSpec, Engine,
    EngineConfig, ExecutionOutcome, ParamKind, ALGORITHMS,
};
use resteval_state::{FsRunStore, RunId, RunParams, RunRecord, RunStore, TaskType};

#[derive(Parser)]
#[command(name = "resteval")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Image-restoration run execution & evaluation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding run records
    #[arg(long, global = true, env = "RESTEVAL_STORE_ROOT", default_value = ".resteval")]
    store_root: PathBuf,

    /// Dataset root (default: RESTEVAL_DATA_ROOT or ./data)
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Minimum execution time in seconds (default: RESTEVAL_MIN_SECONDS or 1.6)
    #[arg(long, global = true)]
    min_seconds: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a queued run
    Submit(SubmitArgs),

    /// Execute a run to a terminal status
    Execute {
        /// Run ID to execute
        run_id: String,
    },

    /// Request cancellation of a run
    Cancel {
        /// Run ID to cancel
        run_id: String,
    },

    /// Print one run record
    Show {
        /// Run ID to show
        run_id: String,
    },

    /// List runs, newest first
    List {
        /// Only runs with this status (queued, running, done, ...)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Print registered algorithms with their parameters and presets
    Algorithms {
        /// Restrict to one task
        task: Option<TaskType>,
    },
}

#[derive(Args, Debug, Clone)]
struct SubmitArgs {
    /// Task type (denoise, deblur, dehaze, sr, lowlight, video_denoise, video_sr)
    task: TaskType,

    /// Dataset directory name under the data root
    dataset: String,

    /// Algorithm id (default: the task's baseline)
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Algorithm parameter as key=value (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Named parameter preset (speed, quality)
    #[arg(long)]
    preset: Option<String>,

    /// Fail instead of falling back to synthetic data
    #[arg(long)]
    strict: bool,

    /// Use this run id instead of a generated one
    #[arg(long)]
    run_id: Option<String>,

    /// Execute the run immediately after submitting it
    #[arg(long)]
    execute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    resteval_core::init_tracing(cli.json, level);

    let store: Arc<dyn RunStore> = Arc::new(
        FsRunStore::new(&cli.store_root)
            .with_context(|| format!("Failed to open run store at {:?}", cli.store_root))?,
    );
    let config = engine_config(EngineConfig::from_env(), cli.data_root, cli.min_seconds)?;

    let output = match cli.command {
        Commands::Submit(args) => cmd_submit(&store, &config, args).await?,
        Commands::Execute { run_id } => {
            let outcome = cmd_execute(&store, &config, &run_id).await;
            print_json(&serde_json::to_value(&outcome)?)?;
            if !outcome.ok {
                bail!("run {} did not complete", outcome.run_id);
            }
            return Ok(());
        }
        Commands::Cancel { run_id } => cmd_cancel(&store, &run_id).await?,
        Commands::Show { run_id } => cmd_show(&store, &run_id).await?,
        Commands::List { status, limit } => cmd_list(&store, status.as_deref(), limit).await?,
        Commands::Algorithms { task } => cmd_algorithms(task),
    };
    print_json(&output)
}

fn engine_config(
    base: EngineConfig,
    data_root: Option<PathBuf>,
    min_seconds: Option<f64>,
) -> Result<EngineConfig> {
    let mut config = base;
    if let Some(root) = data_root {
        config = config.with_data_root(root);
    }
    if let Some(secs) = min_seconds {
        let floor = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("--min-seconds {secs} is not a valid duration"))?;
        config = config.with_min_duration(floor);
    }
    Ok(config)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `key=value`; the value is read as JSON when it parses, else as a string.
fn parse_param(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("parameter {raw:?} is not of the form key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("parameter {raw:?} has an empty key");
    }
    let value = value.trim();
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

async fn cmd_submit(store: &Arc<dyn RunStore>, config: &EngineConfig, args: SubmitArgs) -> Result<Value> {
    let algorithm_id = match args.algorithm {
        Some(id) => id,
        None => baseline(args.task)
            .map(|spec| spec.id.to_string())
            .unwrap_or_else(|| format!("alg_{}", args.task.as_str())),
    };

    let mut params = RunParams::new();
    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        params.insert(key, value);
    }
    if let Some(preset) = args.preset {
        params.insert("preset".into(), Value::String(preset));
    }

    if args.strict && args.task.is_image_task() {
        ensure_real_pairs(
            &config.data_root,
            &args.dataset,
            args.task.input_dir(),
            config.sample_limit,
        )
        .context("Strict run has no usable dataset pairs")?;
    }

    let run_id = args.run_id.map(RunId).unwrap_or_default();
    let mut run = RunRecord::queued_with_id(run_id, args.task, args.dataset, algorithm_id, params);
    if args.strict {
        run = run.strict();
    }
    store.save(&run).await.context("Failed to save run")?;
    info!(run_id = %run.run_id, task = %run.task_type, "run submitted");

    if args.execute {
        let outcome = cmd_execute(store, config, run.run_id.as_str()).await;
        return Ok(serde_json::to_value(&outcome)?);
    }
    Ok(serde_json::to_value(&run)?)
}

async fn cmd_execute(store: &Arc<dyn RunStore>, config: &EngineConfig, run_id: &str) -> ExecutionOutcome {
    let engine = Engine::new(store.clone(), config.clone());
    engine.execute(&RunId::from(run_id)).await
}

async fn cmd_cancel(store: &Arc<dyn RunStore>, run_id: &str) -> Result<Value> {
    let run = request_cancel(store.as_ref(), &RunId::from(run_id))
        .await
        .with_context(|| format!("Failed to cancel run {run_id}"))?;
    Ok(json!({
        "run_id": run.run_id,
        "status": run.status,
        "cancel_requested": run.cancel_requested,
    }))
}

async fn cmd_show(store: &Arc<dyn RunStore>, run_id: &str) -> Result<Value> {
    match store.load(&RunId::from(run_id)).await? {
        Some(run) => Ok(serde_json::to_value(&run)?),
        None => bail!("run {run_id} not found"),
    }
}

async fn cmd_list(store: &Arc<dyn RunStore>, status: Option<&str>, limit: usize) -> Result<Value> {
    let runs = store.list().await.context("Failed to list runs")?;
    let rows: Vec<Value> = runs
        .iter()
        .filter(|run| status.map_or(true, |s| run.status.as_str() == s))
        .take(limit)
        .map(|run| {
            json!({
                "run_id": run.run_id,
                "task_type": run.task_type,
                "dataset_id": run.dataset_id,
                "algorithm_id": run.algorithm_id,
                "status": run.status,
                "created_at": run.created_at,
                "metrics": run.metrics,
            })
        })
        .collect();
    Ok(Value::Array(rows))
}

fn cmd_algorithms(task: Option<TaskType>) -> Value {
    let specs: Vec<&AlgorithmSpec> = match task {
        Some(task) => algorithms_for(task).collect(),
        None => ALGORITHMS.iter().collect(),
    };
    Value::Array(specs.into_iter().map(algorithm_json).collect())
}

fn algorithm_json(spec: &AlgorithmSpec) -> Value {
    let params: Vec<Value> = spec
        .schema
        .iter()
        .map(|p| {
            let kind = match p.kind {
                ParamKind::Int { odd: true } => "odd_int",
                ParamKind::Int { odd: false } => "int",
                ParamKind::Float => "float",
                ParamKind::Bool => "bool",
            };
            json!({
                "name": p.name,
                "kind": kind,
                "default": p.default,
                "min": p.min,
                "max": p.max,
            })
        })
        .collect();
    let presets: Map<String, Value> = spec
        .presets
        .iter()
        .map(|preset| {
            let values: Map<String, Value> = preset
                .values
                .iter()
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();
            (preset.name.to_string(), Value::Object(values))
        })
        .collect();
    json!({
        "id": spec.id,
        "task": spec.task,
        "name": spec.display_name,
        "real_algo": spec.real_algo,
        "baseline": baseline(spec.task).map(|b| b.id) == Some(spec.id),
        "params": params,
        "presets": presets,
    })
}
