//! shipgate - lint-gated deployment trigger
//!
//! ## Commands
//!
//! - `run`: quality gate, then the authenticated deployment notification
//! - `check`: quality gate only, printing the report
//!
//! Exit codes for `run`: 0 = deployed, 1 = aborted (gate failed, branch
//! filtered, or cancelled), 2 = deployment failed, 3 = configuration or
//! auth error.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;
use tracing::{error, info, Level};

use shipgate_core::{
    telemetry, CancellationToken, Coordinator, FinalStatus, GateConfig, HttpTransport,
    PipelineConfig, ProcessAnalyzer, QualityGate, TracingAuditSink, TriggerEvent,
};

const EXIT_DEPLOYED: i32 = 0;
const EXIT_ABORTED: i32 = 1;
const EXIT_DEPLOY_FAILED: i32 = 2;
const EXIT_CONFIG: i32 = 3;

#[derive(Parser)]
#[command(name = "shipgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lint-gated deployment trigger", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a trigger event
    Run {
        /// Push-event payload file (JSON); takes precedence over --ref/--actor
        #[arg(long)]
        event: Option<PathBuf>,

        /// Source ref for hand-triggered runs
        #[arg(long = "ref", default_value = "refs/heads/main")]
        source_ref: String,

        /// Actor for hand-triggered runs
        #[arg(long, default_value = "manual")]
        actor: String,

        /// Deployment endpoint (overrides SHIPGATE_ENDPOINT)
        #[arg(long)]
        endpoint: Option<Url>,

        /// Minimum score (overrides SHIPGATE_THRESHOLD)
        #[arg(long)]
        threshold: Option<f64>,

        /// Branch filter (overrides SHIPGATE_BRANCH)
        #[arg(long)]
        branch: Option<String>,

        /// Retry budget (overrides SHIPGATE_MAX_ATTEMPTS)
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Run the quality gate only and print the report
    Check {
        /// Paths to analyze
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Minimum score (overrides SHIPGATE_THRESHOLD)
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json, level);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "shipgate failed");
            EXIT_CONFIG
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            event,
            source_ref,
            actor,
            endpoint,
            threshold,
            branch,
            max_attempts,
        } => {
            cmd_run(
                event,
                source_ref,
                actor,
                endpoint,
                threshold,
                branch,
                max_attempts,
            )
            .await
        }
        Commands::Check { paths, threshold } => cmd_check(paths, threshold).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    event_file: Option<PathBuf>,
    source_ref: String,
    actor: String,
    endpoint: Option<Url>,
    threshold: Option<f64>,
    branch: Option<String>,
    max_attempts: Option<u32>,
) -> Result<i32> {
    let mut config = PipelineConfig::from_env_or(endpoint)?;
    if let Some(threshold) = threshold {
        config.gate.threshold = threshold;
    }
    if let Some(branch) = branch {
        config.branch = branch;
    }
    if let Some(max_attempts) = max_attempts {
        config.notify.max_attempts = max_attempts;
    }

    let event = match event_file {
        Some(path) => {
            let payload = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read event payload {}", path.display()))?;
            TriggerEvent::from_push(&payload).context("failed to parse event payload")?
        }
        None => TriggerEvent::new(source_ref, actor),
    };

    let analyzer = Arc::new(ProcessAnalyzer::new(
        config.gate.analyzer_command.clone(),
        config.gate.analyzer_timeout,
    ));
    let transport = Arc::new(HttpTransport::new(config.notify.attempt_timeout));
    let audit = Arc::new(TracingAuditSink::new());
    let pipeline = Coordinator::new(config, analyzer, transport, audit);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling pipeline");
                cancel.cancel();
            }
        });
    }

    let result = pipeline.run(&event, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(exit_code_for(result.outcome.final_status))
}

async fn cmd_check(paths: Vec<PathBuf>, threshold: Option<f64>) -> Result<i32> {
    let mut config = GateConfig::from_env()?;
    config.code_set = paths;
    if let Some(threshold) = threshold {
        config.threshold = threshold;
    }

    let analyzer = ProcessAnalyzer::new(config.analyzer_command.clone(), config.analyzer_timeout);
    let report = QualityGate::evaluate(&analyzer, &config.code_set, config.threshold).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.passed {
        EXIT_DEPLOYED
    } else {
        EXIT_ABORTED
    })
}

fn exit_code_for(status: FinalStatus) -> i32 {
    match status {
        FinalStatus::Success => EXIT_DEPLOYED,
        FinalStatus::Aborted => EXIT_ABORTED,
        FinalStatus::Failed => EXIT_DEPLOY_FAILED,
    }
}
