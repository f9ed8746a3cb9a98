//! # Tekton Run
//!
//! Command-line front end: submits one Tekton manifest, follows the run and
//! streams container logs to stdout. Diagnostics go to stderr.
//!
//! Exit codes: 0 succeeded, 1 failed, 130 aborted.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tekton_run::logging::{init_structured_logging, LogFormat};
use tekton_run::orchestration::{RunOrchestrator, RunOutcome, WriterSink};
use tekton_run::{HttpClusterClient, ManifestInput, TektonRunConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "tekton-run")]
#[command(about = "Submit a Tekton resource and stream its logs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(group(clap::ArgGroup::new("manifest").required(true).args(["file", "yaml"])))]
pub struct Cli {
    /// Path to a YAML manifest
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Inline YAML manifest
    #[arg(long)]
    yaml: Option<String>,

    /// Namespace to create the resource in (default: manifest, then configuration)
    #[arg(short, long)]
    namespace: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit diagnostics as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn manifest(&self) -> Option<ManifestInput> {
        match (&self.file, &self.yaml) {
            (Some(path), _) => Some(ManifestInput::File(path.clone())),
            (None, Some(text)) => Some(ManifestInput::Yaml(text.clone())),
            (None, None) => None,
        }
    }
}

fn exit_code(outcome: RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Succeeded => 0,
        RunOutcome::Failed => 1,
        RunOutcome::Aborted => 130,
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunOutcome> {
    let config = TektonRunConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let client = HttpClusterClient::new(&config.cluster).context("building cluster client")?;
    let shutdown = CancellationToken::new();
    let orchestrator =
        RunOrchestrator::new(Arc::new(client), config).with_cancellation(shutdown.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 TEKTON-RUN: Interrupt received, cancelling run");
            shutdown.cancel();
        }
    });

    let manifest = cli.manifest().context("either --file or --yaml is required")?;
    let report = orchestrator
        .submit_and_run(&manifest, cli.namespace.as_deref(), Arc::new(WriterSink::stdout()))
        .await
        .context("loading manifest")?;

    info!(
        run_id = %report.run_id,
        root = %report.root,
        outcome = %report.outcome,
        duration_ms = report.duration_ms(),
        "🏁 TEKTON-RUN: Finished"
    );
    Ok(report.outcome)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_structured_logging(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::from_env()
    });

    match run(cli).await {
        Ok(outcome) => process::exit(exit_code(outcome)),
        Err(err) => {
            error!(error = format!("{err:#}"), "❌ TEKTON-RUN: Could not start run");
            eprintln!("tekton-run: {err:#}");
            process::exit(1);
        }
    }
}
