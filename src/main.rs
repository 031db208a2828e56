use anyhow::{Context, Result};
use buildmend::artifacts::ArtifactStore;
use buildmend::config::Config;
use buildmend::repair::Orchestrator;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "buildmend",
    about = "Run a Gradle build and, on failure, ask a model for fixes and apply them safely",
    version
)]
struct Args {
    /// Path to the Gradle project (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Preview the change-set without touching the filesystem
    /// (same as BUILDMEND_APPLY=0)
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Model to use (overrides config and OPENAI_MODEL)
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let project_root = args
        .path
        .canonicalize()
        .with_context(|| format!("Failed to resolve project path '{}'", args.path.display()))?;

    let mut config = Config::load();
    if args.dry_run {
        config.apply_enabled = false;
    }
    if let Some(model) = args.model {
        config.model = model;
    }

    if !config.apply_enabled {
        eprintln!("  Dry run: changes will be recorded, not applied.");
    }

    let artifacts = ArtifactStore::new(&std::env::current_dir()?);
    let mut orchestrator = Orchestrator::new(config, artifacts);
    let report = orchestrator.run(&project_root).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
