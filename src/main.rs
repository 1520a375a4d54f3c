use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

mod applier;
mod diff;
mod directive;
mod engine;
mod envelope;
mod error;
mod journal;
mod matcher;
mod workspace;

use engine::{EngineConfig, Operation, PatchEngine, PatchRequest, Plan, PlannedAction};
use error::OperationResult;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OperationArg {
    Create,
    Update,
    Delete,
}

impl OperationArg {
    fn name(self) -> &'static str {
        match self {
            OperationArg::Create => "create",
            OperationArg::Update => "update",
            OperationArg::Delete => "delete",
        }
    }
}

impl From<OperationArg> for Operation {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Create => Operation::Create,
            OperationArg::Update => Operation::Update,
            OperationArg::Delete => Operation::Delete,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "patchbay",
    version,
    about = "Apply structured patch envelopes to files inside a workspace"
)]
struct Cli {
    /// Operation to perform on the target file
    #[arg(value_enum)]
    operation: OperationArg,

    /// Target path, relative to the workspace root
    path: String,

    /// Patch body as a literal argument (literal '\n' sequences are expanded)
    #[arg(long, conflicts_with = "diff_file")]
    diff: Option<String>,

    /// Read the patch body from a file instead
    #[arg(long, value_name = "FILE")]
    diff_file: Option<PathBuf>,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Preview the resulting change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the workspace change journal
    #[arg(long)]
    no_journal: bool,
}

fn main() -> Result<()> {
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let root = fs::canonicalize(&cli.root)
        .with_context(|| format!("resolving root {}", cli.root.display()))?;
    let body = load_body(&cli)?;
    let request = PatchRequest {
        path: cli.path.clone(),
        operation: cli.operation.into(),
        body,
    };
    let engine = PatchEngine::new(EngineConfig::new(&root));

    if cli.dry_run {
        return match engine.plan(&request) {
            Ok(plan) => {
                preview(&plan);
                Ok(())
            }
            Err(err) => {
                println!("{}", OperationResult::from(Err(err)).to_json());
                std::process::exit(1)
            }
        };
    }

    let outcome = engine.apply(&request);
    if !cli.no_journal {
        let (status, detail) = match &outcome {
            OperationResult::Result(message) => ("applied", message.as_str()),
            OperationResult::Error(message) => ("error", message.as_str()),
        };
        if let Err(err) = journal::record(&root, cli.operation.name(), &cli.path, status, detail) {
            eprintln!("warning: could not record journal entry: {err:#}");
        }
    }

    println!("{}", outcome.to_json());
    if outcome.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn load_body(cli: &Cli) -> Result<String> {
    if let Some(path) = &cli.diff_file {
        return fs::read_to_string(path)
            .with_context(|| format!("reading diff file {}", path.display()));
    }
    // Shells tend to deliver '\n' literally; expand it so inline --diff
    // arguments stay usable.
    Ok(cli
        .diff
        .as_deref()
        .map(|raw| raw.replace("\\n", "\n"))
        .unwrap_or_default())
}

fn preview(plan: &Plan) {
    match &plan.action {
        PlannedAction::Create { content, .. } => {
            println!("--- dry-run: create {} ---", plan.label);
            print!("{}", diff::render("", content, 3));
        }
        PlannedAction::Update { before, after, .. } => {
            println!("--- dry-run: update {} ---", plan.label);
            let rendered = diff::render(before, after, 3);
            if rendered.is_empty() {
                println!("(no changes)");
            } else {
                print!("{rendered}");
            }
        }
        PlannedAction::Delete { existed, .. } => {
            if *existed {
                println!("--- dry-run: would delete {} ---", plan.label);
            } else {
                println!("--- dry-run: {} does not exist; delete is a no-op ---", plan.label);
            }
        }
    }
}
