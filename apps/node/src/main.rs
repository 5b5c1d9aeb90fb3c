//! `steep-node`: a single-process Steep node. Submits one workflow against
//! an in-memory registry and drives it — rule engine, scheduler,
//! controller, and (optionally) a local agent all running in this process
//! — to a terminal state, then prints the finished submission as JSON.

mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "steep-node", about = "Run a Steep workflow node")]
struct Cli {
    /// Path to a `steep.toml` configuration document (§6); defaults apply
    /// where omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a workflow document and drive it to completion.
    Run {
        /// JSON-serialized `Workflow` (§3).
        #[arg(long)]
        workflow: PathBuf,
        /// JSON array of `ServiceDescriptor`s the workflow's actions reference.
        #[arg(long)]
        catalog: PathBuf,
        /// JSON object of `{variableId: Value}` literal inputs (§4.1 Inputs).
        #[arg(long)]
        bindings: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = steep_config::load(cli.config.as_deref())?;
    let _guard = steep_log::LoggerBuilder::from_config(steep_log::Config::default()).build()?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        match cli.command {
            Command::Run { workflow, catalog, bindings } => {
                run::run(config, workflow, catalog, bindings).await
            }
        }
    })
}
