//! Command implementations

mod export;
mod init;
mod layers;
mod lookups;
mod refresh;
mod run;
mod status;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);

    match cli.command {
        Commands::Init(args) => init::execute(args, &output, cli.dry_run),
        Commands::Refresh(args) => refresh::execute(args, &output, cli.dry_run).await,
        Commands::Lookups(args) => lookups::execute(args, &output),
        Commands::Run(args) => run::execute(args, &output, cli.dry_run).await,
        Commands::Layers(args) => layers::execute(args, &output, cli.dry_run),
        Commands::Export(args) => export::execute(args, &output, cli.dry_run).await,
        Commands::Status => status::execute(&output).await,
    }
}
