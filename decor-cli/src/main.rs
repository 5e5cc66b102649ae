//! decor: source-control decorations from change-source manifests.
//!
//! # Usage
//!
//! ```text
//! decor source list
//! decor source add <id> [--label <label>]
//! decor source remove <id>
//! decor preview [--json]
//! decor daemon start|stop|status|decorations [--source <id>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, preview::PreviewArgs, source::SourceCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "decor",
    version,
    about = "Keep resource decorations in step with change sources",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage change-source manifests under ~/.decor/sources.
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },

    /// Reconcile every manifest once and print the resulting decorations.
    Preview(PreviewArgs),

    /// Run or query the background decoration daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Source { command } => commands::source::run(command),
        Commands::Preview(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
