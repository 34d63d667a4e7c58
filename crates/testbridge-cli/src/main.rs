#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use commands::resolve::ResolveAction;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "testbridge")]
#[command(author, version, about = "Resolve test-runner config against a dev host", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Run the host lifecycle in-process and print the resolved test config
    Resolve {
        /// Config file to load instead of auto-discovery
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Host mode (e.g. "test", "development")
        #[arg(long)]
        mode: Option<String>,

        /// Run once and exit (disables watch mode)
        #[arg(long, conflicts_with = "watch")]
        run: bool,

        /// Keep watching after the first run
        #[arg(long)]
        watch: bool,

        /// Enable the UI
        #[arg(long)]
        ui: bool,

        /// Open the UI in a browser
        #[arg(long)]
        open: bool,

        /// Base path the UI is served under
        #[arg(long, value_name = "PATH")]
        ui_base: Option<String>,

        /// Serve the API on this port
        #[arg(long, value_name = "PORT")]
        api: Option<u16>,

        /// Simulate this many host restarts after the first attach
        #[arg(long, default_value_t = 0)]
        restarts: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Version => commands::version::run(),
        Commands::Resolve {
            config,
            mode,
            run,
            watch,
            ui,
            open,
            ui_base,
            api,
            restarts,
        } => {
            logging::init(cli.verbose, cli.json);
            let action = ResolveAction {
                root: cwd,
                config,
                mode,
                run,
                watch,
                ui,
                open,
                ui_base,
                api,
                restarts,
                json: cli.json,
            };
            let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
            runtime.block_on(commands::resolve::run(action))
        }
    }
}
