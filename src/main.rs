//! Command-line entry point for docsym.

mod commands;
mod diagnostics;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Parsed command line.
#[derive(Parser)]
#[command(name = "docsym", version, about = "Stable symbol pointers and navigation for markdown")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Config file to use instead of `.docsym.toml` in the project root.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Project root holding `.docsym.toml`; project-wide searches walk it.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the location a symbol navigates to: labels go to their definition
    Goto {
        /// Markdown file to read.
        file: PathBuf,
        /// Byte offset inside the symbol.
        offset: usize,
    },
    /// List the headers and link labels of a markdown file
    Symbols {
        /// Markdown file to read.
        file: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// List the usages of the symbol at an offset
    Usages {
        /// Markdown file to read.
        file: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Byte offset inside the symbol.
        offset: usize,
    },
    /// Follow the symbol at an offset while the file changes on disk
    Watch {
        /// Markdown file to watch.
        file: PathBuf,
        /// Byte offset inside the symbol.
        offset: usize,
    },
}

/// Install a stderr subscriber when `DOCSYM_LOG` or `RUST_LOG` is set.
/// `DOCSYM_LOG` wins when both are present.
fn init_tracing() {
    let filter = match std::env::var("DOCSYM_LOG") {
        Ok(directives) => EnvFilter::builder().parse_lossy(directives),
        Err(_) if std::env::var_os("RUST_LOG").is_some() => EnvFilter::from_default_env(),
        Err(_) => return,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Goto { file, offset } => commands::goto(&file, offset),
        Commands::Symbols { file, json } => commands::symbols(&file, json),
        Commands::Usages { file, json, offset } => commands::usages(&cli.root, cli.config.as_deref(), &file, offset, json),
        Commands::Watch { file, offset } => watch::run(&file, offset),
    };

    return match result {
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
        Ok(code) => code,
    };
}
