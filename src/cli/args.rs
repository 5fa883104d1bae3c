//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Resolve, bundle and cache web assets by logical path
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = "assetweave.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build assets and print their descriptors as JSON
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        args: BuildArgs,
    },

    /// Show which file a logical path resolves to
    #[command(visible_alias = "r")]
    Resolve {
        /// Logical path (`application.js`, `jquery`, `lib/index.css`)
        logical: String,

        /// Accept list, e.g. "text/css, */*;q=0.5"
        #[arg(short, long)]
        accept: Option<String>,
    },

    /// List every logical path under the roots
    #[command(visible_alias = "l")]
    List,
}

/// Build command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Logical paths to build. If omitted, builds every logical path.
    #[arg(value_name = "LOGICAL_PATH")]
    pub targets: Vec<String>,

    /// Threads for the batch (overrides `[build] jobs`)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Environment version (overrides `[build] version`)
    #[arg(long)]
    pub version_tag: Option<String>,

    /// Pretty-print JSON output
    #[arg(short, long)]
    pub pretty: bool,
}
