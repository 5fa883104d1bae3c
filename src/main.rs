//! assetweave - resolve, bundle and cache web assets by logical path.

mod cli;

use anyhow::{Context, Result};
use assetweave::{AssetConfig, Environment, debug, logger};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let config = AssetConfig::discover(&cwd, &cli.config)?;
    let mut env = Environment::from_config(&config);
    debug!("main"; "{:?}", env);

    match &cli.command {
        Commands::Build { args } => cli::build::run(&mut env, args),
        Commands::Resolve { logical, accept } => {
            cli::query::resolve(&env, logical, accept.as_deref())
        }
        Commands::List => cli::query::list(&env),
    }
}
