//! gfxs - command-line client for a GFXS render server.

mod cli;
mod commands;
mod config;
mod logging;
mod watch;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Args, Command, FiltersCommand};
use crate::config::{GfxsConfig, SERVER_ENV};
use crate::logging::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = GfxsConfig::load(args.config.as_deref())?
        .with_overrides(std::env::var(SERVER_ENV).ok(), &args);
    tracing::debug!("using server {}", config.server);

    match args.command {
        Command::Watch { script, out } => watch::run(&config, script, out).await,
        Command::Render { script, out } => {
            let backend = config.backend()?;
            commands::render(&*backend, &script, &out).await
        }
        Command::Batch {
            script,
            images,
            out,
        } => {
            let backend = config.backend()?;
            let archive_name = &config.session.archive_name;
            commands::batch(&*backend, &script, &images, &out, archive_name).await
        }
        Command::Upload { image, script, out } => {
            let backend = config.backend()?;
            commands::upload(&*backend, &image, &script, &out).await
        }
        Command::Filters { command } => {
            let store = config.filter_store(config.backend()?);
            match command {
                FiltersCommand::List => commands::filters_list(&*store).await,
                FiltersCommand::Show { name } => commands::filters_show(&*store, &name).await,
                FiltersCommand::Save { name, script } => {
                    commands::filters_save(&*store, &name, &script).await
                }
            }
        }
        Command::Sample { image, display, at } => {
            println!("{}", commands::sample(&image, display, at)?);
            Ok(())
        }
    }
}
