//! Binary entry point for lostpets.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::Parser;
use lostpets::LostPetsConfig;
use lostpets::cli::{Cli, Commands, execute};
use lostpets::observability::{self, InitOptions};
use lostpets::services::{BackendFactory, RegistryService};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match LostPetsConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: false,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli, config: &LostPetsConfig) -> anyhow::Result<()> {
    let store = BackendFactory::open_store(&config.database).context("opening the registry")?;
    let service = if matches!(cli.command, Commands::Postings { .. } | Commands::Sightings { .. }) {
        let notifier = BackendFactory::notifier(&config.email).context("setting up email")?;
        RegistryService::from_config(store, notifier, config)
    } else {
        RegistryService::new(store).with_field_maps(
            config.fields.postings_map(),
            config.fields.sightings_map(),
        )
    };

    let mut stdout = std::io::stdout().lock();
    let result = execute(&service, &cli.command, cli.json, &mut stdout);
    drop(stdout);

    // Let searches queued by `add` finish before exiting.
    service.shutdown().await;
    Ok(result?)
}
