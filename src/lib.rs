pub mod builder;
pub mod chunk;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod data;
pub mod dictionary;
pub mod inference;
pub mod io_utils;
pub mod loader;
pub mod preflight;
pub mod report;
pub mod sink;
pub mod source;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    config::PipelineConfig,
    dictionary::Dictionary,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("aneel_uc_loader", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Dictionary(args) => {
            let config = args.pipeline.resolve()?;
            config.validate()?;
            log_settings(&config);
            let options = builder::BuildOptions {
                diagnostics: args.diagnostics,
            };
            builder::run(&config, &options).map(|_| ())
        }
        Commands::Load(args) => {
            let config = args.pipeline.resolve()?;
            config.validate()?;
            log_settings(&config);
            loader::run(&config).map(|_| ())
        }
        Commands::Infer(args) => handle_infer(&args),
        Commands::Inspect(args) => handle_inspect(&args),
        Commands::Config(args) => handle_config(&args),
    }
}

fn log_settings(config: &PipelineConfig) {
    info!(
        "Datasets: {} | encoding '{}' | delimiter '{}' | decimal '{}'",
        itertools::join(config.datasets.iter().map(|d| d.tier), ", "),
        config.encoding,
        io_utils::printable_delimiter(config.delimiter as u8),
        config.decimal_separator
    );
}

fn handle_infer(args: &cli::InferArgs) -> Result<()> {
    let headers = vec!["campo".to_string(), "tipo_aneel".to_string()];
    let rows = args
        .fields
        .iter()
        .map(|field| vec![field.clone(), inference::infer(field).to_string()])
        .collect::<Vec<_>>();
    report::print_table(&headers, &rows);
    Ok(())
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let config = args.pipeline.resolve()?;
    config.validate()?;
    let settings = config.csv_settings()?;
    for dataset in &config.datasets {
        let path = config.dictionary_path(dataset.tier);
        let dictionary = Dictionary::load(&path, &settings)
            .with_context(|| format!("Inspecting dictionary for '{}'", dataset.tier))?;
        println!("{} ({} field(s)) {}", dataset.tier, dictionary.len(), path.display());
        report::print_dictionary(&dictionary);
        println!();
    }
    Ok(())
}

fn handle_config(args: &cli::ConfigArgs) -> Result<()> {
    let config = args.pipeline.resolve()?;
    let yaml = config.to_yaml_string()?;
    match &args.output {
        Some(path) => {
            fs::write(path, yaml).with_context(|| format!("Writing config to {path:?}"))?;
            info!("Configuration written to {path:?}");
        }
        None => print!("{yaml}"),
    }
    Ok(())
}
