mod commands;
mod logging;
mod progress;

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};
use vidsync_core::metadata::METADATA_COLUMNS;
use vidsync_core::{fixity, AppConfig, ClaimManager, Extractor, Pipeline};

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let _guard = logging::init_logger(if args.verbose { "debug" } else { "info" });

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let config = match vidsync_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let result = match command {
        Commands::Run { once, max_cycles } => {
            run_pipeline(&config, if once { Some(1) } else { max_cycles })
        }
        Commands::Peek => run_peek(&config),
        Commands::Probe { path, json } => run_probe(&config, &path, json),
        Commands::Checksum { path } => run_checksum(&config, &path),
        Commands::Release { path } => run_release(&config, &path),
        Commands::PrintConfig => print_config(&config),
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run_pipeline(config: &AppConfig, max_cycles: Option<usize>) -> Result<()> {
    let pipeline = Pipeline::new(config).context("setting up the pipeline")?;
    let reporter = CliReporter::new();

    info!(
        "Watching {} as a {} worker",
        config.source_root.display(),
        match max_cycles {
            Some(1) => "single-shot".to_string(),
            Some(n) => format!("{}-cycle", n),
            None => "long-running".to_string(),
        }
    );
    let summary = pipeline
        .run(&reporter, max_cycles)
        .context("walking the watch folder")?;

    info!(
        "{} processed, {} failed, {} idle over {} cycles",
        format!("{}", summary.processed).green(),
        format!("{}", summary.failed).red(),
        format!("{}", summary.idle).yellow(),
        summary.cycles,
    );
    Ok(())
}

fn run_peek(config: &AppConfig) -> Result<()> {
    let claims = ClaimManager::new(&config.claim);
    match claims.claim_next(&config.source_root, false)? {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", "Nothing to claim".yellow()),
    }
    Ok(())
}

fn run_probe(config: &AppConfig, path: &Path, json: bool) -> Result<()> {
    let extractor = Extractor::new(config)?;
    let record = extractor
        .extract(path)
        .with_context(|| format!("extracting metadata from {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let fields = serde_json::to_value(&record)?;
    for column in METADATA_COLUMNS {
        let value = match &fields[column] {
            serde_json::Value::Null => "-".dimmed().to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("{:>20}  {}", column.cyan(), value);
    }
    Ok(())
}

fn run_checksum(config: &AppConfig, path: &Path) -> Result<()> {
    let digest = fixity::write_md5_sidecar(path, &config.fixity.checksum_extension)
        .with_context(|| format!("hashing {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}

fn run_release(config: &AppConfig, path: &Path) -> Result<()> {
    let claims = ClaimManager::new(&config.claim);
    if claims.release(path)? {
        println!("{} {}", "Released".green(), path.display());
    } else {
        println!("{} {}", "No claim on".yellow(), path.display());
    }
    Ok(())
}

fn print_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    println!("{}", rendered);
    Ok(())
}
