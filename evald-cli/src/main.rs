use anyhow::{Context, Result};
use clap::Parser;
use evald_config::{ConfigLoader, EvaldConfig, LogLevel, WORKER_LOG_ENV};
use evald_logging::{init_logging_from_config, init_worker_tracing};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

mod cli;
mod exec;
mod formatter;
mod repl;
mod worker;

use cli::{Cli, Commands, ConfigCommands};

/// Load configuration from file or environment
fn load_config(config_path: Option<&PathBuf>) -> Result<EvaldConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match load_config(Some(config_file)) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle sample configuration generation
fn handle_config_generate(output: &PathBuf, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
    }

    fs::write(output, EvaldConfig::generate_sample())
        .context(format!("Failed to write configuration to {:?}", output))?;

    println!("✅ Configuration written to {:?}", output);
    Ok(())
}

/// Print the configuration in effect as YAML
fn handle_config_show(config_file: Option<&PathBuf>) -> Result<()> {
    let config = load_config(config_file)?;
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize to YAML")?;
    println!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Worker mode owns stdout and stderr as side streams, so it sets up its
    // own quiet logging before anything else runs
    if cli.worker {
        let worker_id = cli
            .worker_id
            .context("--worker requires --worker-id")?;
        init_worker_tracing(std::env::var(WORKER_LOG_ENV).ok().as_deref())?;
        return worker::run_worker_process(worker_id).await;
    }

    let mut config = load_config(cli.config.as_ref())?;

    if let Some(level) = cli.log_level.as_deref() {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    init_logging_from_config(&config.logging)?;

    match cli.command {
        Some(Commands::Exec {
            session,
            props,
            json,
            code,
        }) => exec::exec_command(&config, &session, &code, props, json).await,
        Some(Commands::Repl { session }) => {
            let mut console = repl::EvaldConsole::new(&config, session)?;
            console.run().await
        }
        None => {
            let mut console = repl::EvaldConsole::new(&config, "main")?;
            console.run().await
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Validate { config_file } => handle_config_validate(&config_file),
            ConfigCommands::Generate { output, force } => handle_config_generate(&output, force),
            ConfigCommands::Show => handle_config_show(cli.config.as_ref()),
        },
    }
}
