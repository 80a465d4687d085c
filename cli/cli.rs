mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use std::env;
use std::process;

use cli_args::{Cli, Commands, ConfigOpts};
use repodigest_core::{AppError, Config};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::YamlParse(_)) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::DirCreation { .. }) => 2,
        Some(AppError::Walk(_)) => 2,
        Some(AppError::Glob(_)) => 2,
        Some(AppError::Acquisition(_)) => 3,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(AppError::DurationParse(_)) => 5,
        Some(AppError::JsonSerialize(_)) => 6,
        Some(AppError::Zip(_)) => 6,
        Some(AppError::Report(_)) => 6,
        Some(AppError::Cancelled) => 130,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Scan(args) => {
                log::debug!("Executing 'scan' command...");
                commands::scan::handle_scan_command(args, quiet)?;
            }
            Commands::Classify(args) => {
                log::debug!("Executing 'classify' command...");
                commands::classify::handle_classify_command(args)?;
            }
            Commands::Filetypes(args) => {
                log::debug!("Executing 'filetypes' command...");
                commands::filetypes::handle_filetypes_command(args, quiet)?;
            }
            Commands::Cleanup(args) => {
                log::debug!("Executing 'cleanup' command...");
                commands::cleanup::handle_cleanup_command(args, quiet)?;
            }
            Commands::Reverse(args) => {
                log::debug!("Executing 'reverse' command...");
                commands::reverse::handle_reverse_command(args, quiet)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                let config = load_config(&args.config_opts)?;
                print!("{}", config.to_toml_string()?);
            }
        },
    }
    Ok(())
}

/// Defaults, config file and environment; command flags are applied by each command.
pub fn load_config(opts: &ConfigOpts) -> Result<Config> {
    let base_dir = env::current_dir().context("Failed to determine current directory")?;
    Config::load(&base_dir, opts.config.as_ref(), opts.no_config)
        .context("Failed to load configuration")
}
