use crate::cli_args::ReverseArgs;
use anyhow::{Context, Result, bail};
use colored::*;
use repodigest_core::reconstruct;
use std::env;

pub fn handle_reverse_command(args: ReverseArgs, quiet: bool) -> Result<()> {
    if !args.report.is_file() {
        bail!("Report file not found: {}", args.report.display());
    }
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => env::current_dir().context("Failed to determine current directory")?,
    };

    let zip_path = reconstruct(&args.report, &output_dir)
        .with_context(|| format!("Failed to reconstruct {}", args.report.display()))?;
    if !quiet {
        println!(
            "{} Reconstructed repository written to {}",
            "✅".green(),
            zip_path.display().to_string().blue()
        );
    }
    Ok(())
}
