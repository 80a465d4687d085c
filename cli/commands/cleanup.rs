use crate::cli_args::CleanupArgs;
use crate::load_config;
use anyhow::{Context, Result};
use colored::*;
use repodigest_core::cleanup_scan_output;

pub fn handle_cleanup_command(args: CleanupArgs, quiet: bool) -> Result<()> {
    let mut config = load_config(&args.config_opts)?;
    if let Some(dir) = &args.output_dir {
        config.general.output_dir = dir.clone();
    }
    let output_dir = config.output_dir();

    let removed = cleanup_scan_output(&output_dir, &args.scan_id)
        .with_context(|| format!("Failed to clean up scan '{}'", args.scan_id))?;
    if !quiet {
        if removed {
            println!(
                "{} Removed {}",
                "✅".green(),
                output_dir.join(&args.scan_id).display().to_string().blue()
            );
        } else {
            println!("{} Nothing to remove for scan {}", "·".dimmed(), args.scan_id.cyan());
        }
    }
    Ok(())
}
